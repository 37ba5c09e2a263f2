use super::purl::PackageUrl;
use crate::sbom_generation::domain::{
    ArtifactDescriptor, FileLocations, FilePosition, PackageComponent, PackageLocation,
    PackageLocations, PackageRecord, ScannedSource, SourcefileLocations,
    IS_DEV_DEPENDENCY_METADATA, IS_DIRECT_DEPENDENCY_METADATA, PACKAGE_MANAGER_METADATA,
};
use crate::sbom_generation::policies::{DevGroupPolicy, PathRooting};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Components keyed by PURL plus the artifacts found next to them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupedPackages {
    /// Sorted by PURL.
    pub components: Vec<PackageComponent>,
    pub artifacts: Vec<ArtifactDescriptor>,
}

impl GroupedPackages {
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

struct Accumulator {
    component: PackageComponent,
    groups: BTreeSet<String>,
    is_direct: bool,
}

/// PackageGrouper collapses records from every scanned source into one
/// component per package URL.
///
/// Each distinct block position becomes one location of the component;
/// a block seen twice in the same source is only kept once.
pub struct PackageGrouper;

impl PackageGrouper {
    pub fn group(sources: &[ScannedSource], rooting: PathRooting) -> GroupedPackages {
        let mut by_purl: BTreeMap<String, Accumulator> = BTreeMap::new();
        let mut artifacts = Vec::new();

        for source in sources {
            let mut seen_blocks: HashSet<String> = HashSet::new();
            let root = |path: &str| rooting.apply(&source.scan_root, path);

            for record in &source.lockfile.packages {
                let Some(purl) = PackageUrl::from_record(record) else {
                    tracing::warn!(
                        "skipping {}@{} ({}): no package URL can be built for it",
                        record.name,
                        record.version,
                        record.ecosystem
                    );
                    continue;
                };
                let purl = purl.to_string();

                let accumulator = by_purl.entry(purl.clone()).or_insert_with(|| Accumulator {
                    component: PackageComponent {
                        purl,
                        name: record.name.clone(),
                        version: record.version.clone(),
                        ecosystem: record.ecosystem,
                        metadata: BTreeMap::from([(
                            PACKAGE_MANAGER_METADATA.to_string(),
                            record.package_manager.to_string(),
                        )]),
                        locations: Vec::new(),
                    },
                    groups: BTreeSet::new(),
                    is_direct: false,
                });
                accumulator.groups.extend(record.dep_groups.iter().cloned());
                accumulator.is_direct |= record.is_direct;

                if let Some(location) = Self::locations_of(record, &root) {
                    if seen_blocks.insert(location.block.hash_key()) {
                        accumulator.component.locations.push(location);
                    }
                }
            }

            if let Some(artifact) = &source.lockfile.artifact {
                let mut artifact = artifact.clone();
                artifact.map_filenames(root);
                if !artifacts.contains(&artifact) {
                    artifacts.push(artifact);
                }
            }
        }

        let components = by_purl
            .into_values()
            .map(|mut accumulator| {
                let component = &mut accumulator.component;
                component.metadata.insert(
                    IS_DIRECT_DEPENDENCY_METADATA.to_string(),
                    accumulator.is_direct.to_string(),
                );
                if DevGroupPolicy::is_dev(component.ecosystem, &accumulator.groups) {
                    component
                        .metadata
                        .insert(IS_DEV_DEPENDENCY_METADATA.to_string(), "true".to_string());
                }
                component.sort_locations();
                accumulator.component
            })
            .collect();

        GroupedPackages {
            components,
            artifacts,
        }
    }

    /// Location of a record when its block was fully extracted.
    fn locations_of<F>(record: &PackageRecord, root: &F) -> Option<PackageLocations>
    where
        F: Fn(&str) -> String,
    {
        if !record.locations.block.is_extracted() {
            return None;
        }

        let (block, name, version) = Self::triple(&record.locations, root)?;
        let sourcefile = record
            .source_locations
            .as_ref()
            .and_then(|source| Self::triple(source, root))
            .map(|(block, name, version)| SourcefileLocations {
                block,
                name,
                version,
            });

        Some(PackageLocations {
            block,
            name,
            version,
            sourcefile,
        })
    }

    #[allow(clippy::type_complexity)]
    fn triple<F>(
        locations: &FileLocations,
        root: &F,
    ) -> Option<(PackageLocation, Option<PackageLocation>, Option<PackageLocation>)>
    where
        F: Fn(&str) -> String,
    {
        let convert = |position: &FilePosition| {
            PackageLocation::from_position(position, root(&position.filename))
        };
        let extracted = |position: &Option<FilePosition>| {
            position
                .as_ref()
                .filter(|p| p.is_extracted())
                .map(convert)
        };

        if !locations.block.is_extracted() {
            return None;
        }
        Some((
            convert(&locations.block),
            extracted(&locations.name),
            extracted(&locations.version),
        ))
    }
}
