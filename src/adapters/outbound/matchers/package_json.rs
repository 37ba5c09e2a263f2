use super::{json_pair_locations, mark_declared};
use crate::adapters::outbound::extractors::npm::clean_target_version;
use crate::adapters::outbound::extractors::{decode_json, is_blank};
use crate::ports::outbound::{DepFile, Matcher};
use crate::sbom_generation::domain::{
    ArtifactDescriptor, PackageRecord, DEV_GROUP, OPTIONAL_GROUP, PROD_GROUP,
};
use crate::shared::error::ExtractError;
use crate::shared::position::in_json;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

const PACKAGE_JSON: &str = "package.json";

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PackageJson {
    dependencies: BTreeMap<String, Value>,
    dev_dependencies: BTreeMap<String, Value>,
    optional_dependencies: BTreeMap<String, Value>,
    peer_dependencies: BTreeMap<String, Value>,
    resolutions: BTreeMap<String, Value>,
}

/// How entries of one `package.json` section are applied to records.
struct Section<'a> {
    key: &'static str,
    entries: &'a BTreeMap<String, Value>,
    group: Option<&'static str>,
    /// `resolutions` pin transitive packages, they do not declare them.
    declares: bool,
}

impl PackageJson {
    /// Sections in precedence order: the first one to locate a package keeps
    /// its position.
    fn sections(&self) -> [Section<'_>; 5] {
        [
            Section {
                key: "dependencies",
                entries: &self.dependencies,
                group: Some(PROD_GROUP),
                declares: true,
            },
            Section {
                key: "devDependencies",
                entries: &self.dev_dependencies,
                group: Some(DEV_GROUP),
                declares: true,
            },
            Section {
                key: "optionalDependencies",
                entries: &self.optional_dependencies,
                group: Some(OPTIONAL_GROUP),
                declares: true,
            },
            Section {
                key: "peerDependencies",
                entries: &self.peer_dependencies,
                group: None,
                declares: true,
            },
            Section {
                key: "resolutions",
                entries: &self.resolutions,
                group: None,
                declares: false,
            },
        ]
    }
}

/// Matcher for the `package.json` next to npm, yarn and pnpm lockfiles.
///
/// A record is matched by name and by requirement: the declared range must be
/// one the lockfile resolved for it, or the resolved version itself. This
/// keeps a nested copy of a package from taking the root's declaration.
#[derive(Debug, Default)]
pub struct PackageJsonMatcher;

impl Matcher for PackageJsonMatcher {
    fn get_source_file(&self, lockfile: &dyn DepFile) -> Result<Box<dyn DepFile>, ExtractError> {
        lockfile.open(PACKAGE_JSON)
    }

    fn match_packages(
        &self,
        source_file: &dyn DepFile,
        records: &mut [PackageRecord],
    ) -> Result<Option<ArtifactDescriptor>, ExtractError> {
        if is_blank(source_file) {
            return Ok(None);
        }

        let manifest: PackageJson = decode_json(source_file)?;
        let positions = in_json(source_file.text());

        for section in manifest.sections() {
            for (name, requirement) in section.entries {
                let Some(requirement) = requirement.as_str() else {
                    continue;
                };
                let target = clean_target_version(requirement);
                let locations = positions
                    .get(&[section.key, name.as_str()])
                    .map(|entry| json_pair_locations(entry, source_file.path()));

                let matching = records.iter_mut().filter(|record| {
                    record.name == *name
                        && (record.target_versions.contains(&target) || record.version == target)
                });
                for record in matching {
                    if section.declares {
                        mark_declared(record, &target, section.group, locations.clone());
                    } else {
                        record.add_target_version(target.as_str());
                        if let Some(locations) = locations.clone() {
                            record.graft_source_locations(locations);
                        }
                    }
                }
            }
        }

        propagate_dep_groups(records);
        Ok(None)
    }
}

/// Hands the groups of each direct package down to everything it pulls in,
/// following the lockfile's dependency names.
fn propagate_dep_groups(records: &mut [PackageRecord]) {
    let mut by_name: HashMap<&str, Vec<usize>> = HashMap::new();
    for (index, record) in records.iter().enumerate() {
        by_name.entry(record.name.as_str()).or_default().push(index);
    }

    let mut inherited: Vec<BTreeSet<String>> = vec![BTreeSet::new(); records.len()];
    for (root, record) in records.iter().enumerate() {
        if !record.is_direct || record.dep_groups.is_empty() {
            continue;
        }
        let mut visited = HashSet::from([root]);
        let mut pending = vec![root];
        while let Some(current) = pending.pop() {
            for name in &records[current].dependencies {
                for &next in by_name.get(name.as_str()).into_iter().flatten() {
                    if visited.insert(next) {
                        inherited[next].extend(record.dep_groups.iter().cloned());
                        pending.push(next);
                    }
                }
            }
        }
    }

    for (record, groups) in records.iter_mut().zip(inherited) {
        for group in groups {
            record.add_dep_group(group);
        }
    }
}
