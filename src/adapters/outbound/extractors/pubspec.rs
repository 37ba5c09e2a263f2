use super::{is_blank, yaml_scalar, MappingOrScalar};
use crate::ports::outbound::{DepFile, Extractor};
use crate::sbom_generation::domain::{
    Ecosystem, FileLocations, PackageManager, PackageRecord, DEV_GROUP,
};
use crate::shared::error::ExtractError;
use crate::shared::position::{in_yaml, text_to_lines, YamlPositions};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PubspecLockDescription {
    #[serde(rename = "resolved-ref", deserialize_with = "yaml_scalar")]
    resolved_ref: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PubspecLockPackage {
    #[serde(deserialize_with = "yaml_scalar")]
    dependency: String,
    /// A mapping for hosted and git packages, a plain string for SDK ones.
    description: MappingOrScalar<PubspecLockDescription>,
    #[serde(deserialize_with = "yaml_scalar")]
    version: String,
}

impl PubspecLockPackage {
    fn resolved_ref(&self) -> String {
        match &self.description {
            MappingOrScalar::Mapping(description) => description.resolved_ref.clone(),
            MappingOrScalar::Scalar(_) => String::new(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PubspecLockfile {
    packages: BTreeMap<String, PubspecLockPackage>,
}

fn locations(positions: &YamlPositions, name: &str, file_path: &str) -> Option<FileLocations> {
    let entry = positions.get(&["packages", name])?;
    let version = positions
        .get(&["packages", name, "version"])
        .and_then(|version| version.value.clone())
        .map(|position| position.in_file(file_path));

    Some(
        FileLocations::new(entry.block.clone().in_file(file_path))
            .with_name(Some(entry.key.clone().in_file(file_path)))
            .with_version(version),
    )
}

/// Extractor for Dart's `pubspec.lock`.
#[derive(Debug, Default)]
pub struct PubspecLockExtractor;

impl PubspecLockExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for PubspecLockExtractor {
    fn should_extract(&self, path: &str) -> bool {
        Path::new(path)
            .file_name()
            .is_some_and(|name| name == "pubspec.lock")
    }

    fn extract(&self, file: &dyn DepFile) -> Result<Vec<PackageRecord>, ExtractError> {
        if is_blank(file) {
            return Ok(Vec::new());
        }

        let lockfile: PubspecLockfile = serde_yaml_ng::from_str(file.text())
            .map_err(|e| ExtractError::parse(Path::new(file.path()), e))?;
        let positions = in_yaml(&text_to_lines(file.text()));

        let records = lockfile
            .packages
            .iter()
            .map(|(name, package)| {
                let mut record = PackageRecord::new(
                    name.as_str(),
                    package.version.as_str(),
                    Ecosystem::Pub,
                    PackageManager::Pub,
                )
                .with_commit(package.resolved_ref());

                // `direct main`, `direct dev`, `direct overridden` or `transitive`.
                record.is_direct = package.dependency.starts_with("direct");
                if package.dependency == "direct dev" {
                    record.add_dep_group(DEV_GROUP);
                }
                if let Some(locations) = locations(&positions, name, file.path()) {
                    record = record.with_locations(locations);
                }
                record
            })
            .collect();

        Ok(records)
    }
}
