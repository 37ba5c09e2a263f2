use super::{decode_json, is_blank};
use crate::adapters::outbound::matchers::ComposerJsonMatcher;
use crate::ports::outbound::{DepFile, Extractor, Matcher};
use crate::sbom_generation::domain::{Ecosystem, PackageManager, PackageRecord, DEV_GROUP};
use crate::shared::error::ExtractError;
use crate::shared::position::{in_json, JsonPositions};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ComposerPackageSource {
    reference: String,
}

#[derive(Debug, Deserialize)]
struct ComposerPackage {
    name: String,
    #[serde(default)]
    version: String,
    #[serde(default)]
    source: ComposerPackageSource,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ComposerLock {
    packages: Vec<ComposerPackage>,
    #[serde(rename = "packages-dev")]
    packages_dev: Vec<ComposerPackage>,
}

fn section_records(
    section: &str,
    packages: Vec<ComposerPackage>,
    positions: &JsonPositions,
    file_path: &str,
) -> Vec<PackageRecord> {
    packages
        .into_iter()
        .enumerate()
        .map(|(index, package)| {
            let index = index.to_string();
            let mut record = PackageRecord::new(
                package.name,
                package.version,
                Ecosystem::Packagist,
                PackageManager::Composer,
            )
            .with_commit(package.source.reference);

            if let Some(mut locations) =
                positions.member_locations(&[section, index.as_str()], "version", file_path)
            {
                locations.name = positions
                    .get(&[section, index.as_str(), "name"])
                    .and_then(|entry| entry.value.clone())
                    .map(|position| position.in_file(file_path));
                record = record.with_locations(locations);
            }
            if section == "packages-dev" {
                record.add_dep_group(DEV_GROUP);
            }
            record
        })
        .collect()
}

/// Extractor for Composer's `composer.lock`.
#[derive(Debug, Default)]
pub struct ComposerLockExtractor {
    matcher: ComposerJsonMatcher,
}

impl ComposerLockExtractor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Extractor for ComposerLockExtractor {
    fn should_extract(&self, path: &str) -> bool {
        Path::new(path)
            .file_name()
            .is_some_and(|name| name == "composer.lock")
    }

    fn extract(&self, file: &dyn DepFile) -> Result<Vec<PackageRecord>, ExtractError> {
        if is_blank(file) {
            return Ok(Vec::new());
        }

        let lockfile: ComposerLock = decode_json(file)?;
        let positions = in_json(file.text());

        let mut records = section_records("packages", lockfile.packages, &positions, file.path());
        records.extend(section_records(
            "packages-dev",
            lockfile.packages_dev,
            &positions,
            file.path(),
        ));

        Ok(records)
    }

    fn matchers(&self) -> Vec<&dyn Matcher> {
        vec![&self.matcher]
    }
}
