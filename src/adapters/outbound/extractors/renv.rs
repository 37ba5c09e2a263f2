use super::{decode_json, is_blank};
use crate::ports::outbound::{DepFile, Extractor};
use crate::sbom_generation::domain::{Ecosystem, PackageManager, PackageRecord};
use crate::shared::error::ExtractError;
use crate::shared::position::in_json;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

pub(crate) const REPOSITORY_ANNOTATION: &str = "repository";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RenvPackage {
    package: String,
    version: String,
    #[serde(default)]
    repository: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct RenvLockfile {
    packages: BTreeMap<String, RenvPackage>,
}

/// Extractor for R's `renv.lock`.
#[derive(Debug, Default)]
pub struct RenvLockExtractor;

impl RenvLockExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for RenvLockExtractor {
    fn should_extract(&self, path: &str) -> bool {
        Path::new(path)
            .file_name()
            .is_some_and(|name| name == "renv.lock")
    }

    fn extract(&self, file: &dyn DepFile) -> Result<Vec<PackageRecord>, ExtractError> {
        if is_blank(file) {
            return Ok(Vec::new());
        }

        let lockfile: RenvLockfile = decode_json(file)?;
        let positions = in_json(file.text());

        let records = lockfile
            .packages
            .iter()
            .map(|(key, package)| {
                let mut record = PackageRecord::new(
                    package.package.as_str(),
                    package.version.as_str(),
                    Ecosystem::Cran,
                    PackageManager::Renv,
                );
                if !package.repository.is_empty() {
                    record
                        .annotations
                        .insert(REPOSITORY_ANNOTATION.to_string(), package.repository.clone());
                }
                if let Some(mut locations) =
                    positions.member_locations(&["Packages", key.as_str()], "Version", file.path())
                {
                    locations.name = positions
                        .get(&["Packages", key.as_str(), "Package"])
                        .and_then(|entry| entry.value.clone())
                        .map(|position| position.in_file(file.path()));
                    record = record.with_locations(locations);
                }
                record
            })
            .collect();

        Ok(records)
    }
}
