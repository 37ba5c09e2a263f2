use super::{decode_toml, is_blank, toml_entry_locations};
use crate::ports::outbound::{DepFile, Extractor};
use crate::sbom_generation::domain::{Ecosystem, PackageManager, PackageRecord};
use crate::shared::error::ExtractError;
use crate::shared::position::{in_toml, text_to_lines};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct CargoLockPackage {
    name: String,
    version: String,
    #[serde(default)]
    source: String,
    /// `name`, `name version` or `name version (source)`.
    #[serde(default)]
    dependencies: Vec<String>,
}

impl CargoLockPackage {
    /// Commit pinned by a `git+<url>#<sha>` source.
    fn commit(&self) -> &str {
        self.source
            .strip_prefix("git+")
            .and_then(|url| url.rsplit_once('#'))
            .map(|(_, commit)| commit)
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct CargoLockFile {
    #[serde(default, rename = "package")]
    packages: Vec<CargoLockPackage>,
}

/// Extractor for Cargo's `Cargo.lock`.
#[derive(Debug, Default)]
pub struct CargoLockExtractor;

impl CargoLockExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for CargoLockExtractor {
    fn should_extract(&self, path: &str) -> bool {
        Path::new(path)
            .file_name()
            .is_some_and(|name| name == "Cargo.lock")
    }

    fn extract(&self, file: &dyn DepFile) -> Result<Vec<PackageRecord>, ExtractError> {
        if is_blank(file) {
            return Ok(Vec::new());
        }

        let lockfile: CargoLockFile = decode_toml(file)?;
        let lines = text_to_lines(file.text());
        let blocks = in_toml(&lines, "package");

        let records = lockfile
            .packages
            .iter()
            .enumerate()
            .map(|(index, package)| {
                let mut record = PackageRecord::new(
                    package.name.as_str(),
                    package.version.as_str(),
                    Ecosystem::CratesIo,
                    PackageManager::Cargo,
                )
                .with_commit(package.commit());
                if let Some(block) = blocks.get(index) {
                    record = record.with_locations(toml_entry_locations(
                        &lines,
                        block,
                        &package.name,
                        &package.version,
                        file.path(),
                    ));
                }
                record.dependencies = package
                    .dependencies
                    .iter()
                    .filter_map(|dependency| dependency.split_whitespace().next())
                    .map(str::to_string)
                    .collect();
                record
            })
            .collect();

        Ok(records)
    }
}
