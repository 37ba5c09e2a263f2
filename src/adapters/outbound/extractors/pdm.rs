use super::{decode_toml, is_blank, toml_entry_locations};
use crate::adapters::outbound::matchers::{PyprojectTomlMatcher, RequirementsMatcher};
use crate::ports::outbound::{DepFile, Extractor, Matcher};
use crate::sbom_generation::domain::{Ecosystem, PackageManager, PackageRecord};
use crate::sbom_generation::services::normalize_python_name;
use crate::shared::error::ExtractError;
use crate::shared::position::{in_toml, text_to_lines};
use serde::Deserialize;
use std::path::Path;

/// PDM's name for the group holding the project's main dependencies.
const DEFAULT_GROUP: &str = "default";

#[derive(Debug, Deserialize)]
struct PdmLockPackage {
    name: String,
    #[serde(default)]
    version: String,
    #[serde(default)]
    groups: Vec<String>,
    /// Commit of a package installed from a Git repository.
    #[serde(default)]
    revision: String,
}

#[derive(Debug, Deserialize)]
struct PdmLockFile {
    #[serde(default, rename = "package")]
    packages: Vec<PdmLockPackage>,
}

/// Extractor for `pdm.lock`.
#[derive(Debug, Default)]
pub struct PdmLockExtractor {
    pyproject: PyprojectTomlMatcher,
    requirements: RequirementsMatcher,
}

impl PdmLockExtractor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Extractor for PdmLockExtractor {
    fn should_extract(&self, path: &str) -> bool {
        Path::new(path)
            .file_name()
            .is_some_and(|name| name == "pdm.lock")
    }

    fn extract(&self, file: &dyn DepFile) -> Result<Vec<PackageRecord>, ExtractError> {
        if is_blank(file) {
            return Ok(Vec::new());
        }

        let lockfile: PdmLockFile = decode_toml(file)?;
        let lines = text_to_lines(file.text());
        let blocks = in_toml(&lines, "package");

        let mut records = Vec::with_capacity(lockfile.packages.len());
        for (index, package) in lockfile.packages.iter().enumerate() {
            if package.version.is_empty() && package.revision.is_empty() {
                tracing::debug!("Skipping {} in {}: no version or revision", package.name, file.path());
                continue;
            }

            let mut record = PackageRecord::new(
                normalize_python_name(&package.name),
                package.version.clone(),
                Ecosystem::PyPI,
                PackageManager::Pdm,
            )
            .with_commit(package.revision.clone())
            .with_groups(
                package
                    .groups
                    .iter()
                    .filter(|group| group.as_str() != DEFAULT_GROUP)
                    .cloned(),
            );
            if let Some(block) = blocks.get(index) {
                record = record.with_locations(toml_entry_locations(
                    &lines,
                    block,
                    &package.name,
                    &package.version,
                    file.path(),
                ));
            }
            records.push(record);
        }

        Ok(records)
    }

    fn matchers(&self) -> Vec<&dyn Matcher> {
        vec![&self.pyproject, &self.requirements]
    }
}
