use super::{decode_toml, is_blank, toml_entry_locations};
use crate::adapters::outbound::matchers::{PyprojectTomlMatcher, RequirementsMatcher};
use crate::ports::outbound::{DepFile, Extractor, Matcher};
use crate::sbom_generation::domain::{Ecosystem, PackageManager, PackageRecord, OPTIONAL_GROUP};
use crate::sbom_generation::services::normalize_python_name;
use crate::shared::error::ExtractError;
use crate::shared::position::{in_toml, text_to_lines};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PoetryLockPackageSource {
    resolved_reference: String,
}

#[derive(Debug, Deserialize)]
struct PoetryLockPackage {
    name: String,
    version: String,
    #[serde(default)]
    optional: bool,
    #[serde(default)]
    source: PoetryLockPackageSource,
}

#[derive(Debug, Deserialize)]
struct PoetryLockFile {
    #[serde(default, rename = "package")]
    packages: Vec<PoetryLockPackage>,
}

/// Extractor for `poetry.lock`.
#[derive(Debug, Default)]
pub struct PoetryLockExtractor {
    pyproject: PyprojectTomlMatcher,
    requirements: RequirementsMatcher,
}

impl PoetryLockExtractor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Extractor for PoetryLockExtractor {
    fn should_extract(&self, path: &str) -> bool {
        Path::new(path)
            .file_name()
            .is_some_and(|name| name == "poetry.lock")
    }

    fn extract(&self, file: &dyn DepFile) -> Result<Vec<PackageRecord>, ExtractError> {
        if is_blank(file) {
            return Ok(Vec::new());
        }

        let lockfile: PoetryLockFile = decode_toml(file)?;
        let lines = text_to_lines(file.text());
        let blocks = in_toml(&lines, "package");

        let records = lockfile
            .packages
            .into_iter()
            .enumerate()
            .map(|(index, package)| {
                let mut record = PackageRecord::new(
                    normalize_python_name(&package.name),
                    package.version.clone(),
                    Ecosystem::PyPI,
                    PackageManager::Poetry,
                )
                .with_commit(package.source.resolved_reference);
                if let Some(block) = blocks.get(index) {
                    record = record.with_locations(toml_entry_locations(
                        &lines,
                        block,
                        &package.name,
                        &package.version,
                        file.path(),
                    ));
                }
                if package.optional {
                    record.add_dep_group(OPTIONAL_GROUP);
                }
                record
            })
            .collect();

        Ok(records)
    }

    fn matchers(&self) -> Vec<&dyn Matcher> {
        vec![&self.pyproject, &self.requirements]
    }
}
