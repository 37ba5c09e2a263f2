use super::{decode_json, is_blank};
use crate::adapters::outbound::matchers::NugetCsprojMatcher;
use crate::ports::outbound::{DepFile, Extractor, Matcher};
use crate::sbom_generation::domain::{Ecosystem, PackageManager, PackageRecord};
use crate::shared::error::ExtractError;
use crate::shared::position::in_json;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

const SUPPORTED_VERSIONS: [u32; 2] = [1, 2];

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NuGetLockPackage {
    resolved: String,
    #[serde(rename = "type")]
    kind: String,
}

impl NuGetLockPackage {
    fn is_project(&self) -> bool {
        self.kind.eq_ignore_ascii_case("Project")
    }

    fn is_direct(&self) -> bool {
        self.kind == "Direct"
    }
}

/// `packages.lock.json`: one dependency map per target framework, e.g. `net8.0`.
#[derive(Debug, Deserialize)]
struct NuGetLockfile {
    #[serde(default)]
    version: u32,
    #[serde(default)]
    dependencies: BTreeMap<String, BTreeMap<String, NuGetLockPackage>>,
}

/// Extractor for NuGet's `packages.lock.json` (schema versions 1 and 2).
#[derive(Debug, Default)]
pub struct NuGetLockExtractor {
    matcher: NugetCsprojMatcher,
}

impl NuGetLockExtractor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Extractor for NuGetLockExtractor {
    fn should_extract(&self, path: &str) -> bool {
        Path::new(path)
            .file_name()
            .is_some_and(|name| name == "packages.lock.json")
    }

    fn extract(&self, file: &dyn DepFile) -> Result<Vec<PackageRecord>, ExtractError> {
        if is_blank(file) {
            return Ok(Vec::new());
        }

        let lockfile: NuGetLockfile = decode_json(file)?;
        if !SUPPORTED_VERSIONS.contains(&lockfile.version) {
            return Err(ExtractError::schema_version(Path::new(file.path()), lockfile.version));
        }

        let positions = in_json(file.text());
        let mut records: BTreeMap<(String, String), PackageRecord> = BTreeMap::new();

        // Frameworks may lock the same package; the first sighting keeps its
        // positions.
        for (framework, dependencies) in &lockfile.dependencies {
            for (name, dependency) in dependencies {
                if dependency.is_project() {
                    continue;
                }

                let key = (name.clone(), dependency.resolved.clone());
                if let Some(existing) = records.get_mut(&key) {
                    existing.is_direct |= dependency.is_direct();
                    continue;
                }

                let mut record = PackageRecord::new(
                    name.as_str(),
                    dependency.resolved.as_str(),
                    Ecosystem::NuGet,
                    PackageManager::NuGet,
                );
                record.is_direct = dependency.is_direct();
                if let Some(locations) = positions.member_locations(
                    &["dependencies", framework.as_str(), name.as_str()],
                    "resolved",
                    file.path(),
                ) {
                    record = record.with_locations(locations);
                }
                records.insert(key, record);
            }
        }

        Ok(records.into_values().collect())
    }

    fn matchers(&self) -> Vec<&dyn Matcher> {
        vec![&self.matcher]
    }
}
