use super::{decode_json, is_blank};
use crate::adapters::outbound::matchers::{PipfileMatcher, RequirementsMatcher};
use crate::ports::outbound::{DepFile, Extractor, Matcher};
use crate::sbom_generation::domain::{Ecosystem, PackageManager, PackageRecord, DEV_GROUP};
use crate::sbom_generation::services::normalize_python_name;
use crate::shared::error::ExtractError;
use crate::shared::position::{in_json, JsonPositions};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PipenvPackage {
    version: String,
    git: String,
    #[serde(rename = "ref")]
    reference: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PipenvLock {
    default: BTreeMap<String, PipenvPackage>,
    develop: BTreeMap<String, PipenvPackage>,
}

fn add_section(
    section: &str,
    packages: &BTreeMap<String, PipenvPackage>,
    positions: &JsonPositions,
    file_path: &str,
    records: &mut HashMap<(String, String), PackageRecord>,
) {
    for (name, package) in packages {
        let version = package
            .version
            .strip_prefix("==")
            .unwrap_or(&package.version)
            .to_string();
        let commit = if package.git.is_empty() {
            String::new()
        } else {
            package.reference.clone()
        };
        if version.is_empty() && commit.is_empty() {
            tracing::debug!("Skipping {} in {}: no version or commit", name, file_path);
            continue;
        }

        let mut record = PackageRecord::new(
            normalize_python_name(name),
            version,
            Ecosystem::PyPI,
            PackageManager::Pipfile,
        )
        .with_commit(commit);
        if let Some(mut locations) =
            positions.member_locations(&[section, name.as_str()], "version", file_path)
        {
            if let Some(version) = locations.version.as_mut() {
                if package.version.starts_with("==") {
                    version.column.start += 2;
                }
            }
            record = record.with_locations(locations);
        }
        if section == "develop" {
            record.add_dep_group(DEV_GROUP);
        }

        let (key_name, key_version) = record.dedup_key();
        let key = (key_name.to_string(), key_version.to_string());
        records.entry(key).or_insert(record);
    }
}

/// Extractor for Pipenv's `Pipfile.lock`.
#[derive(Debug, Default)]
pub struct PipenvLockExtractor {
    pipfile: PipfileMatcher,
    requirements: RequirementsMatcher,
}

impl PipenvLockExtractor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Extractor for PipenvLockExtractor {
    fn should_extract(&self, path: &str) -> bool {
        Path::new(path)
            .file_name()
            .is_some_and(|name| name == "Pipfile.lock")
    }

    fn extract(&self, file: &dyn DepFile) -> Result<Vec<PackageRecord>, ExtractError> {
        if is_blank(file) {
            return Ok(Vec::new());
        }

        let lockfile: PipenvLock = decode_json(file)?;
        let positions = in_json(file.text());
        let mut records = HashMap::new();

        add_section("default", &lockfile.default, &positions, file.path(), &mut records);
        add_section("develop", &lockfile.develop, &positions, file.path(), &mut records);

        Ok(records.into_values().collect())
    }

    fn matchers(&self) -> Vec<&dyn Matcher> {
        vec![&self.pipfile, &self.requirements]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::outbound::filesystem::LocalDepFile;
    use crate::sbom_generation::domain::{sort_records, Position};

    const LOCKFILE: &str = r#"{
    "_meta": {
        "hash": {"sha256": "abc"}
    },
    "default": {
        "Markupsafe": {
            "hashes": [],
            "version": "==2.1.3"
        },
        "mine": {
            "git": "https://github.com/org/mine.git",
            "ref": "0a1b2c3d"
        }
    },
    "develop": {
        "markupsafe": {
            "version": "==2.1.3"
        },
        "pytest": {
            "version": "==7.4.0"
        },
        "unpinned": {}
    }
}"#;

    fn extract(content: &str) -> Vec<PackageRecord> {
        let file = LocalDepFile::from_content("/app/Pipfile.lock", content);
        let mut records = PipenvLockExtractor::new().extract(&file).unwrap();
        sort_records(&mut records);
        records
    }

    #[test]
    fn test_should_extract() {
        let extractor = PipenvLockExtractor::new();
        assert!(extractor.should_extract("/app/Pipfile.lock"));
        assert!(!extractor.should_extract("/app/Pipfile"));
    }

    #[test]
    fn test_records_and_groups() {
        let records = extract(LOCKFILE);
        let keys: Vec<_> = records
            .iter()
            .map(|r| format!("{}@{}#{}", r.name, r.version, r.commit))
            .collect();
        assert_eq!(keys, vec!["markupsafe@2.1.3#", "mine@#0a1b2c3d", "pytest@7.4.0#"]);

        // A package locked in both sections keeps the default entry.
        assert!(records[0].dep_groups.is_empty());
        assert!(records[2].dep_groups.contains(DEV_GROUP));
        assert_eq!(records[0].package_manager, PackageManager::Pipfile);
    }

    #[test]
    fn test_positions() {
        let records = extract(LOCKFILE);
        let markupsafe = &records[0];

        assert_eq!(markupsafe.locations.block.filename, "/app/Pipfile.lock");
        assert_eq!(markupsafe.locations.block.line, Position::new(6, 9));
        assert_eq!(markupsafe.locations.block.column, Position::new(9, 10));
        assert_eq!(
            markupsafe.locations.name.as_ref().unwrap().column,
            Position::new(10, 20)
        );
        let version = markupsafe.locations.version.as_ref().unwrap();
        assert_eq!(version.line, Position::at(8));
        assert_eq!(version.column, Position::new(27, 32));
    }

    #[test]
    fn test_empty_file() {
        assert!(extract("  \n").is_empty());
    }

    #[test]
    fn test_invalid_json() {
        let file = LocalDepFile::from_content("/app/Pipfile.lock", "{\"default\": [");
        let err = PipenvLockExtractor::new().extract(&file).unwrap_err();
        assert!(matches!(err, ExtractError::Parse { .. }));
    }
}
