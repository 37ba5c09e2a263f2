use super::commit::try_extract_commit;
use super::{decode_json, is_blank};
use crate::adapters::outbound::matchers::PackageJsonMatcher;
use crate::ports::outbound::{DepFile, Extractor, Matcher};
use crate::sbom_generation::domain::{
    Ecosystem, FileLocations, FilePosition, PackageManager, PackageRecord, Position, DEV_GROUP,
    OPTIONAL_GROUP,
};
use crate::shared::error::ExtractError;
use crate::shared::position::{in_json, JsonPositions};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

#[derive(Debug, Deserialize)]
struct NpmLockfile {
    /// npm v1 and earlier.
    dependencies: Option<BTreeMap<String, NpmLockDependency>>,
    /// npm v2 and later.
    packages: Option<BTreeMap<String, NpmLockPackage>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NpmLockDependency {
    /// For an aliased package this reads `npm:<name>@<version>`.
    version: String,
    dependencies: Option<BTreeMap<String, NpmLockDependency>>,
    dev: bool,
    optional: bool,
    requires: BTreeMap<String, String>,
}

impl NpmLockDependency {
    fn dep_groups(&self) -> Vec<&'static str> {
        match (self.dev, self.optional) {
            (true, true) => vec![DEV_GROUP, OPTIONAL_GROUP],
            (true, false) => vec![DEV_GROUP],
            (false, true) => vec![OPTIONAL_GROUP],
            (false, false) => Vec::new(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct NpmLockPackage {
    /// Real package name of an aliased install.
    name: String,
    version: String,
    resolved: String,
    dependencies: BTreeMap<String, String>,
    dev_dependencies: BTreeMap<String, String>,
    dev: bool,
    dev_optional: bool,
    optional: bool,
    link: bool,
}

impl NpmLockPackage {
    fn dep_groups(&self) -> Vec<&'static str> {
        if self.dev {
            vec![DEV_GROUP]
        } else if self.optional {
            vec![OPTIONAL_GROUP]
        } else if self.dev_optional {
            vec![DEV_GROUP, OPTIONAL_GROUP]
        } else {
            Vec::new()
        }
    }
}

/// Package name from an install path such as `node_modules/a/node_modules/@s/b`.
fn package_name_from_path(install_path: &str) -> String {
    let mut segments = install_path.rsplit('/');
    let name = segments.next().unwrap_or_default();
    match segments.next() {
        Some(scope) if scope.starts_with('@') => format!("{}/{}", scope, name),
        _ => name.to_string(),
    }
}

/// Strips the `npm:` alias and local-install prefixes from a requirement
/// declared by the root project.
pub(crate) fn clean_target_version(target: &str) -> String {
    let mut target = match target.strip_prefix("npm:") {
        Some(aliased) => aliased.split_once('@').map(|(_, range)| range).unwrap_or(aliased),
        None => target,
    };
    for prefix in ["file:", "link:", "portal:"] {
        if let Some(local) = target.strip_prefix(prefix) {
            target = local.strip_prefix("./").unwrap_or(local);
        }
    }
    target.to_string()
}

/// Position of `name` at the end of the member key, e.g. `wrappy` inside
/// `"node_modules/wrappy"`.
fn name_at_end_of_key(key: Option<&FilePosition>, name: &str) -> Option<FilePosition> {
    let key = key?;
    let length = name.chars().count();
    if key.line.start != key.line.end || key.column.end < key.column.start + length {
        return None;
    }
    Some(FilePosition::new(
        String::new(),
        key.line,
        Position::new(key.column.end - length, key.column.end),
    ))
}

fn locations_at(
    positions: &JsonPositions,
    path: &[&str],
    name: &str,
    file_path: &str,
) -> FileLocations {
    let Some(entry) = positions.get(path) else {
        return FileLocations::default();
    };

    let mut version_path = path.to_vec();
    version_path.push("version");
    let version = positions
        .get(&version_path)
        .and_then(|version| version.value.clone())
        .map(|position| position.in_file(file_path));

    FileLocations::new(entry.block.clone().in_file(file_path))
        .with_name(name_at_end_of_key(entry.key.as_ref(), name).map(|p| p.in_file(file_path)))
        .with_version(version)
}

fn parse_dependencies(
    dependencies: &BTreeMap<String, NpmLockDependency>,
    parent_path: &[&str],
    positions: &JsonPositions,
    file_path: &str,
    records: &mut HashMap<String, PackageRecord>,
) {
    for (key, detail) in dependencies {
        let mut path = parent_path.to_vec();
        path.push(key);

        if let Some(nested) = &detail.dependencies {
            let mut nested_path = path.clone();
            nested_path.push("dependencies");
            parse_dependencies(nested, &nested_path, positions, file_path, records);
        }

        let mut name = key.clone();
        let mut version = detail.version.clone();
        if let Some(aliased) = detail.version.strip_prefix("npm:") {
            if let Some((real_name, real_version)) = aliased.rsplit_once('@') {
                name = real_name.to_string();
                version = real_version.to_string();
            }
        }

        let mut commit = String::new();
        if detail.version.starts_with("file:") {
            version.clear();
        } else {
            commit = try_extract_commit(&detail.version);
            if !commit.is_empty() {
                version.clear();
            }
        }

        let mut locations = locations_at(positions, &path, key, file_path);
        if name != *key {
            locations.name = None;
        }

        let mut record = PackageRecord::new(name, version, Ecosystem::Npm, PackageManager::Npm)
            .with_commit(commit)
            .with_locations(locations)
            .with_groups(detail.dep_groups());
        record.dependencies = detail.requires.keys().cloned().collect();

        let (dedup_name, dedup_version) = record.dedup_key();
        records.insert(format!("{}@{}", dedup_name, dedup_version), record);
    }
}

fn parse_packages(
    packages: &BTreeMap<String, NpmLockPackage>,
    positions: &JsonPositions,
    file_path: &str,
    records: &mut HashMap<String, PackageRecord>,
) {
    let root = packages.get("");

    for (install_path, detail) in packages {
        if install_path.is_empty() || detail.link {
            continue;
        }

        let name = if detail.name.is_empty() {
            package_name_from_path(install_path)
        } else {
            detail.name.clone()
        };

        let commit = try_extract_commit(&detail.resolved);
        let dedup_version = if commit.is_empty() {
            detail.version.clone()
        } else {
            commit.clone()
        };
        let key = format!("{}@{}", name, dedup_version);
        if records.contains_key(&key) {
            continue;
        }

        // Locally defined packages without a version of their own.
        let version = if detail.version.is_empty() && commit.is_empty() {
            "0.0.0".to_string()
        } else {
            detail.version.clone()
        };

        let root_key = install_path
            .split_once('/')
            .map(|(_, rest)| rest)
            .unwrap_or_default();
        let target = root.and_then(|root| {
            root.dependencies
                .get(root_key)
                .or_else(|| root.dev_dependencies.get(root_key))
        });

        let path = ["packages", install_path.as_str()];
        let mut locations = locations_at(positions, &path, &name, file_path);
        if !detail.name.is_empty() {
            locations.name = positions
                .get(&["packages", install_path.as_str(), "name"])
                .and_then(|entry| entry.value.clone())
                .map(|position| position.in_file(file_path));
        }

        let mut record = PackageRecord::new(name, version, Ecosystem::Npm, PackageManager::Npm)
            .with_commit(commit)
            .with_locations(locations)
            .with_groups(detail.dep_groups());
        if let Some(target) = target {
            record.add_target_version(clean_target_version(target));
        }
        record.dependencies = detail.dependencies.keys().cloned().collect();

        records.insert(key, record);
    }
}

/// Extractor for npm's `package-lock.json` (lockfile versions 1 to 3).
#[derive(Debug, Default)]
pub struct NpmLockExtractor {
    matcher: PackageJsonMatcher,
}

impl NpmLockExtractor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Extractor for NpmLockExtractor {
    fn should_extract(&self, path: &str) -> bool {
        Path::new(path)
            .file_name()
            .is_some_and(|name| name == "package-lock.json")
    }

    fn extract(&self, file: &dyn DepFile) -> Result<Vec<PackageRecord>, ExtractError> {
        if is_blank(file) {
            return Ok(Vec::new());
        }

        let lockfile: NpmLockfile = decode_json(file)?;
        let positions = in_json(file.text());
        let mut records = HashMap::new();

        if let Some(packages) = &lockfile.packages {
            parse_packages(packages, &positions, file.path(), &mut records);
        } else if let Some(dependencies) = &lockfile.dependencies {
            parse_dependencies(dependencies, &["dependencies"], &positions, file.path(), &mut records);
        }

        Ok(records.into_values().collect())
    }

    fn matchers(&self) -> Vec<&dyn Matcher> {
        vec![&self.matcher]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::outbound::filesystem::LocalDepFile;
    use crate::sbom_generation::domain::sort_records;

    fn extract(content: &str) -> Vec<PackageRecord> {
        let file = LocalDepFile::from_content("/project/package-lock.json", content);
        let mut records = NpmLockExtractor::new().extract(&file).unwrap();
        sort_records(&mut records);
        records
    }

    const V2_LOCKFILE: &str = r#"{
  "name": "app",
  "lockfileVersion": 2,
  "packages": {
    "": {
      "dependencies": {
        "wrappy": "^1.0.0",
        "aliased": "npm:real-name@^2.0.0"
      },
      "devDependencies": {
        "local": "file:./local"
      }
    },
    "node_modules/wrappy": {
      "version": "1.0.2"
    },
    "node_modules/aliased": {
      "name": "real-name",
      "version": "2.1.0",
      "dev": true
    },
    "node_modules/local": {
      "resolved": "local",
      "link": true
    },
    "local": {
      "devOptional": true
    },
    "node_modules/@babel/core/node_modules/semver": {
      "version": "6.3.1",
      "optional": true
    },
    "node_modules/mine": {
      "version": "1.0.0",
      "resolved": "git+ssh://git@github.com/org/mine.git#abc1234"
    }
  }
}"#;

    #[test]
    fn test_should_extract() {
        let extractor = NpmLockExtractor::new();
        assert!(extractor.should_extract("/p/package-lock.json"));
        assert!(!extractor.should_extract("/p/package.json"));
        assert!(!extractor.should_extract("/p/package-lock.json5"));
    }

    #[test]
    fn test_empty_file() {
        assert!(extract("").is_empty());
    }

    #[test]
    fn test_invalid_json() {
        let file = LocalDepFile::from_content("/project/package-lock.json", "{ not json");
        let err = NpmLockExtractor::new().extract(&file).unwrap_err();
        assert!(matches!(err, ExtractError::Parse { .. }));
    }

    #[test]
    fn test_v2_records() {
        let records = extract(V2_LOCKFILE);
        let names: Vec<_> = records
            .iter()
            .map(|r| format!("{}@{}", r.name, r.version))
            .collect();
        assert_eq!(
            names,
            vec!["local@0.0.0", "mine@1.0.0", "real-name@2.1.0", "semver@6.3.1", "wrappy@1.0.2"]
        );
    }

    #[test]
    fn test_v2_targets_and_groups() {
        let records = extract(V2_LOCKFILE);
        let find = |name: &str| records.iter().find(|r| r.name == name).unwrap();

        assert_eq!(find("wrappy").target_versions, vec!["^1.0.0"]);
        assert!(find("wrappy").dep_groups.is_empty());
        assert_eq!(find("real-name").target_versions, vec!["^2.0.0"]);
        assert!(find("real-name").dep_groups.contains(DEV_GROUP));
        assert_eq!(find("local").dep_groups.len(), 2);
        assert!(find("semver").dep_groups.contains(OPTIONAL_GROUP));
        assert_eq!(find("mine").commit, "abc1234");
    }

    #[test]
    fn test_v2_positions() {
        let records = extract(V2_LOCKFILE);
        let wrappy = records.iter().find(|r| r.name == "wrappy").unwrap();

        let block = &wrappy.locations.block;
        assert_eq!(block.filename, "/project/package-lock.json");
        assert_eq!(block.line, Position::new(14, 16));
        assert_eq!(block.column, Position::new(5, 6));

        let name = wrappy.locations.name.as_ref().unwrap();
        assert_eq!(name.line, Position::at(14));
        assert_eq!(name.column, Position::new(19, 25));

        let version = wrappy.locations.version.as_ref().unwrap();
        assert_eq!(version.line, Position::at(15));
        assert_eq!(version.column, Position::new(19, 24));
    }

    const V1_LOCKFILE: &str = r#"{
  "lockfileVersion": 1,
  "dependencies": {
    "aliased": {
      "version": "npm:real-name@1.2.3"
    },
    "from-git": {
      "version": "github:org/from-git#0a1b2c3",
      "dev": true,
      "optional": true
    },
    "local": {
      "version": "file:../local"
    },
    "parent": {
      "version": "1.0.0",
      "requires": {
        "child": "^2.0.0"
      },
      "dependencies": {
        "child": {
          "version": "2.0.1"
        }
      }
    }
  }
}"#;

    #[test]
    fn test_v1_records() {
        let records = extract(V1_LOCKFILE);
        let find = |name: &str| records.iter().find(|r| r.name == name).unwrap();

        assert_eq!(records.len(), 5);
        assert_eq!(find("real-name").version, "1.2.3");

        let git = find("from-git");
        assert_eq!(git.commit, "0a1b2c3");
        assert!(git.version.is_empty());
        assert_eq!(git.dep_groups.len(), 2);

        let local = find("local");
        assert!(local.version.is_empty());
        assert!(local.commit.is_empty());

        assert_eq!(find("parent").dependencies, vec!["child"]);
    }

    #[test]
    fn test_v1_nested_positions() {
        let records = extract(V1_LOCKFILE);
        let child = records.iter().find(|r| r.name == "child").unwrap();

        assert_eq!(child.version, "2.0.1");
        assert_eq!(child.locations.block.line, Position::new(21, 23));
        assert_eq!(child.locations.block.column, Position::new(9, 10));
        assert_eq!(
            child.locations.version.as_ref().unwrap().line,
            Position::at(22)
        );
    }

    #[test]
    fn test_clean_target_version() {
        assert_eq!(clean_target_version("npm:real@^1.0.0"), "^1.0.0");
        assert_eq!(clean_target_version("file:./packages/a"), "packages/a");
        assert_eq!(clean_target_version("link:../b"), "../b");
        assert_eq!(clean_target_version("~2.0.0"), "~2.0.0");
    }

    #[test]
    fn test_package_name_from_path() {
        assert_eq!(package_name_from_path("node_modules/wrappy"), "wrappy");
        assert_eq!(
            package_name_from_path("node_modules/a/node_modules/@scope/b"),
            "@scope/b"
        );
        assert_eq!(package_name_from_path("packages/local"), "local");
    }
}
