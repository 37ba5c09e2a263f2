use super::is_blank;
use super::python::{is_line_continuation, is_not_requirement_line, parse_requirement, strip_comment};
use crate::ports::outbound::{DepFile, Extractor};
use crate::sbom_generation::domain::{PackageManager, PackageRecord};
use crate::shared::error::ExtractError;
use crate::shared::position::text_to_lines;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

type RecordMap = BTreeMap<(String, String), PackageRecord>;

/// Dependency group named after the file, e.g. `requirements-dev`.
pub(crate) fn file_group(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn include_target(line: &str) -> Option<&str> {
    line.strip_prefix("-r ")
        .or_else(|| line.strip_prefix("--requirement "))
        .map(str::trim)
}

fn parse_requirements(file: &dyn DepFile, seen: &mut BTreeSet<String>) -> Result<RecordMap, ExtractError> {
    let path = file.path();
    let group = file_group(path);
    let lines = text_to_lines(file.text());
    let mut records = RecordMap::new();
    let mut index = 0;

    while index < lines.len() {
        let line_number = index + 1;
        let mut logical = lines[index].clone();
        let mut block_text = lines[index].clone();
        while is_line_continuation(&logical) && index + 1 < lines.len() {
            index += 1;
            logical.pop();
            logical.push('\n');
            logical.push_str(&lines[index]);
            block_text.push('\n');
            block_text.push_str(&lines[index]);
        }
        index += 1;

        let clean = strip_comment(&logical);
        if let Some(include) = include_target(&clean) {
            if include.starts_with("http://") || include.starts_with("https://") {
                tracing::warn!("Skipping remote requirements include {} in {}", include, path);
                continue;
            }
            let included = file.open(include).map_err(|e| {
                ExtractError::parse(Path::new(path), format!("failed to include {}: {}", include, e))
            })?;
            if !seen.insert(included.path().to_string()) {
                continue;
            }
            records.extend(parse_requirements(included.as_ref(), seen)?);
            continue;
        }
        if is_not_requirement_line(&clean) {
            continue;
        }

        let requirement = parse_requirement(&clean).ok_or_else(|| {
            ExtractError::parse(Path::new(path), format!("could not parse requirement line {}", line_number))
        })?;
        let record = requirement.into_record(path, PackageManager::Requirements, &block_text, line_number);
        records
            .entry((record.name.clone(), record.version.clone()))
            .or_insert(record)
            .add_dep_group(group.clone());
    }

    Ok(records)
}

/// Extractor for pip requirements files (`requirements.txt`, `dev-requirements.txt`, ...).
#[derive(Debug, Default)]
pub struct RequirementsTxtExtractor;

impl RequirementsTxtExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for RequirementsTxtExtractor {
    fn should_extract(&self, path: &str) -> bool {
        Path::new(path)
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.contains("requirements") && name.ends_with(".txt"))
    }

    fn extract(&self, file: &dyn DepFile) -> Result<Vec<PackageRecord>, ExtractError> {
        if is_blank(file) {
            return Ok(Vec::new());
        }
        let mut seen = BTreeSet::from([file.path().to_string()]);
        Ok(parse_requirements(file, &mut seen)?.into_values().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::outbound::filesystem::LocalDepFile;
    use crate::sbom_generation::domain::{Ecosystem, Position};
    use std::fs;
    use tempfile::TempDir;

    fn extract(content: &str) -> Vec<PackageRecord> {
        let file = LocalDepFile::from_content("/app/requirements.txt", content);
        RequirementsTxtExtractor::new().extract(&file).unwrap()
    }

    fn find<'a>(records: &'a [PackageRecord], name: &str) -> &'a PackageRecord {
        records.iter().find(|r| r.name == name).unwrap()
    }

    #[test]
    fn test_should_extract() {
        let extractor = RequirementsTxtExtractor::new();
        assert!(extractor.should_extract("/app/requirements.txt"));
        assert!(extractor.should_extract("/app/requirements-dev.txt"));
        assert!(extractor.should_extract("/app/dev-requirements.txt"));
        assert!(!extractor.should_extract("/app/requirements.in"));
        assert!(!extractor.should_extract("/app/constraints.txt"));
    }

    #[test]
    fn test_requirements() {
        let records = extract(
            "# production pins\n\
             Django==4.2.1\n\
             requests>=2.31  # http\n\
             -e .\n\
             --index-url https://pypi.org/simple\n\
             \n\
             Flask_Login[async]==0.6.3 ; python_version >= \"3.8\"\n",
        );

        assert_eq!(records.len(), 3);
        let django = find(&records, "django");
        assert_eq!(django.version, "4.2.1");
        assert_eq!(django.ecosystem, Ecosystem::PyPI);
        assert_eq!(django.package_manager, PackageManager::Requirements);
        assert!(django.dep_groups.contains("requirements"));
        assert_eq!(django.locations.block.line, Position::at(2));

        assert_eq!(find(&records, "requests").version, ">=2.31");

        let login = find(&records, "flask-login");
        assert_eq!(login.annotations.get("extras").map(String::as_str), Some("async"));
        assert_eq!(
            login.annotations.get("environment-markers").map(String::as_str),
            Some("python_version >= \"3.8\"")
        );
    }

    #[test]
    fn test_line_continuation_and_hashes() {
        let records = extract(
            "certifi==2024.2.2 \\\n    --hash=sha256:0569859f95fc761b18b45ef421b1290a0f65f147e92a1e5eb3e635f9a5e4e66f\n",
        );

        let certifi = find(&records, "certifi");
        assert_eq!(certifi.version, "2024.2.2");
        assert_eq!(certifi.locations.block.line, Position::new(1, 2));
        assert!(certifi.annotations["options"].starts_with("--hash=sha256:0569"));
    }

    #[test]
    fn test_includes() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("requirements.txt"),
            "-r requirements-base.txt\n-r https://example.com/remote.txt\npytest==8.0.0\n",
        )
        .unwrap();
        fs::write(
            temp_dir.path().join("requirements-base.txt"),
            "attrs==23.2.0\n-r requirements.txt\n",
        )
        .unwrap();

        let file = LocalDepFile::open(&temp_dir.path().join("requirements.txt")).unwrap();
        let records = RequirementsTxtExtractor::new().extract(&file).unwrap();

        assert_eq!(records.len(), 2);
        assert!(find(&records, "attrs").dep_groups.contains("requirements-base"));
        assert!(find(&records, "pytest").dep_groups.contains("requirements"));
    }

    #[test]
    fn test_missing_include_fails() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("requirements.txt"), "-r nowhere.txt\n").unwrap();

        let file = LocalDepFile::open(&temp_dir.path().join("requirements.txt")).unwrap();
        assert!(RequirementsTxtExtractor::new().extract(&file).is_err());
    }

    #[test]
    fn test_same_package_keeps_one_record() {
        let records = extract("six==1.16.0\nsix == 1.16.0\n");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].locations.block.line, Position::at(1));
    }

    #[test]
    fn test_empty_file() {
        assert!(extract("").is_empty());
    }
}
