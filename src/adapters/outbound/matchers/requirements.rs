use super::mark_declared;
use crate::adapters::outbound::extractors::RequirementsTxtExtractor;
use crate::ports::outbound::{DepFile, Extractor, Matcher};
use crate::sbom_generation::domain::{ArtifactDescriptor, PackageRecord};
use crate::shared::error::ExtractError;

const REQUIREMENTS_TXT: &str = "requirements.txt";

/// Matcher for a `requirements.txt` kept next to a Python lockfile.
///
/// The file is read with the requirements extractor, so `-r` includes are
/// followed and each declaration keeps its own position.
#[derive(Debug, Default)]
pub struct RequirementsMatcher;

impl Matcher for RequirementsMatcher {
    fn get_source_file(&self, lockfile: &dyn DepFile) -> Result<Box<dyn DepFile>, ExtractError> {
        lockfile.open(REQUIREMENTS_TXT)
    }

    fn match_packages(
        &self,
        source_file: &dyn DepFile,
        records: &mut [PackageRecord],
    ) -> Result<Option<ArtifactDescriptor>, ExtractError> {
        let declared = RequirementsTxtExtractor::new().extract(source_file)?;

        for declaration in &declared {
            let requirement = declaration
                .target_versions
                .first()
                .map(String::as_str)
                .unwrap_or_default();
            for record in records
                .iter_mut()
                .filter(|record| record.name == declaration.name)
            {
                mark_declared(record, requirement, None, Some(declaration.locations.clone()));
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::outbound::filesystem::LocalDepFile;
    use crate::sbom_generation::domain::{Ecosystem, PackageManager, Position};
    use std::fs;
    use tempfile::TempDir;

    fn record(name: &str, version: &str) -> PackageRecord {
        PackageRecord::new(name, version, Ecosystem::PyPI, PackageManager::Poetry)
    }

    #[test]
    fn test_match_by_normalized_name() {
        let file = LocalDepFile::from_content(
            "/app/requirements.txt",
            "# pins\nFlask_SQLAlchemy>=3.0\nrequests==2.31.0\n",
        );
        let mut records = [
            record("flask-sqlalchemy", "3.1.1"),
            record("requests", "2.31.0"),
            record("idna", "3.6"),
        ];
        assert!(RequirementsMatcher.match_packages(&file, &mut records).unwrap().is_none());

        let flask = &records[0];
        assert!(flask.is_direct);
        assert_eq!(flask.target_versions, vec![">=3.0"]);
        assert!(flask.dep_groups.is_empty());
        let source = flask.source_locations.as_ref().unwrap();
        assert_eq!(source.block.filename, "/app/requirements.txt");
        assert_eq!(source.block.line, Position::at(2));
        assert_eq!(source.name.as_ref().unwrap().column, Position::new(1, 17));
        assert_eq!(source.version.as_ref().unwrap().column, Position::new(17, 22));

        assert_eq!(records[1].target_versions, vec!["==2.31.0"]);
        assert!(!records[2].is_direct);
    }

    #[test]
    fn test_follows_includes() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("poetry.lock"), "").unwrap();
        fs::write(dir.path().join("requirements.txt"), "-r base.txt\n").unwrap();
        fs::write(dir.path().join("base.txt"), "attrs==23.1.0\n").unwrap();

        let lockfile = LocalDepFile::open(&dir.path().join("poetry.lock")).unwrap();
        let source = RequirementsMatcher.get_source_file(&lockfile).unwrap();
        let mut records = [record("attrs", "23.1.0")];
        RequirementsMatcher
            .match_packages(source.as_ref(), &mut records)
            .unwrap();

        assert!(records[0].is_direct);
        let block = &records[0].source_locations.as_ref().unwrap().block;
        assert!(block.filename.ends_with("base.txt"));
        assert_eq!(block.line, Position::at(1));
    }

    #[test]
    fn test_missing_requirements_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Pipfile.lock"), "{}").unwrap();
        let lockfile = LocalDepFile::open(&dir.path().join("Pipfile.lock")).unwrap();
        assert!(RequirementsMatcher.get_source_file(&lockfile).err().unwrap().is_not_found());
    }
}
