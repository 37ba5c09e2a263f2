use super::is_blank;
use crate::adapters::outbound::matchers::BuildGradleMatcher;
use crate::ports::outbound::{DepFile, Extractor, Matcher};
use crate::sbom_generation::domain::{
    Ecosystem, FilePosition, PackageManager, PackageRecord, Position,
};
use crate::shared::error::ExtractError;
use crate::shared::position::{first_non_empty_column, last_non_empty_column, text_to_lines};
use std::path::Path;

const LOCKFILE_NAMES: [&str; 2] = ["buildscript-gradle.lockfile", "gradle.lockfile"];

fn is_dependency_line(line: &str) -> bool {
    !line.is_empty() && !line.starts_with('#') && !line.starts_with("empty=")
}

/// Parses `group:artifact:version[=configuration,...]`.
fn parse_line(line: &str) -> Option<PackageRecord> {
    let mut parts = line.splitn(3, ':');
    let (group, artifact, rest) = (parts.next()?, parts.next()?, parts.next()?);
    let (version, configurations) = rest.split_once('=').unwrap_or((rest, ""));

    Some(
        PackageRecord::new(
            format!("{}:{}", group, artifact),
            version,
            Ecosystem::Maven,
            PackageManager::Gradle,
        )
        .with_groups(configurations.split(',').map(str::trim)),
    )
}

/// Extractor for Gradle dependency locking files.
#[derive(Debug, Default)]
pub struct GradleLockExtractor {
    matcher: BuildGradleMatcher,
}

impl GradleLockExtractor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Extractor for GradleLockExtractor {
    fn should_extract(&self, path: &str) -> bool {
        Path::new(path)
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| LOCKFILE_NAMES.contains(&name))
    }

    fn extract(&self, file: &dyn DepFile) -> Result<Vec<PackageRecord>, ExtractError> {
        if is_blank(file) {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        for (index, raw_line) in text_to_lines(file.text()).iter().enumerate() {
            let line = raw_line.trim();
            if !is_dependency_line(line) {
                continue;
            }
            let Some(record) = parse_line(line) else {
                tracing::debug!("Skipping invalid line in gradle lockfile: {}", line);
                continue;
            };

            let block = match (first_non_empty_column(raw_line), last_non_empty_column(raw_line)) {
                (Some(start), Some(end)) => FilePosition::new(
                    file.path(),
                    Position::at(index + 1),
                    Position::new(start, end + 1),
                ),
                _ => FilePosition::default(),
            };
            records.push(record.with_block(block));
        }

        Ok(records)
    }

    fn matchers(&self) -> Vec<&dyn Matcher> {
        vec![&self.matcher]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::outbound::filesystem::LocalDepFile;

    const LOCKFILE: &str = "\
# This is a Gradle generated file for dependency locking.
# Manual edits can break the build and are not advised.
# This file is expected to be part of source control.
com.google.code.gson:gson:2.10.1=compileClasspath,runtimeClasspath
org.junit:junit-bom:5.9.1=testCompileClasspath
not-a-dependency
empty=annotationProcessor
";

    fn extract(content: &str) -> Vec<PackageRecord> {
        let file = LocalDepFile::from_content("/app/gradle.lockfile", content);
        GradleLockExtractor::new().extract(&file).unwrap()
    }

    #[test]
    fn test_should_extract() {
        let extractor = GradleLockExtractor::new();
        assert!(extractor.should_extract("/app/gradle.lockfile"));
        assert!(extractor.should_extract("/app/buildscript-gradle.lockfile"));
        assert!(!extractor.should_extract("/app/gradle.lockfile.bak"));
        assert!(!extractor.should_extract("/app/build.gradle"));
    }

    #[test]
    fn test_records_and_configurations() {
        let records = extract(LOCKFILE);
        assert_eq!(records.len(), 2);

        let gson = &records[0];
        assert_eq!(gson.name, "com.google.code.gson:gson");
        assert_eq!(gson.version, "2.10.1");
        assert_eq!(gson.ecosystem, Ecosystem::Maven);
        assert_eq!(gson.package_manager, PackageManager::Gradle);
        assert_eq!(
            gson.dep_groups.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["compileClasspath", "runtimeClasspath"]
        );

        assert!(records[1].dep_groups.contains("testCompileClasspath"));
    }

    #[test]
    fn test_block_spans_the_line() {
        let records = extract(LOCKFILE);
        let block = &records[0].locations.block;
        assert_eq!(block.filename, "/app/gradle.lockfile");
        assert_eq!(block.line, Position::at(4));
        assert_eq!(block.column, Position::new(1, 67));
    }

    #[test]
    fn test_line_without_configurations() {
        let records = extract("org.slf4j:slf4j-api:2.0.9\n");
        assert_eq!(records[0].version, "2.0.9");
        assert!(records[0].dep_groups.is_empty());
    }

    #[test]
    fn test_empty_file() {
        assert!(extract("").is_empty());
        assert!(extract("# only comments\n").is_empty());
    }
}
