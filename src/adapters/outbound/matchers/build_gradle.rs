use super::mark_declared;
use crate::ports::outbound::{DepFile, Matcher};
use crate::sbom_generation::domain::{
    ArtifactDescriptor, FileLocations, FilePosition, PackageRecord, Position,
};
use crate::shared::error::ExtractError;
use crate::shared::position::{
    find_in_block_by_regex, first_non_empty_column, last_non_empty_column, text_to_lines,
};

/// Build scripts tried in order. The parent directory covers lockfiles kept
/// under `<root>/gradle/`.
const BUILD_SCRIPTS: [&str; 4] = [
    "build.gradle",
    "build.gradle.kts",
    "../build.gradle",
    "../build.gradle.kts",
];

/// Positions of a single-line declaration such as
/// `implementation 'org.slf4j:slf4j-api:2.0.9'`.
fn declaration_locations(
    line: &str,
    line_number: usize,
    artifact: &str,
    version: &str,
    filename: &str,
) -> Option<FileLocations> {
    let block = FilePosition::new(
        filename,
        Position::at(line_number),
        Position::new(first_non_empty_column(line)?, last_non_empty_column(line)? + 1),
    );
    let single = [line];
    let name = find_in_block_by_regex(&single, &regex::escape(artifact), line_number, r#"['":]"#, r#"['":]"#);
    let version = find_in_block_by_regex(&single, &regex::escape(version), line_number, r#"['":]"#, r#"['"]"#);

    Some(
        FileLocations::new(block)
            .with_name(name.map(|position| position.in_file(filename)))
            .with_version(version.map(|position| position.in_file(filename))),
    )
}

/// Matcher for the `build.gradle` (or `build.gradle.kts`) owning a Gradle lockfile.
///
/// The script is scanned line by line. A line declares a record when it
/// mentions both its group and artifact, and positions are only recorded when
/// it also spells out the resolved version: ranges and conflict resolution
/// are not interpreted.
#[derive(Debug, Default)]
pub struct BuildGradleMatcher;

impl Matcher for BuildGradleMatcher {
    fn get_source_file(&self, lockfile: &dyn DepFile) -> Result<Box<dyn DepFile>, ExtractError> {
        let mut last_error = None;
        for script in BUILD_SCRIPTS {
            match lockfile.open(script) {
                Ok(file) => return Ok(file),
                Err(err) if err.is_not_found() => last_error = Some(err),
                Err(err) => return Err(err),
            }
        }
        Err(last_error.unwrap_or_else(|| ExtractError::NotFound {
            path: lockfile.dir().join(BUILD_SCRIPTS[0]),
        }))
    }

    fn match_packages(
        &self,
        source_file: &dyn DepFile,
        records: &mut [PackageRecord],
    ) -> Result<Option<ArtifactDescriptor>, ExtractError> {
        let lines = text_to_lines(source_file.text());

        for record in records.iter_mut() {
            let Some((group, artifact)) = record.name.split_once(':') else {
                continue;
            };
            if group.is_empty() || artifact.is_empty() {
                continue;
            }
            let (group, artifact) = (group.to_string(), artifact.to_string());

            for (index, line) in lines.iter().enumerate() {
                if !line.contains(&group) || !line.contains(&artifact) {
                    continue;
                }
                let line_number = index + 1;
                let locations = if !record.version.is_empty() && line.contains(&record.version) {
                    declaration_locations(line, line_number, &artifact, &record.version, source_file.path())
                } else {
                    None
                };
                let version = record.version.clone();
                mark_declared(record, &version, None, locations);
            }
        }

        Ok(None)
    }
}
