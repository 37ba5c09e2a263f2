use super::stanzas;
use crate::ports::outbound::{DepFile, Extractor};
use crate::sbom_generation::domain::{
    Ecosystem, FileLocations, FilePosition, PackageManager, PackageRecord, Position,
};
use crate::shared::error::ExtractError;
use crate::shared::position::{block_between, text_to_lines};

/// Where apk keeps its database inside a root file system.
const INSTALLED_DB_SUFFIX: &str = "lib/apk/db/installed";

/// Value of a one-letter `K:value` field with its position on the line.
fn field(line: &str, key: char, line_number: usize, file_path: &str) -> Option<(String, FilePosition)> {
    let value = line.strip_prefix(key)?.strip_prefix(':')?.trim_end();
    let position = FilePosition::new(
        file_path,
        Position::at(line_number),
        Position::new(3, 3 + value.chars().count()),
    );
    Some((value.to_string(), position))
}

/// Extractor for Alpine's `lib/apk/db/installed` package database.
#[derive(Debug, Default)]
pub struct ApkInstalledExtractor;

impl ApkInstalledExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for ApkInstalledExtractor {
    fn should_extract(&self, path: &str) -> bool {
        path.replace('\\', "/").ends_with(INSTALLED_DB_SUFFIX)
    }

    fn extract(&self, file: &dyn DepFile) -> Result<Vec<PackageRecord>, ExtractError> {
        let lines = text_to_lines(file.text());
        let mut records = Vec::new();

        for (first, last) in stanzas(&lines) {
            let mut name = None;
            let mut version = None;
            for (offset, line) in lines[first..=last].iter().enumerate() {
                let line_number = first + offset + 1;
                name = name.or_else(|| field(line, 'P', line_number, file.path()));
                version = version.or_else(|| field(line, 'V', line_number, file.path()));
            }

            let (Some((name, name_position)), Some((version, version_position))) = (name, version)
            else {
                tracing::debug!("Skipping incomplete apk stanza at line {}", first + 1);
                continue;
            };
            let Some(block) = block_between(&lines, first, last) else {
                continue;
            };

            records.push(
                PackageRecord::new(name, version, Ecosystem::Alpine, PackageManager::Apk)
                    .with_locations(
                        FileLocations::new(block.in_file(file.path()))
                            .with_name(Some(name_position))
                            .with_version(Some(version_position)),
                    ),
            );
        }

        Ok(records)
    }
}
