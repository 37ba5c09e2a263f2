use super::stanzas;
use crate::ports::outbound::{DepFile, Extractor};
use crate::sbom_generation::domain::{
    Ecosystem, FileLocations, FilePosition, PackageManager, PackageRecord, Position,
};
use crate::shared::error::ExtractError;
use crate::shared::position::{block_between, column_at, text_to_lines};
use std::path::Path;

const STATUS_DB_SUFFIX: &str = "var/lib/dpkg/status";

/// Value of a `Key: value` control field with its position on the line.
fn field(line: &str, key: &str, line_number: usize, file_path: &str) -> Option<(String, FilePosition)> {
    let rest = line.strip_prefix(key)?.strip_prefix(':')?;
    let value = rest.trim();
    if value.is_empty() {
        return None;
    }
    let start = line.len() - rest.trim_start().len();
    let position = FilePosition::new(
        file_path,
        Position::at(line_number),
        Position::new(column_at(line, start), column_at(line, start + value.len())),
    );
    Some((value.to_string(), position))
}

/// Extractor for Debian's `var/lib/dpkg/status` database and `Packages`
/// indexes, which share the control-file stanza format.
///
/// Only the binary package's own `Package` and `Version` are read; `Source`
/// is ignored.
#[derive(Debug, Default)]
pub struct DpkgStatusExtractor;

impl DpkgStatusExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for DpkgStatusExtractor {
    fn should_extract(&self, path: &str) -> bool {
        path.replace('\\', "/").ends_with(STATUS_DB_SUFFIX)
            || Path::new(path)
                .file_name()
                .is_some_and(|name| name == "Packages")
    }

    fn extract(&self, file: &dyn DepFile) -> Result<Vec<PackageRecord>, ExtractError> {
        let lines = text_to_lines(file.text());
        let mut records = Vec::new();

        for (first, last) in stanzas(&lines) {
            let mut name = None;
            let mut version = None;
            let mut status = None;
            for (offset, line) in lines[first..=last].iter().enumerate() {
                let line_number = first + offset + 1;
                name = name.or_else(|| field(line, "Package", line_number, file.path()));
                version = version.or_else(|| field(line, "Version", line_number, file.path()));
                status = status.or_else(|| field(line, "Status", line_number, file.path()));
            }

            // `Packages` indexes carry no status; the database records removed
            // packages as `deinstall ok config-files` and the like.
            if let Some((status, _)) = &status {
                if !status.ends_with(" installed") {
                    continue;
                }
            }
            let (Some((name, name_position)), Some((version, version_position))) = (name, version)
            else {
                tracing::debug!("Skipping incomplete dpkg stanza at line {}", first + 1);
                continue;
            };
            let Some(block) = block_between(&lines, first, last) else {
                continue;
            };

            records.push(
                PackageRecord::new(name, version, Ecosystem::Debian, PackageManager::Dpkg)
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
