use super::is_blank;
use crate::ports::outbound::{DepFile, Extractor};
use crate::sbom_generation::domain::{
    Ecosystem, FileLocations, FilePosition, PackageManager, PackageRecord, Position,
};
use crate::shared::error::ExtractError;
use crate::shared::position::{column_at, text_to_lines};
use crate::shared::regex_cache::static_regex;
use std::path::Path;

const ENTRY_PATTERN: &str = r#"^\s*"(?P<key>[^"]+)":\s*\{:(?P<kind>hex|git),\s*(?::(?P<package>[\w-]+)|"[^"]*"),\s*"(?P<version>[^"]+)""#;

/// Extractor for Elixir's `mix.lock`, an Elixir map literal with one
/// dependency tuple per line.
#[derive(Debug, Default)]
pub struct MixLockExtractor;

impl MixLockExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for MixLockExtractor {
    fn should_extract(&self, path: &str) -> bool {
        Path::new(path)
            .file_name()
            .is_some_and(|name| name == "mix.lock")
    }

    fn extract(&self, file: &dyn DepFile) -> Result<Vec<PackageRecord>, ExtractError> {
        if is_blank(file) {
            return Ok(Vec::new());
        }
        if !file.text().trim_start().starts_with("%{") {
            return Err(ExtractError::parse(
                Path::new(file.path()),
                "expected an Elixir map starting with %{",
            ));
        }

        let entry = static_regex(ENTRY_PATTERN);
        let mut records = Vec::new();

        for (index, line) in text_to_lines(file.text()).iter().enumerate() {
            let Some(captures) = entry.captures(line) else {
                continue;
            };
            let (Some(key), Some(kind), Some(version)) =
                (captures.name("key"), captures.name("kind"), captures.name("version"))
            else {
                continue;
            };

            let span = |start: usize, end: usize| {
                FilePosition::new(
                    file.path(),
                    Position::at(index + 1),
                    Position::new(column_at(line, start), column_at(line, end)),
                )
            };
            let line_start = line.len() - line.trim_start().len();
            let line_end = line.trim_end().len();
            let locations = FileLocations::new(span(line_start, line_end))
                .with_name(Some(span(key.start(), key.end())))
                .with_version(Some(span(version.start(), version.end())));

            let record = if kind.as_str() == "git" {
                PackageRecord::new(key.as_str(), "", Ecosystem::Hex, PackageManager::Mix)
                    .with_commit(version.as_str())
            } else {
                let name = captures.name("package").map_or(key.as_str(), |package| package.as_str());
                PackageRecord::new(name, version.as_str(), Ecosystem::Hex, PackageManager::Mix)
            };
            records.push(record.with_locations(locations));
        }

        Ok(records)
    }
}
