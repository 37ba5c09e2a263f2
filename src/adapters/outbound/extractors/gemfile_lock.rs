use crate::adapters::outbound::matchers::GemfileMatcher;
use crate::ports::outbound::{DepFile, Extractor, Matcher};
use crate::sbom_generation::domain::{
    Ecosystem, FileLocations, FilePosition, PackageManager, PackageRecord, Position,
};
use crate::shared::error::ExtractError;
use crate::shared::position::{column_at, text_to_lines};
use crate::shared::regex_cache::static_regex;
use std::path::Path;

/// Sources whose `specs:` list installed gems.
const SPEC_SECTIONS: [&str; 3] = ["GIT", "GEM", "PATH"];

#[derive(Debug, Default)]
struct GemfileLockParser {
    file_path: String,
    in_spec_section: bool,
    current_commit: String,
    records: Vec<PackageRecord>,
}

impl GemfileLockParser {
    fn new(file_path: &str) -> Self {
        Self {
            file_path: file_path.to_string(),
            ..Self::default()
        }
    }

    fn parse_line(&mut self, line: &str, line_number: usize) {
        if line.trim().is_empty() {
            return;
        }

        if !line.starts_with(' ') {
            self.in_spec_section = SPEC_SECTIONS.contains(&line.trim());
            self.current_commit.clear();
            return;
        }
        if !self.in_spec_section {
            return;
        }

        if let Some(revision) = line.strip_prefix("  revision: ") {
            self.current_commit = revision.trim().to_string();
            return;
        }

        let spec = static_regex(r"^ {4}(?P<name>[^ ]+) \((?P<version>[^)]+)\)\s*$");
        if let Some(captures) = spec.captures(line) {
            let (Some(name), Some(version)) = (captures.name("name"), captures.name("version")) else {
                return;
            };
            let record = self.spec_record(line, line_number, name, version);
            self.records.push(record);
            return;
        }

        // Dependencies of the last spec, e.g. `      racc (~> 1.4)`.
        let dependency = static_regex(r"^ {6}(?P<name>[^ !]+)");
        if let Some(name) = dependency.captures(line).and_then(|c| c.name("name")) {
            if let Some(last) = self.records.last_mut() {
                last.dependencies.push(name.as_str().to_string());
            }
        }
    }

    fn spec_record(
        &self,
        line: &str,
        line_number: usize,
        name: regex::Match<'_>,
        version: regex::Match<'_>,
    ) -> PackageRecord {
        let span = |start: usize, end: usize| {
            FilePosition::new(
                self.file_path.as_str(),
                Position::at(line_number),
                Position::new(column_at(line, start), column_at(line, end)),
            )
        };
        let locations = FileLocations::new(span(name.start(), line.trim_end().len()))
            .with_name(Some(span(name.start(), name.end())))
            .with_version(Some(span(version.start(), version.end())));

        PackageRecord::new(
            name.as_str(),
            version.as_str(),
            Ecosystem::RubyGems,
            PackageManager::Bundler,
        )
        .with_commit(self.current_commit.as_str())
        .with_locations(locations)
    }
}

/// Extractor for Bundler's `Gemfile.lock`.
#[derive(Debug, Default)]
pub struct GemfileLockExtractor {
    matcher: GemfileMatcher,
}

impl GemfileLockExtractor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Extractor for GemfileLockExtractor {
    fn should_extract(&self, path: &str) -> bool {
        Path::new(path)
            .file_name()
            .is_some_and(|name| name == "Gemfile.lock" || name == "gems.locked")
    }

    fn extract(&self, file: &dyn DepFile) -> Result<Vec<PackageRecord>, ExtractError> {
        let mut parser = GemfileLockParser::new(file.path());
        for (index, line) in text_to_lines(file.text()).iter().enumerate() {
            parser.parse_line(line, index + 1);
        }

        Ok(parser.records)
    }

    fn matchers(&self) -> Vec<&dyn Matcher> {
        vec![&self.matcher]
    }
}
