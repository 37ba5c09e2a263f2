use super::is_blank;
use super::python::{is_not_requirement_line, parse_requirement, strip_comment};
use super::requirements::file_group;
use crate::ports::outbound::{DepFile, Extractor};
use crate::sbom_generation::domain::{PackageManager, PackageRecord};
use crate::shared::error::ExtractError;
use crate::shared::position::{first_non_empty_column, text_to_lines};
use crate::shared::regex_cache::static_regex;
use std::collections::BTreeMap;
use std::path::Path;

/// Extractor for setuptools' declarative `setup.cfg`, reading
/// `[options] install_requires`.
#[derive(Debug, Default)]
pub struct SetupCfgExtractor;

impl SetupCfgExtractor {
    pub fn new() -> Self {
        Self
    }
}

enum Section {
    Preamble,
    Options,
    InstallRequires,
}

impl Extractor for SetupCfgExtractor {
    fn should_extract(&self, path: &str) -> bool {
        Path::new(path)
            .file_name()
            .is_some_and(|name| name == "setup.cfg")
    }

    fn extract(&self, file: &dyn DepFile) -> Result<Vec<PackageRecord>, ExtractError> {
        if is_blank(file) {
            return Ok(Vec::new());
        }
        let path = file.path();
        let group = file_group(path);
        let install_requires = static_regex(r"^install_requires\s*=\s*(?P<requirements>.+)?\s*$");

        let mut records: BTreeMap<(String, String), PackageRecord> = BTreeMap::new();
        let mut add = |text: &str, raw_line: &str, line_number: usize| -> Result<(), ExtractError> {
            let requirement = parse_requirement(text).ok_or_else(|| {
                ExtractError::parse(
                    Path::new(path),
                    format!("could not parse requirement on line {}", line_number),
                )
            })?;
            let record = requirement.into_record(path, PackageManager::SetupTools, raw_line, line_number);
            records
                .entry((record.name.clone(), record.version.clone()))
                .or_insert(record)
                .add_dep_group(group.clone());
            Ok(())
        };

        let mut section = Section::Preamble;
        for (index, line) in text_to_lines(file.text()).iter().enumerate() {
            let line_number = index + 1;
            let clean = strip_comment(line);
            if clean.is_empty() {
                continue;
            }

            match section {
                Section::Preamble => {
                    if clean.starts_with("[options]") {
                        section = Section::Options;
                    }
                }
                Section::Options => {
                    if clean.starts_with('[') {
                        break;
                    }
                    let Some(captures) = install_requires.captures(&clean) else {
                        continue;
                    };
                    section = Section::InstallRequires;
                    if let Some(inline) = captures.name("requirements") {
                        for requirement in inline.as_str().split(';').map(str::trim) {
                            if !requirement.is_empty() {
                                add(requirement, line, line_number)?;
                            }
                        }
                        break;
                    }
                }
                Section::InstallRequires => {
                    // The indented block ends at the next key.
                    if first_non_empty_column(line) == Some(1) {
                        break;
                    }
                    if is_not_requirement_line(&clean) {
                        continue;
                    }
                    add(&clean, line, line_number)?;
                }
            }
        }

        if !matches!(section, Section::InstallRequires) {
            return Err(ExtractError::parse(
                Path::new(path),
                "could not find options.install_requires",
            ));
        }

        Ok(records.into_values().collect())
    }
}
