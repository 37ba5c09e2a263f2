use super::pipfile::declared_requirement;
use super::{mark_declared, toml_key_locations, toml_table_lines};
use crate::adapters::outbound::extractors::python::parse_requirement;
use crate::adapters::outbound::extractors::{decode_toml, is_blank};
use crate::ports::outbound::{DepFile, Matcher};
use crate::sbom_generation::domain::{
    ArtifactDescriptor, FileLocations, PackageRecord, DEV_GROUP, OPTIONAL_GROUP, PROD_GROUP,
};
use crate::sbom_generation::services::normalize_python_name;
use crate::shared::error::ExtractError;
use crate::shared::position::text_to_lines;
use serde::Deserialize;
use std::collections::BTreeMap;

const PYPROJECT_TOML: &str = "pyproject.toml";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Pyproject {
    project: Project,
    tool: Tool,
}

/// PEP 621 metadata.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
struct Project {
    dependencies: Vec<String>,
    optional_dependencies: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Tool {
    poetry: Poetry,
    pdm: Pdm,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
struct Poetry {
    dependencies: BTreeMap<String, toml::Value>,
    dev_dependencies: BTreeMap<String, toml::Value>,
    group: BTreeMap<String, PoetryGroup>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PoetryGroup {
    dependencies: BTreeMap<String, toml::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
struct Pdm {
    dev_dependencies: BTreeMap<String, Vec<String>>,
}

/// One declaration, whatever the section it comes from.
struct Declaration {
    name: String,
    requirement: String,
    group: String,
    locations: Option<FileLocations>,
}

/// Line of `table` holding the quoted requirement string `entry`.
fn entry_line<S: AsRef<str>>(lines: &[S], table: &str, entry: &str) -> Option<(usize, String)> {
    let (start, end) = toml_table_lines(lines, table)?;
    let quoted = [format!("\"{}\"", entry), format!("'{}'", entry)];
    lines[start..end]
        .iter()
        .enumerate()
        .find(|(_, line)| quoted.iter().any(|q| line.as_ref().contains(q.as_str())))
        .map(|(offset, line)| (start + offset + 1, line.as_ref().to_string()))
}

/// Declarations of a PEP 508 requirement array such as `dependencies = [...]`.
fn requirement_array<S: AsRef<str>>(
    lines: &[S],
    table: &str,
    entries: &[String],
    group: &str,
    filename: &str,
) -> Vec<Declaration> {
    entries
        .iter()
        .filter_map(|entry| {
            let Some(requirement) = parse_requirement(entry) else {
                tracing::warn!("Skipping unparsable requirement {:?} in {}", entry, filename);
                return None;
            };
            let locations = entry_line(lines, table, entry).map(|(line_number, line)| {
                requirement.locations(filename, &line, line_number)
            });
            Some(Declaration {
                name: requirement.name,
                requirement: requirement.requirement,
                group: group.to_string(),
                locations,
            })
        })
        .collect()
}

/// Declarations of a Poetry `name = requirement` table.
fn poetry_table<S: AsRef<str>>(
    lines: &[S],
    table: &str,
    entries: &BTreeMap<String, toml::Value>,
    group: &str,
    filename: &str,
) -> Vec<Declaration> {
    entries
        .iter()
        .filter(|(key, _)| key.as_str() != "python")
        .map(|(key, value)| {
            let requirement = declared_requirement(value);
            Declaration {
                name: normalize_python_name(key),
                requirement: requirement.to_string(),
                group: group.to_string(),
                locations: toml_key_locations(lines, table, key, requirement, filename),
            }
        })
        .collect()
}

impl Pyproject {
    /// Every declaration, runtime ones first.
    fn declarations<S: AsRef<str>>(&self, lines: &[S], filename: &str) -> Vec<Declaration> {
        let poetry = &self.tool.poetry;
        let mut declarations = requirement_array(lines, "project", &self.project.dependencies, PROD_GROUP, filename);
        declarations.extend(poetry_table(lines, "tool.poetry.dependencies", &poetry.dependencies, PROD_GROUP, filename));

        for entries in self.project.optional_dependencies.values() {
            declarations.extend(requirement_array(
                lines,
                "project.optional-dependencies",
                entries,
                OPTIONAL_GROUP,
                filename,
            ));
        }
        declarations.extend(poetry_table(
            lines,
            "tool.poetry.dev-dependencies",
            &poetry.dev_dependencies,
            DEV_GROUP,
            filename,
        ));
        for (name, group) in &poetry.group {
            let table = format!("tool.poetry.group.{}.dependencies", name);
            declarations.extend(poetry_table(lines, &table, &group.dependencies, name, filename));
        }
        for entries in self.tool.pdm.dev_dependencies.values() {
            declarations.extend(requirement_array(
                lines,
                "tool.pdm.dev-dependencies",
                entries,
                DEV_GROUP,
                filename,
            ));
        }

        declarations
    }
}

/// Matcher for the `pyproject.toml` next to Poetry and PDM lockfiles.
///
/// Reads PEP 621 `[project]` dependencies and optional dependencies, Poetry
/// dependency tables (including groups) and PDM dev-dependencies.
#[derive(Debug, Default)]
pub struct PyprojectTomlMatcher;

impl Matcher for PyprojectTomlMatcher {
    fn get_source_file(&self, lockfile: &dyn DepFile) -> Result<Box<dyn DepFile>, ExtractError> {
        lockfile.open(PYPROJECT_TOML)
    }

    fn match_packages(
        &self,
        source_file: &dyn DepFile,
        records: &mut [PackageRecord],
    ) -> Result<Option<ArtifactDescriptor>, ExtractError> {
        if is_blank(source_file) {
            return Ok(None);
        }

        let pyproject: Pyproject = decode_toml(source_file)?;
        let lines = text_to_lines(source_file.text());

        for declaration in pyproject.declarations(&lines, source_file.path()) {
            for record in records.iter_mut().filter(|record| record.name == declaration.name) {
                mark_declared(
                    record,
                    &declaration.requirement,
                    Some(declaration.group.as_str()),
                    declaration.locations.clone(),
                );
            }
        }

        Ok(None)
    }
}
