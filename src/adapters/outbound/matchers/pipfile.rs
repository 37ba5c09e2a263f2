use super::{mark_declared, toml_key_locations};
use crate::adapters::outbound::extractors::{decode_toml, is_blank};
use crate::ports::outbound::{DepFile, Matcher};
use crate::sbom_generation::domain::{ArtifactDescriptor, PackageRecord, DEV_GROUP, PROD_GROUP};
use crate::sbom_generation::services::normalize_python_name;
use crate::shared::error::ExtractError;
use crate::shared::position::text_to_lines;
use serde::Deserialize;
use std::collections::BTreeMap;

const PIPFILE: &str = "Pipfile";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Pipfile {
    packages: BTreeMap<String, toml::Value>,
    #[serde(rename = "dev-packages")]
    dev_packages: BTreeMap<String, toml::Value>,
}

/// Declared requirement of a Pipfile entry: either the string itself or the
/// `version` key of a table. `*` declares no constraint.
pub(crate) fn declared_requirement(value: &toml::Value) -> &str {
    let requirement = match value {
        toml::Value::String(requirement) => requirement.as_str(),
        toml::Value::Table(table) => table
            .get("version")
            .and_then(toml::Value::as_str)
            .unwrap_or_default(),
        _ => "",
    };
    match requirement.trim() {
        "*" => "",
        trimmed => trimmed,
    }
}

/// Matcher for the `Pipfile` next to a `Pipfile.lock`.
#[derive(Debug, Default)]
pub struct PipfileMatcher;

impl Matcher for PipfileMatcher {
    fn get_source_file(&self, lockfile: &dyn DepFile) -> Result<Box<dyn DepFile>, ExtractError> {
        lockfile.open(PIPFILE)
    }

    fn match_packages(
        &self,
        source_file: &dyn DepFile,
        records: &mut [PackageRecord],
    ) -> Result<Option<ArtifactDescriptor>, ExtractError> {
        if is_blank(source_file) {
            return Ok(None);
        }

        let pipfile: Pipfile = decode_toml(source_file)?;
        let lines = text_to_lines(source_file.text());

        let sections = [
            ("packages", &pipfile.packages, PROD_GROUP),
            ("dev-packages", &pipfile.dev_packages, DEV_GROUP),
        ];
        for (table, entries, group) in sections {
            for (key, value) in entries {
                let name = normalize_python_name(key);
                let requirement = declared_requirement(value);
                let locations = toml_key_locations(&lines, table, key, requirement, source_file.path());

                for record in records.iter_mut().filter(|record| record.name == name) {
                    mark_declared(record, requirement, Some(group), locations.clone());
                }
            }
        }

        Ok(None)
    }
}
