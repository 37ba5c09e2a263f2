use super::{json_pair_locations, mark_declared};
use crate::adapters::outbound::extractors::{decode_json, is_blank};
use crate::ports::outbound::{DepFile, Matcher};
use crate::sbom_generation::domain::{ArtifactDescriptor, PackageRecord, DEV_GROUP, PROD_GROUP};
use crate::shared::error::ExtractError;
use crate::shared::position::in_json;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

const COMPOSER_JSON: &str = "composer.json";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ComposerJson {
    require: BTreeMap<String, Value>,
    #[serde(rename = "require-dev")]
    require_dev: BTreeMap<String, Value>,
}

/// Matcher for the `composer.json` next to a `composer.lock`.
///
/// `require` is applied before `require-dev`, so a package declared in both
/// keeps its production declaration's position.
#[derive(Debug, Default)]
pub struct ComposerJsonMatcher;

impl Matcher for ComposerJsonMatcher {
    fn get_source_file(&self, lockfile: &dyn DepFile) -> Result<Box<dyn DepFile>, ExtractError> {
        lockfile.open(COMPOSER_JSON)
    }

    fn match_packages(
        &self,
        source_file: &dyn DepFile,
        records: &mut [PackageRecord],
    ) -> Result<Option<ArtifactDescriptor>, ExtractError> {
        if is_blank(source_file) {
            return Ok(None);
        }

        let manifest: ComposerJson = decode_json(source_file)?;
        let positions = in_json(source_file.text());

        let sections = [
            ("require", &manifest.require, PROD_GROUP),
            ("require-dev", &manifest.require_dev, DEV_GROUP),
        ];
        for (section, entries, group) in sections {
            for (name, constraint) in entries {
                let constraint = constraint.as_str().unwrap_or_default();
                let locations = positions
                    .get(&[section, name.as_str()])
                    .map(|entry| json_pair_locations(entry, source_file.path()));

                for record in records
                    .iter_mut()
                    .filter(|record| record.name.eq_ignore_ascii_case(name))
                {
                    mark_declared(record, constraint, Some(group), locations.clone());
                }
            }
        }

        Ok(None)
    }
}
