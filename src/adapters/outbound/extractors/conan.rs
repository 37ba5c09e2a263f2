use super::{decode_json, is_blank};
use crate::ports::outbound::{DepFile, Extractor};
use crate::sbom_generation::domain::{
    Ecosystem, FileLocations, FilePosition, PackageManager, PackageRecord, Position,
};
use crate::shared::error::ExtractError;
use crate::shared::position::{in_json, JsonPositions};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

const BUILD_REQUIRES_GROUP: &str = "build-requires";
const PYTHON_REQUIRES_GROUP: &str = "python-requires";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConanGraphNode {
    #[serde(rename = "ref")]
    reference: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConanGraphLock {
    nodes: BTreeMap<String, ConanGraphNode>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConanLockfile {
    version: String,
    /// v0.4 and earlier.
    graph_lock: ConanGraphLock,
    /// v0.5 and later.
    requires: Vec<String>,
    build_requires: Vec<String>,
    python_requires: Vec<String>,
}

/// The `name` and `version` of `name/version[@user/channel][#rrev[%timestamp]]`.
#[derive(Debug, PartialEq, Eq)]
struct ConanReference<'a> {
    name: &'a str,
    version: &'a str,
}

fn parse_reference(reference: &str) -> Option<ConanReference<'_>> {
    let (name, rest) = reference.split_once('/')?;
    let end = rest.find(['@', '#']).unwrap_or(rest.len());
    let version = &rest[..end];
    if name.is_empty() || version.is_empty() {
        return None;
    }
    Some(ConanReference { name, version })
}

/// Positions of a reference string: the whole value as the block, with the
/// name and version parts inside it.
fn reference_locations(
    block: &FilePosition,
    value: Option<&FilePosition>,
    reference: &ConanReference<'_>,
    file_path: &str,
) -> FileLocations {
    let mut locations = FileLocations::new(block.clone().in_file(file_path));
    let Some(value) = value.filter(|value| value.line.start == value.line.end) else {
        return locations;
    };

    let name_start = value.column.start;
    let name_end = name_start + reference.name.chars().count();
    let version_start = name_end + 1;
    let version_end = version_start + reference.version.chars().count();
    let span = |start: usize, end: usize| {
        FilePosition::new(file_path, value.line, Position::new(start, end))
    };

    locations.name = Some(span(name_start, name_end));
    locations.version = Some(span(version_start, version_end));
    locations
}

fn record_at(
    reference: &str,
    path: &[&str],
    positions: &JsonPositions,
    file_path: &str,
) -> Option<PackageRecord> {
    let Some(parsed) = parse_reference(reference) else {
        tracing::debug!("Skipping unparseable conan reference '{}' in {}", reference, file_path);
        return None;
    };

    let mut record = PackageRecord::new(
        parsed.name,
        parsed.version,
        Ecosystem::ConanCenter,
        PackageManager::Conan,
    );

    let mut value_path = path.to_vec();
    if path.first() == Some(&"graph_lock") {
        value_path.push("ref");
    }
    if let Some(entry) = positions.get(path) {
        let value = positions.get(&value_path).and_then(|value| value.value.as_ref());
        record = record.with_locations(reference_locations(&entry.block, value, &parsed, file_path));
    }
    Some(record)
}

/// Extractor for Conan's `conan.lock` (graph lock v0.4 and the flat v0.5 format).
#[derive(Debug, Default)]
pub struct ConanLockExtractor;

impl ConanLockExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for ConanLockExtractor {
    fn should_extract(&self, path: &str) -> bool {
        Path::new(path)
            .file_name()
            .is_some_and(|name| name == "conan.lock")
    }

    fn extract(&self, file: &dyn DepFile) -> Result<Vec<PackageRecord>, ExtractError> {
        if is_blank(file) {
            return Ok(Vec::new());
        }

        let lockfile: ConanLockfile = decode_json(file)?;
        let positions = in_json(file.text());
        let mut records = Vec::new();

        if !lockfile.graph_lock.nodes.is_empty() {
            for (id, node) in &lockfile.graph_lock.nodes {
                // The root node describes the consumer project and has no ref.
                if node.reference.is_empty() {
                    continue;
                }
                let path = ["graph_lock", "nodes", id.as_str()];
                records.extend(record_at(&node.reference, &path, &positions, file.path()));
            }
            return Ok(records);
        }

        let sections = [
            ("requires", &lockfile.requires, None),
            ("build_requires", &lockfile.build_requires, Some(BUILD_REQUIRES_GROUP)),
            ("python_requires", &lockfile.python_requires, Some(PYTHON_REQUIRES_GROUP)),
        ];
        for (section, references, group) in sections {
            for (index, reference) in references.iter().enumerate() {
                let index = index.to_string();
                let path = [section, index.as_str()];
                if let Some(mut record) = record_at(reference, &path, &positions, file.path()) {
                    if let Some(group) = group {
                        record.add_dep_group(group);
                    }
                    records.push(record);
                }
            }
        }

        if records.is_empty() && !lockfile.version.is_empty() && !lockfile.version.starts_with("0.") {
            return Err(ExtractError::schema_version(Path::new(file.path()), &lockfile.version));
        }

        Ok(records)
    }
}
