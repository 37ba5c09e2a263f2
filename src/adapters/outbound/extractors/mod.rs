//! Lockfile extractors and the registry that dispatches paths to them.

mod apk;
mod cargo;
mod commit;
mod composer_lock;
mod conan;
mod csv;
mod dpkg;
mod gemfile_lock;
mod go_binary;
mod go_mod;
mod gradle;
pub(crate) mod maven;
mod mix;
pub(crate) mod npm;
mod nuget;
mod pdm;
mod pipenv;
mod pnpm;
mod poetry;
mod pubspec;
pub(crate) mod python;
mod renv;
mod requirements;
mod setup_cfg;
mod setup_py;
pub(crate) mod xml_tree;
mod yarn;

pub use apk::ApkInstalledExtractor;
pub use cargo::CargoLockExtractor;
pub use composer_lock::ComposerLockExtractor;
pub use conan::ConanLockExtractor;
pub use csv::CsvExtractor;
pub use dpkg::DpkgStatusExtractor;
pub use gemfile_lock::GemfileLockExtractor;
pub use go_binary::GoBinaryExtractor;
pub use go_mod::GoModExtractor;
pub use gradle::GradleLockExtractor;
pub use maven::MavenLockExtractor;
pub use mix::MixLockExtractor;
pub use npm::NpmLockExtractor;
pub use nuget::NuGetLockExtractor;
pub use pdm::PdmLockExtractor;
pub use pipenv::PipenvLockExtractor;
pub use pnpm::PnpmLockExtractor;
pub use poetry::PoetryLockExtractor;
pub use pubspec::PubspecLockExtractor;
pub use renv::RenvLockExtractor;
pub use requirements::RequirementsTxtExtractor;
pub use setup_cfg::SetupCfgExtractor;
pub use setup_py::SetupPyExtractor;
pub use yarn::YarnLockExtractor;

use crate::ports::outbound::{DepFile, Extractor, ExtractorLookup};
use crate::sbom_generation::domain::{FileLocations, FilePosition};
use crate::shared::error::ExtractError;
use crate::shared::position::find_in_block_by_regex;
use serde::de::value::MapAccessDeserializer;
use serde::de::{self, DeserializeOwned, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeSet;
use std::fmt;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::OnceLock;

/// Id of the extractor for Go executables, which have no fixed filename.
pub const GO_BINARY_ID: &str = "<go-binary>";

/// Id of the prepared-list extractor, only ever selected explicitly.
pub const CSV_ID: &str = "csv";

/// True when the file has no content besides whitespace.
pub(crate) fn is_blank(file: &dyn DepFile) -> bool {
    file.text().trim().is_empty()
}

pub(crate) fn decode_json<T: DeserializeOwned>(file: &dyn DepFile) -> Result<T, ExtractError> {
    serde_json::from_str(file.text()).map_err(|e| ExtractError::parse(Path::new(file.path()), e))
}

pub(crate) fn decode_toml<T: DeserializeOwned>(file: &dyn DepFile) -> Result<T, ExtractError> {
    toml::from_str(file.text()).map_err(|e| ExtractError::parse(Path::new(file.path()), e))
}

pub(crate) fn decode_yaml<T: DeserializeOwned>(file: &dyn DepFile) -> Result<T, ExtractError> {
    serde_yaml_ng::from_str(file.text()).map_err(|e| ExtractError::parse(Path::new(file.path()), e))
}

/// Reads a YAML scalar as the text written in the file. YAML types `1.10`
/// as a float and `yes` as a bool where lockfiles mean strings.
struct ScalarTextVisitor;

impl<'de> Visitor<'de> for ScalarTextVisitor {
    type Value = String;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a YAML scalar")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<String, E> {
        match value {
            "~" | "null" => Ok(String::new()),
            _ => Ok(value.to_string()),
        }
    }

    fn visit_bool<E: de::Error>(self, value: bool) -> Result<String, E> {
        Ok(value.to_string())
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<String, E> {
        Ok(value.to_string())
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<String, E> {
        Ok(value.to_string())
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<String, E> {
        Ok(value.to_string())
    }

    fn visit_unit<E: de::Error>(self) -> Result<String, E> {
        Ok(String::new())
    }

    fn visit_none<E: de::Error>(self) -> Result<String, E> {
        Ok(String::new())
    }
}

/// `deserialize_with` helper reading any YAML scalar into a `String`.
///
/// Straight from a YAML document the scalar keeps its source text. Buffered
/// input (untagged enums, `flatten`) only has the typed value left, so only
/// use it on fields decoded directly.
pub(crate) fn yaml_scalar<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_str(ScalarTextVisitor)
}

/// A YAML scalar kept as its source text, for map values.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct YamlText(pub String);

impl<'de> Deserialize<'de> for YamlText {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        yaml_scalar(deserializer).map(YamlText)
    }
}

/// A YAML node that is either a mapping decoded as `T` or a bare scalar.
///
/// Mapping fields read with [`yaml_scalar`] keep their source text. A bare
/// scalar is only seen typed, so a float-like one comes back normalized.
#[derive(Debug)]
pub(crate) enum MappingOrScalar<T> {
    Mapping(T),
    Scalar(String),
}

impl<T> Default for MappingOrScalar<T> {
    fn default() -> Self {
        MappingOrScalar::Scalar(String::new())
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for MappingOrScalar<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct NodeVisitor<T>(PhantomData<T>);

        impl<'de, T: Deserialize<'de>> Visitor<'de> for NodeVisitor<T> {
            type Value = MappingOrScalar<T>;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a YAML mapping or scalar")
            }

            fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<Self::Value, A::Error> {
                T::deserialize(MapAccessDeserializer::new(map)).map(MappingOrScalar::Mapping)
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
                ScalarTextVisitor.visit_str(value).map(MappingOrScalar::Scalar)
            }

            fn visit_bool<E: de::Error>(self, value: bool) -> Result<Self::Value, E> {
                ScalarTextVisitor.visit_bool(value).map(MappingOrScalar::Scalar)
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
                ScalarTextVisitor.visit_i64(value).map(MappingOrScalar::Scalar)
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
                ScalarTextVisitor.visit_u64(value).map(MappingOrScalar::Scalar)
            }

            fn visit_f64<E: de::Error>(self, value: f64) -> Result<Self::Value, E> {
                ScalarTextVisitor.visit_f64(value).map(MappingOrScalar::Scalar)
            }

            fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
                ScalarTextVisitor.visit_unit().map(MappingOrScalar::Scalar)
            }
        }

        deserializer.deserialize_any(NodeVisitor(PhantomData))
    }
}

/// 0-based inclusive line ranges of the blank-line separated stanzas of an
/// OS package database.
pub(crate) fn stanzas<S: AsRef<str>>(lines: &[S]) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut start: Option<usize> = None;
    for (index, line) in lines.iter().enumerate() {
        match (line.as_ref().trim().is_empty(), start) {
            (true, Some(first)) => {
                ranges.push((first, index - 1));
                start = None;
            }
            (false, None) => start = Some(index),
            _ => {}
        }
    }
    if let Some(first) = start {
        ranges.push((first, lines.len() - 1));
    }
    ranges
}

/// Locations of one `[[package]]` entry: its block plus the `name = "..."`
/// and `version = "..."` values found inside it.
pub(crate) fn toml_entry_locations<S: AsRef<str>>(
    lines: &[S],
    block: &FilePosition,
    name: &str,
    version: &str,
    file_path: &str,
) -> FileLocations {
    let block_lines = lines
        .get(block.line.start.saturating_sub(1)..block.line.end.min(lines.len()))
        .unwrap_or_default();
    let find = |key: &str, value: &str| {
        if value.is_empty() {
            return None;
        }
        let prefix = format!(r#"^\s*{}\s*=\s*""#, key);
        find_in_block_by_regex(block_lines, &regex::escape(value), block.line.start, &prefix, "\"")
            .map(|position| position.in_file(file_path))
    };

    FileLocations::new(block.clone().in_file(file_path))
        .with_name(find("name", name))
        .with_version(find("version", version))
}

/// Ordered table of extractors keyed by id.
///
/// Dispatch walks the table in registration order, so the order below is
/// part of the observable behaviour.
pub struct ExtractorRegistry {
    entries: Vec<(&'static str, Box<dyn Extractor>)>,
}

impl ExtractorRegistry {
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Registry holding every built-in extractor.
    pub fn with_builtin_extractors() -> Self {
        let mut registry = Self::empty();
        registry.register("package-lock.json", Box::new(NpmLockExtractor::new()));
        registry.register("pnpm-lock.yaml", Box::new(PnpmLockExtractor::new()));
        registry.register("yarn.lock", Box::new(YarnLockExtractor::new()));
        registry.register("pom.xml", Box::new(MavenLockExtractor::new()));
        registry.register("gradle.lockfile", Box::new(GradleLockExtractor::new()));
        registry.register("go.mod", Box::new(GoModExtractor::new()));
        registry.register("packages.lock.json", Box::new(NuGetLockExtractor::new()));
        registry.register("Pipfile.lock", Box::new(PipenvLockExtractor::new()));
        registry.register("poetry.lock", Box::new(PoetryLockExtractor::new()));
        registry.register("pdm.lock", Box::new(PdmLockExtractor::new()));
        registry.register("requirements.txt", Box::new(RequirementsTxtExtractor::new()));
        registry.register("setup.cfg", Box::new(SetupCfgExtractor::new()));
        registry.register("setup.py", Box::new(SetupPyExtractor::new()));
        registry.register("Gemfile.lock", Box::new(GemfileLockExtractor::new()));
        registry.register("composer.lock", Box::new(ComposerLockExtractor::new()));
        registry.register("Cargo.lock", Box::new(CargoLockExtractor::new()));
        registry.register("mix.lock", Box::new(MixLockExtractor::new()));
        registry.register("pubspec.lock", Box::new(PubspecLockExtractor::new()));
        registry.register("conan.lock", Box::new(ConanLockExtractor::new()));
        registry.register("installed", Box::new(ApkInstalledExtractor::new()));
        registry.register("Packages", Box::new(DpkgStatusExtractor::new()));
        // Claims any extension-less name, so it follows the OS package databases.
        registry.register(GO_BINARY_ID, Box::new(GoBinaryExtractor::new()));
        registry.register("renv.lock", Box::new(RenvLockExtractor::new()));
        registry.register(CSV_ID, Box::new(CsvExtractor::new()));
        registry
    }

    /// The process-wide registry, built on first use and never mutated after.
    pub fn global() -> &'static ExtractorRegistry {
        static REGISTRY: OnceLock<ExtractorRegistry> = OnceLock::new();
        REGISTRY.get_or_init(Self::with_builtin_extractors)
    }

    /// Adds `extractor` under `id`.
    ///
    /// # Panics
    /// When `id` is already registered.
    pub fn register(&mut self, id: &'static str, extractor: Box<dyn Extractor>) {
        assert!(
            self.get(id).is_none(),
            "an extractor with id \"{}\" is already registered",
            id
        );
        self.entries.push((id, extractor));
    }

    pub fn get(&self, id: &str) -> Option<&dyn Extractor> {
        self.entries
            .iter()
            .find(|(registered, _)| *registered == id)
            .map(|(_, extractor)| extractor.as_ref())
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::with_builtin_extractors()
    }
}

fn is_enabled(id: &str, enabled: &BTreeSet<String>) -> bool {
    enabled.is_empty() || enabled.contains(id)
}

impl ExtractorLookup for ExtractorRegistry {
    fn ids(&self) -> Vec<&'static str> {
        self.entries.iter().map(|(id, _)| *id).collect()
    }

    fn find_extractor(
        &self,
        path: &str,
        explicit_id: Option<&str>,
        enabled: &BTreeSet<String>,
    ) -> Result<(&'static str, &dyn Extractor), ExtractError> {
        if let Some(explicit_id) = explicit_id {
            return self
                .entries
                .iter()
                .find(|(id, _)| *id == explicit_id && is_enabled(id, enabled))
                .map(|(id, extractor)| (*id, extractor.as_ref()))
                .ok_or_else(|| ExtractError::ExtractorNotFound {
                    detail: format!("\"{}\" for {}", explicit_id, path),
                });
        }

        self.entries
            .iter()
            .find(|(id, extractor)| is_enabled(id, enabled) && extractor.should_extract(path))
            .map(|(id, extractor)| (*id, extractor.as_ref()))
            .ok_or_else(|| ExtractError::ExtractorNotFound {
                detail: format!("for {}", path),
            })
    }
}
