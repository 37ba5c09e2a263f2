use super::ecosystem::Ecosystem;
use super::file_position::FilePosition;
use serde::Serialize;
use std::collections::BTreeMap;

pub const PACKAGE_MANAGER_METADATA: &str = "package-manager";
pub const IS_DIRECT_DEPENDENCY_METADATA: &str = "is-direct-dependency";
pub const IS_DEV_DEPENDENCY_METADATA: &str = "is-dev-dependency";

/// Serialized form of a position, as embedded in SBOM evidence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PackageLocation {
    pub file_name: String,
    pub line_start: usize,
    pub line_end: usize,
    pub column_start: usize,
    pub column_end: usize,
}

impl PackageLocation {
    pub fn from_position(position: &FilePosition, file_name: String) -> Self {
        Self {
            file_name,
            line_start: position.line.start,
            line_end: position.line.end,
            column_start: position.column.start,
            column_end: position.column.end,
        }
    }

    /// `file#line_start#line_end#column_start#column_end`
    pub fn hash_key(&self) -> String {
        format!(
            "{}#{}#{}#{}#{}",
            self.file_name, self.line_start, self.line_end, self.column_start, self.column_end
        )
    }

    fn sort_key(&self) -> (&str, usize, usize, usize, usize) {
        (
            &self.file_name,
            self.line_start,
            self.line_end,
            self.column_start,
            self.column_end,
        )
    }
}

/// Manifest-side positions attached to a location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourcefileLocations {
    pub block: PackageLocation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<PackageLocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<PackageLocation>,
}

/// One distinct occurrence of a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageLocations {
    pub block: PackageLocation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<PackageLocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<PackageLocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sourcefile: Option<SourcefileLocations>,
}

/// A package deduplicated across every scanned source, keyed by PURL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageComponent {
    pub purl: String,
    pub name: String,
    pub version: String,
    pub ecosystem: Ecosystem,
    pub metadata: BTreeMap<String, String>,
    pub locations: Vec<PackageLocations>,
}

impl PackageComponent {
    /// Orders locations by `(file, line start, line end, column start, column end)`.
    pub fn sort_locations(&mut self) {
        self.locations
            .sort_by(|a, b| a.block.sort_key().cmp(&b.block.sort_key()));
    }
}
