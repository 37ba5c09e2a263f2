use super::ecosystem::{Ecosystem, PackageManager};
use super::file_position::{FileLocations, FilePosition};
use std::collections::{BTreeMap, BTreeSet};

pub const PROD_GROUP: &str = "prod";
pub const DEV_GROUP: &str = "dev";
pub const OPTIONAL_GROUP: &str = "optional";

/// One resolved package as read from a lockfile, possibly enriched by a matcher.
///
/// Extractors create records; a matcher may mutate them once; the grouper then
/// consumes them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageRecord {
    pub name: String,
    pub version: String,
    pub commit: String,
    pub ecosystem: Ecosystem,
    /// Ecosystem to compare versions as, when it differs from `ecosystem`.
    pub compare_as: Option<Ecosystem>,
    pub package_manager: PackageManager,
    pub is_direct: bool,
    pub dep_groups: BTreeSet<String>,
    pub target_versions: Vec<String>,
    /// Positions inside the lockfile.
    pub locations: FileLocations,
    /// Positions inside the manifest, set by a matcher.
    pub source_locations: Option<FileLocations>,
    /// Names of the packages this one depends on, when the lockfile records them.
    pub dependencies: Vec<String>,
    /// Opaque per-record annotations (requirement options, environment markers, ...).
    /// Never used for matching.
    pub annotations: BTreeMap<String, String>,
}

impl PackageRecord {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        ecosystem: Ecosystem,
        package_manager: PackageManager,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ecosystem,
            package_manager,
            ..Self::default()
        }
    }

    pub fn with_commit(mut self, commit: impl Into<String>) -> Self {
        self.commit = commit.into();
        self
    }

    pub fn with_block(mut self, block: FilePosition) -> Self {
        self.locations.block = block;
        self
    }

    pub fn with_locations(mut self, locations: FileLocations) -> Self {
        self.locations = locations;
        self
    }

    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for group in groups {
            self.add_dep_group(group);
        }
        self
    }

    pub fn add_dep_group(&mut self, group: impl Into<String>) {
        let group = group.into();
        if !group.is_empty() {
            self.dep_groups.insert(group);
        }
    }

    /// Appends a manifest-side requirement, keeping first-seen order.
    pub fn add_target_version(&mut self, target: impl Into<String>) {
        let target = target.into();
        if !target.is_empty() && !self.target_versions.contains(&target) {
            self.target_versions.push(target);
        }
    }

    /// Records where the manifest declares this package.
    ///
    /// Lockfile positions win: the manifest positions only replace them when
    /// the extractor could not recover a block of its own. The first manifest
    /// declaration recorded is kept.
    pub fn graft_source_locations(&mut self, locations: FileLocations) {
        if self.source_locations.is_some() {
            return;
        }
        if !self.locations.block.is_extracted() {
            self.locations = locations.clone();
        }
        self.source_locations = Some(locations);
    }

    /// Identity used to collapse duplicate installs: the commit when the
    /// package comes from a repository, the version otherwise.
    pub fn dedup_key(&self) -> (&str, &str) {
        if self.commit.is_empty() {
            (&self.name, &self.version)
        } else {
            (&self.name, &self.commit)
        }
    }

    pub fn is_version_empty(&self) -> bool {
        self.version.is_empty()
    }

    /// Merges another sighting of the same package into this record.
    pub fn absorb(&mut self, other: PackageRecord) {
        self.is_direct |= other.is_direct;
        self.dep_groups.extend(other.dep_groups);
        for target in other.target_versions {
            self.add_target_version(target);
        }
        for dependency in other.dependencies {
            if !self.dependencies.contains(&dependency) {
                self.dependencies.push(dependency);
            }
        }
        if !self.locations.block.is_extracted() && other.locations.block.is_extracted() {
            self.locations = other.locations;
        }
    }
}

/// Sorts records by `(name, version)`, stable for equal keys.
pub fn sort_records(records: &mut [PackageRecord]) {
    records.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.version.cmp(&b.version)));
}
