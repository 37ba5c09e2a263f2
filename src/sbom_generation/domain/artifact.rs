use super::ecosystem::Ecosystem;

/// Identity of a build artifact and the file that declares it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactDetail {
    pub name: String,
    pub version: String,
    pub ecosystem: Ecosystem,
    pub filename: String,
}

/// A build artifact (e.g. a Maven module) found while scanning.
///
/// `depends_on` is a lookup key for the parent artifact, not ownership of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactDescriptor {
    pub detail: ArtifactDetail,
    pub depends_on: Option<ArtifactDetail>,
}

impl ArtifactDescriptor {
    pub fn new(detail: ArtifactDetail) -> Self {
        Self {
            detail,
            depends_on: None,
        }
    }

    pub fn with_parent(mut self, parent: ArtifactDetail) -> Self {
        self.depends_on = Some(parent);
        self
    }

    pub fn filename(&self) -> &str {
        &self.detail.filename
    }

    /// Whether this artifact is the package `name@version`.
    pub fn is_package(&self, name: &str, version: &str) -> bool {
        self.detail.name == name && self.detail.version == version
    }

    pub fn map_filenames<F>(&mut self, rewrite: F)
    where
        F: Fn(&str) -> String,
    {
        self.detail.filename = rewrite(&self.detail.filename);
        if let Some(parent) = self.depends_on.as_mut() {
            parent.filename = rewrite(&parent.filename);
        }
    }
}
