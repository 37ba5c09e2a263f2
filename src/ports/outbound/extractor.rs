use super::dep_file::DepFile;
use crate::sbom_generation::domain::{ArtifactDescriptor, PackageRecord};
use crate::shared::error::ExtractError;
use std::collections::BTreeSet;

/// Extractor port: parses one family of lockfiles into package records
pub trait Extractor: Send + Sync {
    /// Filename-based claim. Must be cheap and must not touch the file.
    fn should_extract(&self, path: &str) -> bool;

    /// Parses `file`.
    ///
    /// An empty file yields no records. A file that cannot be parsed yields
    /// [`ExtractError::Parse`].
    fn extract(&self, file: &dyn DepFile) -> Result<Vec<PackageRecord>, ExtractError>;

    /// Manifest correlators for the records this extractor produces, in the
    /// order they run. The first one to record manifest positions on a
    /// record keeps them.
    fn matchers(&self) -> Vec<&dyn Matcher> {
        Vec::new()
    }
}

/// Matcher port: correlates lockfile records with the manifest that
/// requested them
pub trait Matcher: Send + Sync {
    /// Opens the manifest conventionally found next to `lockfile`.
    ///
    /// # Errors
    /// `NotFound` when there is no such manifest, which is not a failure
    /// of the scan.
    fn get_source_file(&self, lockfile: &dyn DepFile) -> Result<Box<dyn DepFile>, ExtractError>;

    /// Enriches `records` in place from the manifest: marks direct
    /// dependencies, adds declared requirements and dependency groups, and
    /// records manifest positions.
    ///
    /// Returns the build artifact described by the manifest, if any.
    fn match_packages(
        &self,
        source_file: &dyn DepFile,
        records: &mut [PackageRecord],
    ) -> Result<Option<ArtifactDescriptor>, ExtractError>;
}

/// ExtractorLookup port: chooses the extractor for a path
pub trait ExtractorLookup {
    /// Every registered extractor id, in dispatch order.
    fn ids(&self) -> Vec<&'static str>;

    /// Returns the first enabled extractor claiming `path`, or the one
    /// named by `explicit_id`, which bypasses the filename check.
    ///
    /// An empty `enabled` set enables every extractor.
    fn find_extractor(
        &self,
        path: &str,
        explicit_id: Option<&str>,
        enabled: &BTreeSet<String>,
    ) -> Result<(&'static str, &dyn Extractor), ExtractError>;
}

impl<T: ExtractorLookup + ?Sized> ExtractorLookup for &T {
    fn ids(&self) -> Vec<&'static str> {
        (**self).ids()
    }

    fn find_extractor(
        &self,
        path: &str,
        explicit_id: Option<&str>,
        enabled: &BTreeSet<String>,
    ) -> Result<(&'static str, &dyn Extractor), ExtractError> {
        (**self).find_extractor(path, explicit_id, enabled)
    }
}
