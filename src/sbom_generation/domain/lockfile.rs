use super::artifact::ArtifactDescriptor;
use super::package_record::PackageRecord;

/// Result of running one extractor (and its matcher) over one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lockfile {
    pub file_path: String,
    pub parsed_as: String,
    pub packages: Vec<PackageRecord>,
    pub artifact: Option<ArtifactDescriptor>,
}

/// A lockfile together with the scan argument it was found under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedSource {
    pub scan_root: String,
    pub lockfile: Lockfile,
}
