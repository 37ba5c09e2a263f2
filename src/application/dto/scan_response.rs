use crate::sbom_generation::domain::ScannedSource;

/// ScanResponse - every lockfile extracted by a scan
///
/// Sources are in walk order: scan paths as given, files within each path
/// in lexicographic order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResponse {
    pub sources: Vec<ScannedSource>,
}

impl ScanResponse {
    pub fn new(sources: Vec<ScannedSource>) -> Self {
        Self { sources }
    }

    /// Total number of package records across all sources.
    pub fn package_count(&self) -> usize {
        self.sources
            .iter()
            .map(|source| source.lockfile.packages.len())
            .sum()
    }
}
