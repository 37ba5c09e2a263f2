use crate::application::dto::{ScanRequest, ScanResponse};
use crate::shared::Result;

/// ScanPort - Inbound port for scanning directories for dependency files
///
/// This is what the CLI drives: it hands over the scan actions and gets
/// every extracted lockfile back, ready for SBOM generation.
pub trait ScanPort {
    /// Scans the requested paths.
    ///
    /// Per-file failures are reported and skipped; they never fail the scan.
    ///
    /// # Errors
    /// Returns [`SbomError::NoPackagesFound`](crate::shared::error::SbomError::NoPackagesFound)
    /// when nothing was extracted, or an error when a scan path cannot be read.
    fn scan(&self, request: &ScanRequest) -> Result<ScanResponse>;
}
