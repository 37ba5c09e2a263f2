use crate::shared::Result;

/// OutputPresenter port for delivering the rendered SBOM
///
/// Implementations write to stdout or to the file named by `--output`.
pub trait OutputPresenter {
    /// Writes `content` to the destination.
    ///
    /// # Errors
    /// Returns an error if the destination cannot be written.
    fn present(&self, content: &str) -> Result<()>;
}
