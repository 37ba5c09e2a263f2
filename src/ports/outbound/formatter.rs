use crate::application::read_models::SbomReadModel;
use crate::shared::Result;

/// SbomFormatter port for formatting SBOM output
///
/// This port abstracts the serialization of the BOM read model
/// (CycloneDX 1.4 or 1.5 JSON).
pub trait SbomFormatter {
    /// Formats the SBOM read model
    ///
    /// # Errors
    /// Returns an error if serialization fails
    fn format(&self, model: &SbomReadModel) -> Result<String>;
}

impl<T: SbomFormatter + ?Sized> SbomFormatter for Box<T> {
    fn format(&self, model: &SbomReadModel) -> Result<String> {
        (**self).format(model)
    }
}
