use crate::application::dto::ScanResponse;
use crate::application::read_models::{SbomReadModel, SbomReadModelBuilder};
use crate::ports::outbound::SbomFormatter;
use crate::sbom_generation::policies::PathRooting;
use crate::sbom_generation::services::PackageGrouper;
use crate::shared::Result;

/// GenerateSbomUseCase - groups scanned packages and renders the BOM
///
/// # Type Parameters
/// * `F` - SbomFormatter implementation
pub struct GenerateSbomUseCase<F> {
    formatter: F,
}

impl<F> GenerateSbomUseCase<F>
where
    F: SbomFormatter,
{
    pub fn new(formatter: F) -> Self {
        Self { formatter }
    }

    /// Groups the scanned records into components and builds the read model.
    pub fn build_model(&self, response: &ScanResponse, rooting: PathRooting) -> Result<SbomReadModel> {
        let grouped = PackageGrouper::group(&response.sources, rooting);
        tracing::debug!(
            "grouped {} record(s) into {} component(s) and {} artifact(s)",
            response.package_count(),
            grouped.components.len(),
            grouped.artifacts.len()
        );
        SbomReadModelBuilder::build(&grouped)
    }

    /// Renders the SBOM document for `response`.
    ///
    /// # Errors
    /// Returns an error if the read model cannot be built or serialized
    pub fn execute(&self, response: &ScanResponse, rooting: PathRooting) -> Result<String> {
        let model = self.build_model(response, rooting)?;
        self.formatter.format(&model)
    }
}
