use crate::adapters::outbound::formatters::CycloneDxFormatter;
use crate::application::dto::CycloneDxVersion;
use crate::ports::outbound::SbomFormatter;

/// Factory for creating SBOM formatters
///
/// Picks the formatter adapter for the CycloneDX version requested on the
/// command line.
pub struct FormatterFactory;

impl FormatterFactory {
    /// Creates a formatter for `version`, pretty-printing when `pretty` is set
    ///
    /// # Examples
    /// ```
    /// use lockfile_sbom::application::dto::CycloneDxVersion;
    /// use lockfile_sbom::application::factories::FormatterFactory;
    ///
    /// let formatter = FormatterFactory::create(CycloneDxVersion::V1_4, false);
    /// ```
    pub fn create(version: CycloneDxVersion, pretty: bool) -> Box<dyn SbomFormatter> {
        Box::new(CycloneDxFormatter::new(version).pretty(pretty))
    }

    /// Progress message shown before formatting
    pub fn progress_message(version: CycloneDxVersion) -> String {
        format!("📝 Generating CycloneDX {} output...", version.spec_version())
    }
}
