use crate::shared::error::SbomError;

/// CycloneDX spec version of the emitted SBOM
///
/// Both the CLI (`--format`) and the formatter need to agree on it, so it
/// lives in the application layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CycloneDxVersion {
    /// CycloneDX 1.4: components and dependencies only
    V1_4,
    /// CycloneDX 1.5: adds evidence occurrences (default)
    #[default]
    V1_5,
}

impl CycloneDxVersion {
    /// Values accepted by `--format`.
    pub const SUPPORTED: &'static str = "cyclonedx-1-4, cyclonedx-1-5";

    pub fn spec_version(self) -> &'static str {
        match self {
            CycloneDxVersion::V1_4 => "1.4",
            CycloneDxVersion::V1_5 => "1.5",
        }
    }

    pub fn schema(self) -> &'static str {
        match self {
            CycloneDxVersion::V1_4 => "http://cyclonedx.org/schema/bom-1.4.schema.json",
            CycloneDxVersion::V1_5 => "http://cyclonedx.org/schema/bom-1.5.schema.json",
        }
    }

    /// Whether components carry `evidence.occurrences`.
    pub fn has_evidence(self) -> bool {
        self == CycloneDxVersion::V1_5
    }
}

impl std::str::FromStr for CycloneDxVersion {
    type Err = SbomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cyclonedx-1-4" => Ok(CycloneDxVersion::V1_4),
            "cyclonedx-1-5" => Ok(CycloneDxVersion::V1_5),
            _ => Err(SbomError::UnsupportedFormat {
                format: s.to_string(),
                supported: Self::SUPPORTED.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for CycloneDxVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CycloneDxVersion::V1_4 => write!(f, "cyclonedx-1-4"),
            CycloneDxVersion::V1_5 => write!(f, "cyclonedx-1-5"),
        }
    }
}
