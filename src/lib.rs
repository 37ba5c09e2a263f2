//! lockfile-sbom - CycloneDX SBOMs from lockfiles, with source locations
//!
//! This library walks directories for lockfiles of many ecosystems (npm,
//! pnpm, Yarn, Maven, Gradle, Go, NuGet, Python, Ruby, PHP, Rust, Elixir,
//! Dart, C/C++, Alpine, Debian, R), extracts every resolved package with the
//! line and column where it is declared, correlates it with the manifest
//! that requested it, and emits a deterministic CycloneDX 1.4 or 1.5 SBOM.
//!
//! # Architecture
//!
//! The library is organized into the following layers:
//!
//! - **Domain Layer** (`sbom_generation`): package records, positions, PURLs and grouping
//! - **Application Layer** (`application`): use cases, DTOs and read models
//! - **Ports** (`ports`): Interface definitions for infrastructure
//! - **Adapters** (`adapters`): extractors, matchers, file system, formatter and console
//! - **Shared** (`shared`): error types, position helpers and the regex cache
//!
//! # Example
//!
//! ```no_run
//! use lockfile_sbom::prelude::*;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<()> {
//! let reporter = StderrProgressReporter::new(Verbosity::Warn);
//! let scanner = ScanDirectoriesUseCase::new(
//!     LocalFileSystem::new(),
//!     ExtractorRegistry::global(),
//!     reporter,
//! );
//!
//! let request = ScanRequest::new(vec![PathBuf::from("/path/to/repo")]);
//! let response = scanner.scan(&request)?;
//!
//! let generator = GenerateSbomUseCase::new(CycloneDxFormatter::new(CycloneDxVersion::V1_5));
//! let sbom = generator.execute(&response, request.rooting())?;
//! StdoutPresenter::new().present(&sbom)?;
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod application;
pub mod ports;
pub mod sbom_generation;
pub mod shared;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::adapters::outbound::console::StderrProgressReporter;
    pub use crate::adapters::outbound::extractors::ExtractorRegistry;
    pub use crate::adapters::outbound::filesystem::{
        FileSystemWriter, LocalDepFile, LocalFileSystem, StdoutPresenter,
    };
    pub use crate::adapters::outbound::formatters::CycloneDxFormatter;
    pub use crate::application::dto::{CycloneDxVersion, ScanRequest, ScanResponse, Verbosity};
    pub use crate::application::read_models::{SbomReadModel, SbomReadModelBuilder};
    pub use crate::application::use_cases::{GenerateSbomUseCase, ScanDirectoriesUseCase};
    pub use crate::ports::inbound::ScanPort;
    pub use crate::ports::outbound::{
        DepFile, DepFileSystem, Extractor, ExtractorLookup, Matcher, OutputPresenter,
        ProgressReporter, SbomFormatter,
    };
    pub use crate::sbom_generation::domain::{
        ArtifactDescriptor, Ecosystem, FileLocations, FilePosition, Lockfile, PackageComponent,
        PackageManager, PackageRecord, Position, ScannedSource,
    };
    pub use crate::sbom_generation::services::{GroupedPackages, PackageGrouper, PackageUrl};
    pub use crate::shared::error::{ExitCode, ExtractError, SbomError};
    pub use crate::shared::Result;
}
