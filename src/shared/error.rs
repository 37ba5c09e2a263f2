use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Exit codes for the CLI application.
///
/// `UnrecognizedOption` keeps the historical 127 used when `--format` or
/// `--verbosity` receive a value the tool does not know.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Scan completed and the SBOM was written
    Success = 0,
    /// Scan or output failure (unreadable scan path, unwritable output, ...)
    ScanFailed = 1,
    /// Invalid command-line arguments (clap parsing errors)
    InvalidArguments = 2,
    /// Unknown output format or verbosity level
    UnrecognizedOption = 127,
}

impl ExitCode {
    /// Convert to i32 for use with std::process::exit
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitCode::Success => write!(f, "Success (0)"),
            ExitCode::ScanFailed => write!(f, "Scan Failed (1)"),
            ExitCode::InvalidArguments => write!(f, "Invalid Arguments (2)"),
            ExitCode::UnrecognizedOption => write!(f, "Unrecognized Option (127)"),
        }
    }
}

/// Errors raised while opening, extracting or matching a single dependency file.
///
/// The scanner treats every variant as a per-file failure: the file is
/// reported and the walk moves on.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not extract from {path}: {details}")]
    Parse { path: PathBuf, details: String },

    #[error("unsupported syntax in {path}: {details}")]
    UnsupportedSyntax { path: PathBuf, details: String },

    #[error("unsupported lockfile version {version} in {path}")]
    SchemaVersion { path: PathBuf, version: String },

    /// The file is not in the format the extractor reads (e.g. an
    /// extension-less file that is not a Go binary).
    #[error("{path} is not in a format the {extractor} extractor understands")]
    IncompatibleFormat { path: PathBuf, extractor: String },

    #[error("could not determine extractor {detail}")]
    ExtractorNotFound { detail: String },
}

impl ExtractError {
    /// Maps an I/O error onto `NotFound` or `Io` depending on its kind.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        if source.kind() == io::ErrorKind::NotFound {
            ExtractError::NotFound { path }
        } else {
            ExtractError::Io { path, source }
        }
    }

    pub fn parse(path: &Path, details: impl fmt::Display) -> Self {
        ExtractError::Parse {
            path: path.to_path_buf(),
            details: details.to_string(),
        }
    }

    pub fn unsupported(path: &Path, details: impl fmt::Display) -> Self {
        ExtractError::UnsupportedSyntax {
            path: path.to_path_buf(),
            details: details.to_string(),
        }
    }

    pub fn schema_version(path: &Path, version: impl fmt::Display) -> Self {
        ExtractError::SchemaVersion {
            path: path.to_path_buf(),
            version: version.to_string(),
        }
    }

    pub fn incompatible(path: &Path, extractor: &str) -> Self {
        ExtractError::IncompatibleFormat {
            path: path.to_path_buf(),
            extractor: extractor.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ExtractError::NotFound { .. })
    }
}

/// Application-level errors surfaced to the CLI.
#[derive(Debug, Error)]
pub enum SbomError {
    #[error("no packages found in scan\n\n💡 Hint: Check that the scanned directories contain supported lockfiles, or use --recursive")]
    NoPackagesFound,

    #[error("Invalid scan path: {path}\nReason: {reason}\n\n💡 Hint: Please specify existing directories or lockfiles")]
    InvalidScanPath { path: PathBuf, reason: String },

    #[error("Failed to write to file: {path}\nDetails: {details}\n\n💡 Hint: Please verify that the directory exists and you have write permissions")]
    FileWriteError { path: PathBuf, details: String },

    #[error("unsupported output format \"{format}\" - must be one of: {supported}")]
    UnsupportedFormat { format: String, supported: String },

    #[error("invalid verbosity level \"{level}\" - must be one of: {supported}")]
    UnsupportedVerbosity { level: String, supported: String },

    /// Validation error for builder patterns and configuration
    #[error("Validation error: {message}")]
    Validation { message: String },
}

impl SbomError {
    /// Exit code the CLI reports for this error.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            SbomError::UnsupportedFormat { .. } | SbomError::UnsupportedVerbosity { .. } => {
                ExitCode::UnrecognizedOption
            }
            _ => ExitCode::ScanFailed,
        }
    }
}
