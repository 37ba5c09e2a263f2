/// Outbound ports (Driven ports) - Infrastructure interfaces
///
/// These ports define the interfaces that the application core uses
/// to interact with external systems (file system, parsers, console, etc.).
pub mod dep_file;
pub mod extractor;
pub mod formatter;
pub mod output_presenter;
pub mod progress_reporter;

pub use dep_file::{DepFile, DepFileSystem};
pub use extractor::{Extractor, ExtractorLookup, Matcher};
pub use formatter::SbomFormatter;
pub use output_presenter::OutputPresenter;
pub use progress_reporter::ProgressReporter;
