/// Data Transfer Objects for application layer
///
/// DTOs carry the scan request from the CLI into the use cases and the
/// extracted lockfiles back out, keeping the domain layer isolated.
mod cyclonedx_version;
mod scan_request;
mod scan_response;
mod verbosity;

pub use cyclonedx_version::CycloneDxVersion;
pub use scan_request::ScanRequest;
pub use scan_response::ScanResponse;
pub use verbosity::Verbosity;
