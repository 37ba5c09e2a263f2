/// Use cases module containing application business logic orchestration
mod generate_sbom;
mod scan_directories;

pub use generate_sbom::GenerateSbomUseCase;
pub use scan_directories::ScanDirectoriesUseCase;
