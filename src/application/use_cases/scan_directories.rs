use crate::application::dto::{ScanRequest, ScanResponse};
use crate::ports::inbound::ScanPort;
use crate::ports::outbound::{DepFile, DepFileSystem, Extractor, ExtractorLookup, ProgressReporter};
use crate::sbom_generation::domain::{
    sort_records, ArtifactDescriptor, Lockfile, PackageRecord, ScannedSource,
};
use crate::shared::error::{ExtractError, SbomError};
use crate::shared::Result;
use std::path::Path;

/// ScanDirectoriesUseCase - walks the scan paths and extracts every lockfile
///
/// Files are visited in lexicographic order within each scan path, and scan
/// paths in the order they were given. A file that fails to extract is
/// reported and skipped; it never aborts the scan.
///
/// # Type Parameters
/// * `FS` - DepFileSystem implementation
/// * `L` - ExtractorLookup implementation
/// * `PR` - ProgressReporter implementation
pub struct ScanDirectoriesUseCase<FS, L, PR> {
    file_system: FS,
    extractors: L,
    progress_reporter: PR,
}

impl<FS, L, PR> ScanDirectoriesUseCase<FS, L, PR>
where
    FS: DepFileSystem,
    L: ExtractorLookup,
    PR: ProgressReporter,
{
    pub fn new(file_system: FS, extractors: L, progress_reporter: PR) -> Self {
        Self {
            file_system,
            extractors,
            progress_reporter,
        }
    }

    /// Extracts one file. `Ok(None)` when no enabled extractor claims it.
    fn scan_file(
        &self,
        path: &Path,
        request: &ScanRequest,
    ) -> std::result::Result<Option<Lockfile>, ExtractError> {
        let path_text = path.to_string_lossy();
        let found = self
            .extractors
            .find_extractor(&path_text, None, &request.enabled_parsers);
        let (id, extractor) = match found {
            Ok(found) => found,
            Err(ExtractError::ExtractorNotFound { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };

        let file = self.file_system.open(path)?;
        let mut packages = match extractor.extract(file.as_ref()) {
            Ok(packages) => packages,
            Err(ExtractError::IncompatibleFormat { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        let artifact = self.run_matchers(extractor, file.as_ref(), &mut packages);
        sort_records(&mut packages);

        self.progress_reporter.report(&format!(
            "Scanned {} file and found {} package{}",
            file.path(),
            packages.len(),
            if packages.len() == 1 { "" } else { "s" }
        ));

        Ok(Some(Lockfile {
            file_path: file.path().to_string(),
            parsed_as: id.to_string(),
            packages,
            artifact,
        }))
    }

    /// Runs the extractor's matchers in order. The first artifact found wins.
    fn run_matchers(
        &self,
        extractor: &dyn Extractor,
        lockfile: &dyn DepFile,
        packages: &mut [PackageRecord],
    ) -> Option<ArtifactDescriptor> {
        let mut artifact = None;
        for matcher in extractor.matchers() {
            let source = match matcher.get_source_file(lockfile) {
                Ok(source) => source,
                Err(e) if e.is_not_found() => {
                    tracing::debug!("no manifest next to {}: {}", lockfile.path(), e);
                    continue;
                }
                Err(e) => {
                    self.progress_reporter
                        .report_error(&format!("⚠️  Warning: {}", e));
                    continue;
                }
            };

            match matcher.match_packages(source.as_ref(), packages) {
                Ok(Some(found)) => {
                    artifact.get_or_insert(found);
                }
                Ok(None) => {}
                Err(e) => self.progress_reporter.report_error(&format!(
                    "⚠️  Warning: failed to match {} against {}: {}",
                    lockfile.path(),
                    source.path(),
                    e
                )),
            }
        }
        artifact
    }
}

impl<FS, L, PR> ScanPort for ScanDirectoriesUseCase<FS, L, PR>
where
    FS: DepFileSystem,
    L: ExtractorLookup,
    PR: ProgressReporter,
{
    fn scan(&self, request: &ScanRequest) -> Result<ScanResponse> {
        let mut sources = Vec::new();

        for root in &request.paths {
            self.progress_reporter
                .report(&format!("Scanning dir {}", root.display()));

            let files = self
                .file_system
                .list_files(root, request.recursive, request.no_ignore)?;
            // A file argument is rooted at its directory.
            let scan_root = if files.len() == 1 && files[0] == *root {
                root.parent().unwrap_or(root)
            } else {
                root.as_path()
            };
            let scan_root = scan_root.to_string_lossy().into_owned();

            for path in &files {
                match self.scan_file(path, request) {
                    Ok(Some(lockfile)) => sources.push(ScannedSource {
                        scan_root: scan_root.clone(),
                        lockfile,
                    }),
                    Ok(None) => {}
                    Err(e) => self.progress_reporter.report_error(&format!(
                        "⚠️  Warning: skipping {}: {}",
                        path.display(),
                        e
                    )),
                }
            }
        }

        let response = ScanResponse::new(sources);
        if response.package_count() == 0 {
            return Err(SbomError::NoPackagesFound.into());
        }

        self.progress_reporter.report_completion(&format!(
            "✅ Found {} package record(s) in {} file(s)",
            response.package_count(),
            response.sources.len()
        ));
        Ok(response)
    }
}
