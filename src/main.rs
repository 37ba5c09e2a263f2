mod cli;
mod config;

use clap::Parser;
use cli::{Cli, Settings};
use config::{discover_config, load_config_from_path, ConfigFile};
use lockfile_sbom::adapters::outbound::console::StderrProgressReporter;
use lockfile_sbom::adapters::outbound::extractors::ExtractorRegistry;
use lockfile_sbom::adapters::outbound::filesystem::LocalFileSystem;
use lockfile_sbom::application::dto::{ScanResponse, Verbosity};
use lockfile_sbom::application::factories::{FormatterFactory, PresenterFactory, PresenterType};
use lockfile_sbom::application::use_cases::{GenerateSbomUseCase, ScanDirectoriesUseCase};
use lockfile_sbom::ports::inbound::ScanPort;
use lockfile_sbom::ports::outbound::{ExtractorLookup, ProgressReporter};
use lockfile_sbom::shared::error::{ExitCode, SbomError};
use lockfile_sbom::shared::position::trace_enabled;
use lockfile_sbom::shared::Result;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    // clap prints its own message and exits with 2 (0 for --help/--version).
    let cli = Cli::try_parse().unwrap_or_else(|e| e.exit());

    if let Err(e) = run(cli) {
        eprintln!("\n❌ An error occurred:\n");
        eprintln!("{}", e);

        // Display error chain
        for cause in e.chain().skip(1) {
            eprintln!("\nCaused by: {}", cause);
        }

        eprintln!();
        let exit_code = e
            .downcast_ref::<SbomError>()
            .map_or(ExitCode::ScanFailed, SbomError::exit_code);
        process::exit(exit_code.as_i32());
    }
}

fn run(cli: Cli) -> Result<()> {
    let args = cli.into_scan_args();
    let config = load_config(args.config.as_deref())?;
    let mut settings = args.resolve(config)?;

    init_tracing(settings.verbosity);
    retain_known_parsers(&mut settings)?;
    settings.request.paths = canonicalize_paths(&settings.request.paths)?;

    let reporter = StderrProgressReporter::new(settings.verbosity);
    let scanner = ScanDirectoriesUseCase::new(
        LocalFileSystem::new(),
        ExtractorRegistry::global(),
        &reporter,
    );

    let response = match scanner.scan(&settings.request) {
        Ok(response) => response,
        Err(e) if matches!(e.downcast_ref::<SbomError>(), Some(SbomError::NoPackagesFound)) => {
            reporter.report_error(&format!("⚠️  Warning: {}", e));
            ScanResponse::default()
        }
        Err(e) => return Err(e),
    };

    reporter.report_verbose(&FormatterFactory::progress_message(settings.format));
    let generator = GenerateSbomUseCase::new(FormatterFactory::create(settings.format, false));
    let sbom = generator.execute(&response, settings.request.rooting())?;

    let presenter = PresenterFactory::create(PresenterType::from(settings.output.clone()));
    presenter.present(&sbom)?;

    Ok(())
}

/// Loads `--config`, or `lockfile-sbom.config.yml` from the current directory.
fn load_config(explicit: Option<&std::path::Path>) -> Result<ConfigFile> {
    match explicit {
        Some(path) => load_config_from_path(path),
        None => {
            let dir = std::env::current_dir()?;
            Ok(discover_config(&dir)?.unwrap_or_default())
        }
    }
}

/// Installs the stderr subscriber. `RUST_LOG` wins over `--verbosity`.
fn init_tracing(verbosity: Verbosity) {
    let level = if trace_enabled() {
        Verbosity::Verbose.filter_directive()
    } else {
        verbosity.filter_directive()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Ignore the error raised when a subscriber is already installed.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Drops unknown ids from `--enable-parsers` with a warning.
fn retain_known_parsers(settings: &mut Settings) -> Result<()> {
    let enabled = &mut settings.request.enabled_parsers;
    if enabled.is_empty() {
        return Ok(());
    }

    let known = ExtractorRegistry::global().ids();
    enabled.retain(|id| {
        let is_known = known.contains(&id.as_str());
        if !is_known {
            tracing::warn!("Unknown parser '{}' will be ignored.", id);
        }
        is_known
    });

    if enabled.is_empty() {
        return Err(SbomError::Validation {
            message: format!(
                "none of the parsers given to --enable-parsers exist\n\n💡 Hint: Known parsers are: {}",
                known.join(", ")
            ),
        }
        .into());
    }
    Ok(())
}

/// Scan paths as absolute, symlink-free paths.
fn canonicalize_paths(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    paths
        .iter()
        .map(|path| {
            path.canonicalize().map_err(|e| {
                anyhow::Error::from(SbomError::InvalidScanPath {
                    path: path.clone(),
                    reason: e.to_string(),
                })
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_canonicalize_paths() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("app");
        fs::create_dir(&nested).unwrap();

        let paths = canonicalize_paths(&[nested.join("..").join("app")]).unwrap();
        assert_eq!(paths, vec![nested.canonicalize().unwrap()]);
    }

    #[test]
    fn test_canonicalize_missing_path() {
        let err = canonicalize_paths(&[PathBuf::from("/nonexistent/path/that/does/not/exist")])
            .unwrap_err();
        assert!(format!("{}", err).contains("Invalid scan path"));
    }

    #[test]
    fn test_load_explicit_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("custom.yml");
        fs::write(&path, "recursive: true\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.recursive, Some(true));
    }
}
