use clap::{Args, Parser, Subcommand};
use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::config::ConfigFile;
use lockfile_sbom::application::dto::{CycloneDxVersion, ScanRequest, Verbosity};
use lockfile_sbom::shared::Result;

/// Generate CycloneDX SBOMs from lockfiles, with the source location of
/// every package
#[derive(Parser, Debug)]
#[command(name = "lockfile-sbom")]
#[command(version)]
#[command(about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub scan: ScanArgs,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan directories or lockfiles (the default command)
    #[command(alias = "default")]
    Scan(ScanArgs),
}

#[derive(Args, Debug, Default, Clone)]
pub struct ScanArgs {
    /// Directories or lockfiles to scan (defaults to the current directory)
    #[arg(value_name = "DIRECTORY")]
    pub paths: Vec<PathBuf>,

    /// Output format: cyclonedx-1-4 or cyclonedx-1-5 [default: cyclonedx-1-5]
    #[arg(short, long)]
    pub format: Option<String>,

    /// Output file path (if not specified, outputs to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Scan subdirectories too
    #[arg(short, long)]
    pub recursive: bool,

    /// Also scan files excluded by .gitignore
    #[arg(long)]
    pub no_ignore: bool,

    /// Verbosity: error, warn, info or verbose [default: info]
    #[arg(long)]
    pub verbosity: Option<String>,

    /// Only report packages (always the case; kept for compatibility)
    #[arg(long)]
    pub experimental_only_packages: bool,

    /// Report paths as if each scanned directory were the root `/`
    #[arg(long)]
    pub consider_scan_path_as_root: bool,

    /// Report paths relative to each scanned directory
    #[arg(long)]
    pub paths_relative_to_scan_dir: bool,

    /// Extractor ids to enable, comma separated; may be repeated
    #[arg(long, value_delimiter = ',', value_name = "PARSERS")]
    pub enable_parsers: Vec<String>,

    /// Config file (defaults to lockfile-sbom.config.yml in the current directory)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Arguments of the command to run; no subcommand means `scan`.
    pub fn into_scan_args(self) -> ScanArgs {
        match self.command {
            Some(Command::Scan(args)) => args,
            None => self.scan,
        }
    }
}

/// Settings of one run, after merging flags over the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub request: ScanRequest,
    pub format: CycloneDxVersion,
    pub verbosity: Verbosity,
    pub output: Option<PathBuf>,
}

impl ScanArgs {
    /// Merges the flags over `config`. A flag that is set wins; boolean
    /// flags can only switch an option on.
    ///
    /// # Errors
    /// Returns [`SbomError::UnsupportedFormat`](lockfile_sbom::shared::error::SbomError::UnsupportedFormat)
    /// or `UnsupportedVerbosity` for unknown values.
    pub fn resolve(self, config: ConfigFile) -> Result<Settings> {
        let format = match self.format.or(config.format) {
            Some(format) => format.parse::<CycloneDxVersion>()?,
            None => CycloneDxVersion::default(),
        };
        let verbosity = match self.verbosity.or(config.verbosity) {
            Some(level) => level.parse::<Verbosity>()?,
            None => Verbosity::default(),
        };

        let parsers = if self.enable_parsers.is_empty() {
            config.enable_parsers.unwrap_or_default()
        } else {
            self.enable_parsers
        };
        let enabled_parsers: BTreeSet<String> = parsers
            .iter()
            .map(|parser| parser.trim())
            .filter(|parser| !parser.is_empty())
            .map(str::to_string)
            .collect();

        let paths = if self.paths.is_empty() {
            vec![PathBuf::from(".")]
        } else {
            self.paths
        };

        Ok(Settings {
            request: ScanRequest {
                paths,
                recursive: self.recursive || config.recursive.unwrap_or(false),
                no_ignore: self.no_ignore || config.no_ignore.unwrap_or(false),
                enabled_parsers,
                only_packages: true,
                consider_scan_path_as_root: self.consider_scan_path_as_root
                    || config.consider_scan_path_as_root.unwrap_or(false),
                paths_relative_to_scan_dir: self.paths_relative_to_scan_dir
                    || config.paths_relative_to_scan_dir.unwrap_or(false),
            },
            format,
            verbosity,
            output: self.output,
        })
    }
}
