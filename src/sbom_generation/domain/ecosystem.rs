use std::fmt;
use std::str::FromStr;

/// Package ecosystems understood by the extractors.
///
/// `Unspecified` only appears for commit-only rows of a prepared CSV list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Ecosystem {
    Npm,
    PyPI,
    Maven,
    Go,
    NuGet,
    RubyGems,
    Packagist,
    Pub,
    Alpine,
    Debian,
    Cran,
    ConanCenter,
    CratesIo,
    Hex,
    #[default]
    Unspecified,
}

impl Ecosystem {
    pub const ALL: [Ecosystem; 14] = [
        Ecosystem::Npm,
        Ecosystem::PyPI,
        Ecosystem::Maven,
        Ecosystem::Go,
        Ecosystem::NuGet,
        Ecosystem::RubyGems,
        Ecosystem::Packagist,
        Ecosystem::Pub,
        Ecosystem::Alpine,
        Ecosystem::Debian,
        Ecosystem::Cran,
        Ecosystem::ConanCenter,
        Ecosystem::CratesIo,
        Ecosystem::Hex,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Ecosystem::Npm => "npm",
            Ecosystem::PyPI => "PyPI",
            Ecosystem::Maven => "Maven",
            Ecosystem::Go => "Go",
            Ecosystem::NuGet => "NuGet",
            Ecosystem::RubyGems => "RubyGems",
            Ecosystem::Packagist => "Packagist",
            Ecosystem::Pub => "Pub",
            Ecosystem::Alpine => "Alpine",
            Ecosystem::Debian => "Debian",
            Ecosystem::Cran => "CRAN",
            Ecosystem::ConanCenter => "ConanCenter",
            Ecosystem::CratesIo => "crates.io",
            Ecosystem::Hex => "Hex",
            Ecosystem::Unspecified => "",
        }
    }
}

impl fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Ecosystem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Ecosystem::Unspecified);
        }

        Ecosystem::ALL
            .iter()
            .find(|ecosystem| ecosystem.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| format!("unknown ecosystem \"{}\"", s))
    }
}

/// The tool that produced a lockfile. Several tools share one ecosystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PackageManager {
    Maven,
    Gradle,
    Npm,
    Yarn,
    Pnpm,
    Requirements,
    SetupTools,
    Pipfile,
    Poetry,
    Pdm,
    NuGet,
    Bundler,
    Golang,
    Composer,
    Cargo,
    Mix,
    Pub,
    Conan,
    Apk,
    Dpkg,
    Renv,
    #[default]
    Unknown,
}

impl PackageManager {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageManager::Maven => "Maven",
            PackageManager::Gradle => "Gradle",
            PackageManager::Npm => "NPM",
            PackageManager::Yarn => "Yarn",
            PackageManager::Pnpm => "Pnpm",
            PackageManager::Requirements => "Requirements",
            PackageManager::SetupTools => "SetupTools",
            PackageManager::Pipfile => "Pipfile",
            PackageManager::Poetry => "Poetry",
            PackageManager::Pdm => "Pdm",
            PackageManager::NuGet => "NuGet",
            PackageManager::Bundler => "Bundler",
            PackageManager::Golang => "Golang",
            PackageManager::Composer => "Composer",
            PackageManager::Cargo => "Cargo",
            PackageManager::Mix => "Mix",
            PackageManager::Pub => "Pub",
            PackageManager::Conan => "Conan",
            PackageManager::Apk => "Apk",
            PackageManager::Dpkg => "Dpkg",
            PackageManager::Renv => "Renv",
            PackageManager::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ecosystem_display_uses_osv_names() {
        assert_eq!(Ecosystem::PyPI.to_string(), "PyPI");
        assert_eq!(Ecosystem::CratesIo.to_string(), "crates.io");
        assert_eq!(Ecosystem::Cran.to_string(), "CRAN");
        assert_eq!(Ecosystem::Unspecified.to_string(), "");
    }

    #[test]
    fn test_ecosystem_from_str_is_case_insensitive() {
        assert_eq!("pypi".parse::<Ecosystem>().unwrap(), Ecosystem::PyPI);
        assert_eq!("NPM".parse::<Ecosystem>().unwrap(), Ecosystem::Npm);
        assert_eq!("crates.io".parse::<Ecosystem>().unwrap(), Ecosystem::CratesIo);
        assert_eq!("".parse::<Ecosystem>().unwrap(), Ecosystem::Unspecified);
    }

    #[test]
    fn test_ecosystem_from_str_rejects_unknown() {
        let err = "cocoapods".parse::<Ecosystem>().unwrap_err();
        assert!(err.contains("cocoapods"));
    }

    #[test]
    fn test_package_manager_names() {
        assert_eq!(PackageManager::Npm.to_string(), "NPM");
        assert_eq!(PackageManager::default(), PackageManager::Unknown);
    }
}
