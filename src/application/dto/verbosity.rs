use crate::shared::error::SbomError;

/// How much the tool reports on stderr
///
/// Levels are ordered: each one shows everything the previous one does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    Error,
    Warn,
    #[default]
    Info,
    Verbose,
}

impl Verbosity {
    /// Values accepted by `--verbosity`.
    pub const SUPPORTED: &'static str = "error, warn, info, verbose";

    /// `tracing` filter directive for this level.
    pub fn filter_directive(self) -> &'static str {
        match self {
            Verbosity::Error => "error",
            Verbosity::Warn => "warn",
            Verbosity::Info => "info",
            Verbosity::Verbose => "debug",
        }
    }
}

impl std::str::FromStr for Verbosity {
    type Err = SbomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "error" => Ok(Verbosity::Error),
            "warn" | "warning" => Ok(Verbosity::Warn),
            "info" => Ok(Verbosity::Info),
            "verbose" | "debug" => Ok(Verbosity::Verbose),
            _ => Err(SbomError::UnsupportedVerbosity {
                level: s.to_string(),
                supported: Self::SUPPORTED.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_from_str() {
        assert_eq!(Verbosity::from_str("ERROR").unwrap(), Verbosity::Error);
        assert_eq!(Verbosity::from_str("warn").unwrap(), Verbosity::Warn);
        assert_eq!(Verbosity::from_str("verbose").unwrap(), Verbosity::Verbose);
        assert!(matches!(
            Verbosity::from_str("loud"),
            Err(SbomError::UnsupportedVerbosity { .. })
        ));
    }

    #[test]
    fn test_ordering() {
        assert!(Verbosity::Error < Verbosity::Warn);
        assert!(Verbosity::Info < Verbosity::Verbose);
        assert_eq!(Verbosity::default(), Verbosity::Info);
        assert_eq!(Verbosity::Verbose.filter_directive(), "debug");
    }
}
