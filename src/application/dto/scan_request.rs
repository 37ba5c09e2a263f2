use crate::sbom_generation::policies::PathRooting;
use std::collections::BTreeSet;
use std::path::PathBuf;

/// ScanRequest - what to scan and how
///
/// Built by the CLI from its flags and the optional config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanRequest {
    /// Directories (or single files) to scan
    pub paths: Vec<PathBuf>,
    /// Descend into subdirectories
    pub recursive: bool,
    /// Do not honour `.gitignore` and friends
    pub no_ignore: bool,
    /// Extractor ids to use; empty means all of them
    pub enabled_parsers: BTreeSet<String>,
    /// Only report packages. Always the case today, kept for the CLI flag.
    pub only_packages: bool,
    /// Present paths as if each scan path were `/`
    pub consider_scan_path_as_root: bool,
    /// Present paths relative to each scan path
    pub paths_relative_to_scan_dir: bool,
}

impl ScanRequest {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            paths,
            ..Self::default()
        }
    }

    /// How file paths of this scan are presented in the SBOM.
    pub fn rooting(&self) -> PathRooting {
        PathRooting::new(self.consider_scan_path_as_root, self.paths_relative_to_scan_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_defaults() {
        let request = ScanRequest::new(vec![PathBuf::from(".")]);
        assert_eq!(request.paths, vec![PathBuf::from(".")]);
        assert!(!request.recursive);
        assert!(request.enabled_parsers.is_empty());
        assert_eq!(request.rooting(), PathRooting::default());
    }

    #[test]
    fn test_rooting() {
        let request = ScanRequest {
            paths_relative_to_scan_dir: true,
            ..ScanRequest::default()
        };
        assert_eq!(request.rooting(), PathRooting::new(false, true));
    }
}
