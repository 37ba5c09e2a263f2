use std::path::Path;

/// How file paths are rewritten relative to the directory they were scanned from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PathRooting {
    /// Present scanned paths as if the scan directory were `/`.
    pub consider_scan_path_as_root: bool,
    /// Present scanned paths relative to the scan directory.
    pub paths_relative_to_scan_dir: bool,
}

impl PathRooting {
    pub fn new(consider_scan_path_as_root: bool, paths_relative_to_scan_dir: bool) -> Self {
        Self {
            consider_scan_path_as_root,
            paths_relative_to_scan_dir,
        }
    }

    /// Rewrites `path` for output and normalizes separators to `/`.
    ///
    /// Paths outside `scan_root` are kept as they are.
    pub fn apply(&self, scan_root: &str, path: &str) -> String {
        let path = path.replace('\\', "/");
        if !self.consider_scan_path_as_root && !self.paths_relative_to_scan_dir {
            return path;
        }

        let root = scan_root.replace('\\', "/");
        let relative = match Path::new(&path).strip_prefix(Path::new(&root)) {
            Ok(relative) => relative.to_string_lossy().replace('\\', "/"),
            Err(_) => return path,
        };

        if self.consider_scan_path_as_root {
            format!("/{}", relative)
        } else {
            relative
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_keeps_absolute_paths() {
        let rooting = PathRooting::default();
        assert_eq!(rooting.apply("/repo", "/repo/app/yarn.lock"), "/repo/app/yarn.lock");
    }

    #[test]
    fn test_scan_path_as_root() {
        let rooting = PathRooting::new(true, false);
        assert_eq!(rooting.apply("/repo", "/repo/app/yarn.lock"), "/app/yarn.lock");
        assert_eq!(rooting.apply("/repo/", "/repo/yarn.lock"), "/yarn.lock");
    }

    #[test]
    fn test_relative_to_scan_dir() {
        let rooting = PathRooting::new(false, true);
        assert_eq!(rooting.apply("/repo", "/repo/app/yarn.lock"), "app/yarn.lock");
    }

    #[test]
    fn test_paths_outside_root_are_untouched() {
        let rooting = PathRooting::new(false, true);
        assert_eq!(rooting.apply("/repo", "/elsewhere/pom.xml"), "/elsewhere/pom.xml");
    }

    #[test]
    fn test_separators_are_normalized() {
        let rooting = PathRooting::default();
        assert_eq!(rooting.apply("C:\\repo", "C:\\repo\\go.mod"), "C:/repo/go.mod");
    }
}
