use crate::shared::error::ExtractError;
use std::path::{Path, PathBuf};

/// DepFile port for one opened dependency file
///
/// The whole file is loaded when it is opened; the handle is dropped as soon
/// as the extractor (and its matcher) are done with it.
pub trait DepFile {
    /// Canonical path of the file.
    fn path(&self) -> &str;

    /// Raw bytes, exactly as stored on disk.
    fn bytes(&self) -> &[u8];

    /// Contents decoded as text: a UTF-8 byte-order mark is stripped and
    /// UTF-16 files are transcoded.
    fn text(&self) -> &str;

    /// Opens another file. Relative paths are resolved against the
    /// directory containing this file.
    ///
    /// # Errors
    /// `NotFound` when the file does not exist, `Io` for other failures.
    fn open(&self, path: &str) -> Result<Box<dyn DepFile>, ExtractError>;

    /// Directory containing this file.
    fn dir(&self) -> &Path {
        Path::new(self.path()).parent().unwrap_or_else(|| Path::new(""))
    }

    /// File name without its directory.
    fn file_name(&self) -> &str {
        Path::new(self.path())
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
    }
}

/// DepFileSystem port for discovering and opening dependency files
pub trait DepFileSystem {
    /// Lists the files to consider under `root` in lexicographic path order.
    ///
    /// When `root` is a file, only that file is returned. The top level is
    /// always listed; subdirectories only when `recursive` is set. Ignore
    /// files are honoured unless `no_ignore` is set.
    ///
    /// # Errors
    /// Returns an error if `root` does not exist or cannot be read.
    fn list_files(
        &self,
        root: &Path,
        recursive: bool,
        no_ignore: bool,
    ) -> crate::shared::Result<Vec<PathBuf>>;

    /// Opens one file.
    ///
    /// # Errors
    /// `NotFound` when the file does not exist, `Io` for other failures.
    fn open(&self, path: &Path) -> Result<Box<dyn DepFile>, ExtractError>;
}
