use crate::ports::outbound::{DepFile, DepFileSystem};
use crate::shared::error::{ExtractError, SbomError};
use crate::shared::security::{validate_dependency_file, MAX_FILE_SIZE};
use crate::shared::Result;
use ignore::WalkBuilder;
use std::cell::OnceCell;
use std::fs;
use std::path::{Path, PathBuf};

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];
const UTF16_LE_BOM: [u8; 2] = [0xFF, 0xFE];
const UTF16_BE_BOM: [u8; 2] = [0xFE, 0xFF];

/// Decodes file contents, honouring a UTF-8 or UTF-16 byte-order mark.
///
/// Files without a BOM are read as UTF-8; invalid sequences are replaced.
pub fn decode_text(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&UTF8_BOM) {
        return String::from_utf8_lossy(rest).into_owned();
    }

    let utf16 = |rest: &[u8], from_bytes: fn([u8; 2]) -> u16| {
        let units = rest
            .chunks_exact(2)
            .map(|pair| from_bytes([pair[0], pair[1]]));
        char::decode_utf16(units)
            .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect::<String>()
    };

    if let Some(rest) = bytes.strip_prefix(&UTF16_LE_BOM) {
        return utf16(rest, u16::from_le_bytes);
    }
    if let Some(rest) = bytes.strip_prefix(&UTF16_BE_BOM) {
        return utf16(rest, u16::from_be_bytes);
    }

    String::from_utf8_lossy(bytes).into_owned()
}

/// A dependency file read from the local file system.
pub struct LocalDepFile {
    path: String,
    bytes: Vec<u8>,
    text: OnceCell<String>,
}

impl LocalDepFile {
    /// Reads the file at `path`, following symlinks.
    ///
    /// # Errors
    /// `NotFound` when nothing exists at `path`; `Io` for directories,
    /// oversized files and read failures.
    pub fn open(path: &Path) -> std::result::Result<Self, ExtractError> {
        validate_dependency_file(path, MAX_FILE_SIZE)?;
        let canonical = fs::canonicalize(path).map_err(|e| ExtractError::io(path, e))?;
        let bytes = fs::read(&canonical).map_err(|e| ExtractError::io(path, e))?;

        Ok(Self {
            path: canonical.to_string_lossy().into_owned(),
            bytes,
            text: OnceCell::new(),
        })
    }

    /// A file that only exists in memory, used by tests and by callers that
    /// already hold the content.
    pub fn from_content(path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            bytes: content.into(),
            text: OnceCell::new(),
        }
    }
}

impl DepFile for LocalDepFile {
    fn path(&self) -> &str {
        &self.path
    }

    fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn text(&self) -> &str {
        self.text.get_or_init(|| decode_text(&self.bytes))
    }

    fn open(&self, path: &str) -> std::result::Result<Box<dyn DepFile>, ExtractError> {
        let target = Path::new(path);
        let resolved = if target.is_absolute() {
            target.to_path_buf()
        } else {
            self.dir().join(target)
        };

        Ok(Box::new(LocalDepFile::open(&resolved)?))
    }
}

/// DepFileSystem adapter over the local disk.
///
/// Directory walks use the `ignore` crate so `.gitignore`, `.ignore` and
/// `.git/info/exclude` are honoured unless disabled.
pub struct LocalFileSystem;

impl LocalFileSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LocalFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl DepFileSystem for LocalFileSystem {
    fn list_files(&self, root: &Path, recursive: bool, no_ignore: bool) -> Result<Vec<PathBuf>> {
        let metadata = fs::metadata(root).map_err(|e| SbomError::InvalidScanPath {
            path: root.to_path_buf(),
            reason: e.to_string(),
        })?;

        if metadata.is_file() {
            return Ok(vec![root.to_path_buf()]);
        }

        let mut builder = WalkBuilder::new(root);
        builder
            .hidden(false)
            .follow_links(false)
            .git_ignore(!no_ignore)
            .git_exclude(!no_ignore)
            .git_global(!no_ignore)
            .ignore(!no_ignore)
            .parents(!no_ignore)
            .require_git(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(|entry| entry.file_name() != ".git");
        if !recursive {
            builder.max_depth(Some(1));
        }

        let mut files = Vec::new();
        for entry in builder.build() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!("failed to walk {}: {}", root.display(), err);
                    continue;
                }
            };

            let is_file = entry.file_type().is_some_and(|file_type| {
                file_type.is_file() || (file_type.is_symlink() && entry.path().is_file())
            });
            if is_file {
                files.push(entry.into_path());
            }
        }

        Ok(files)
    }

    fn open(&self, path: &Path) -> std::result::Result<Box<dyn DepFile>, ExtractError> {
        Ok(Box::new(LocalDepFile::open(path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_decode_text_strips_utf8_bom() {
        assert_eq!(decode_text(b"\xEF\xBB\xBF{}"), "{}");
    }

    #[test]
    fn test_decode_text_utf16() {
        let little: Vec<u8> = [0xFF, 0xFE, b'o', 0, b'k', 0].to_vec();
        let big: Vec<u8> = [0xFE, 0xFF, 0, b'o', 0, b'k'].to_vec();
        assert_eq!(decode_text(&little), "ok");
        assert_eq!(decode_text(&big), "ok");
    }

    #[test]
    fn test_decode_text_plain_utf8() {
        assert_eq!(decode_text("héllo".as_bytes()), "héllo");
    }

    #[test]
    fn test_open_sibling_relative_to_file() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("package-lock.json"), "{}").unwrap();
        fs::write(temp_dir.path().join("package.json"), "{\"name\": \"x\"}").unwrap();

        let lockfile = LocalDepFile::open(&temp_dir.path().join("package-lock.json")).unwrap();
        let manifest = lockfile.open("package.json").unwrap();

        assert!(manifest.path().ends_with("package.json"));
        assert_eq!(manifest.text(), "{\"name\": \"x\"}");
        assert_eq!(lockfile.file_name(), "package-lock.json");
    }

    #[test]
    fn test_open_missing_sibling_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("Gemfile.lock"), "").unwrap();

        let lockfile = LocalDepFile::open(&temp_dir.path().join("Gemfile.lock")).unwrap();
        let err = lockfile.open("Gemfile").err().unwrap();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_list_files_top_level_only_by_default() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("yarn.lock"), "").unwrap();
        fs::create_dir(temp_dir.path().join("nested")).unwrap();
        fs::write(temp_dir.path().join("nested").join("go.mod"), "").unwrap();

        let files = LocalFileSystem::new()
            .list_files(temp_dir.path(), false, false)
            .unwrap();
        assert_eq!(files, vec![temp_dir.path().join("yarn.lock")]);

        let files = LocalFileSystem::new()
            .list_files(temp_dir.path(), true, false)
            .unwrap();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn test_list_files_sorted_and_gitignore_honoured() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(".gitignore"), "ignored.lock\n").unwrap();
        fs::write(temp_dir.path().join("b.lock"), "").unwrap();
        fs::write(temp_dir.path().join("a.lock"), "").unwrap();
        fs::write(temp_dir.path().join("ignored.lock"), "").unwrap();

        let names = |no_ignore| -> Vec<String> {
            LocalFileSystem::new()
                .list_files(temp_dir.path(), false, no_ignore)
                .unwrap()
                .iter()
                .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
                .collect()
        };

        assert_eq!(names(false), vec![".gitignore", "a.lock", "b.lock"]);
        assert_eq!(names(true), vec![".gitignore", "a.lock", "b.lock", "ignored.lock"]);
    }

    #[test]
    fn test_list_files_single_file_argument() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("pom.xml");
        fs::write(&file, "<project/>").unwrap();

        let files = LocalFileSystem::new().list_files(&file, false, false).unwrap();
        assert_eq!(files, vec![file]);
    }

    #[test]
    fn test_list_files_missing_root() {
        let temp_dir = TempDir::new().unwrap();
        let result = LocalFileSystem::new().list_files(&temp_dir.path().join("nope"), false, false);
        assert!(result.is_err());
    }
}
