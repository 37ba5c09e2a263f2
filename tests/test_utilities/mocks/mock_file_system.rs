use lockfile_sbom::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// In-memory DepFileSystem; directories exist when a file lives under them.
#[derive(Default, Clone)]
pub struct MockFileSystem {
    files: BTreeMap<PathBuf, String>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: &str, content: &str) -> Self {
        self.files.insert(PathBuf::from(path), content.to_string());
        self
    }
}

impl DepFileSystem for MockFileSystem {
    fn list_files(&self, root: &Path, recursive: bool, _no_ignore: bool) -> Result<Vec<PathBuf>> {
        if self.files.contains_key(root) {
            return Ok(vec![root.to_path_buf()]);
        }
        let files: Vec<PathBuf> = self
            .files
            .keys()
            .filter(|path| path.starts_with(root))
            .filter(|path| recursive || path.parent() == Some(root))
            .cloned()
            .collect();
        if files.is_empty() {
            anyhow::bail!("Failed to read directory: {}", root.display());
        }
        Ok(files)
    }

    fn open(&self, path: &Path) -> std::result::Result<Box<dyn DepFile>, ExtractError> {
        match self.files.get(path) {
            Some(content) => Ok(Box::new(LocalDepFile::from_content(
                path.to_string_lossy().into_owned(),
                content.as_str(),
            ))),
            None => Err(ExtractError::NotFound {
                path: path.to_path_buf(),
            }),
        }
    }
}
