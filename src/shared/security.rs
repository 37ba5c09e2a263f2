use crate::shared::error::ExtractError;
use crate::shared::Result;
use std::fs;
use std::io;
use std::path::Path;

/// Maximum size of a dependency file we are willing to load (256 MB).
///
/// Go binaries are read whole, so the limit is higher than a text lockfile needs.
pub const MAX_FILE_SIZE: u64 = 256 * 1024 * 1024;

/// Validates that a path is not a symbolic link
///
/// Used before writing output so that an attacker-controlled symlink cannot
/// redirect the SBOM somewhere else.
///
/// # Errors
/// Returns an error if the path is a symbolic link or if metadata cannot be read
pub fn validate_not_symlink(path: &Path, operation: &str) -> Result<()> {
    let metadata = fs::symlink_metadata(path).map_err(|e| {
        anyhow::anyhow!(
            "Failed to read metadata for {} operation on {}: {}",
            operation,
            path.display(),
            e
        )
    })?;

    if metadata.is_symlink() {
        anyhow::bail!(
            "Security: {} is a symbolic link. For security reasons, {} operations on symbolic links are not allowed.",
            path.display(),
            operation
        );
    }

    Ok(())
}

/// Checks that `path` is an existing regular file no larger than `max_size`.
///
/// Symlinks are followed: lockfiles are routinely symlinked inside monorepos.
///
/// # Errors
/// `NotFound` when nothing exists at `path`, `Io` for directories, oversized
/// files and any other metadata failure.
pub fn validate_dependency_file(path: &Path, max_size: u64) -> std::result::Result<u64, ExtractError> {
    let metadata = fs::metadata(path).map_err(|e| ExtractError::io(path, e))?;

    if !metadata.is_file() {
        return Err(ExtractError::Io {
            path: path.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
        });
    }

    if metadata.len() > max_size {
        return Err(ExtractError::Io {
            path: path.to_path_buf(),
            source: io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "file is too large ({} bytes, maximum allowed is {} bytes)",
                    metadata.len(),
                    max_size
                ),
            ),
        });
    }

    Ok(metadata.len())
}
