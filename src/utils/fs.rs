//! Filesystem collaborator: source reads and destination writes.
//!
//! All functions are blocking and meant to run on a worker thread.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;
use tracing::debug;
use crate::utils::PathError;

/// Get file size in bytes
pub fn source_size(path: impl AsRef<Path>) -> Result<u64, PathError> {
    let path = path.as_ref();
    let meta = fs::metadata(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => PathError::NotFound(path.to_path_buf()),
        _ => PathError::from(e),
    })?;
    if !meta.is_file() {
        return Err(PathError::NotFile(path.to_path_buf()));
    }
    Ok(meta.len())
}

/// Reads the whole source file.
pub fn read_source(path: impl AsRef<Path>) -> Result<Vec<u8>, PathError> {
    let path = path.as_ref();
    fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => PathError::NotFound(path.to_path_buf()),
        _ => PathError::IO(format!("Cannot read {}: {}", path.display(), e)),
    })
}

/// Creates the parent directory of `path` if it is missing.
pub fn ensure_parent_dir(path: impl AsRef<Path>) -> Result<(), PathError> {
    match path.as_ref().parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
            debug!("Creating output directory {}", parent.display());
            fs::create_dir_all(parent)
                .map_err(|e| PathError::IO(format!("Cannot create {}: {}", parent.display(), e)))
        }
        _ => Ok(()),
    }
}

/// Writes `bytes` to `path`, creating parent directories as needed.
///
/// An existing destination is reported as [`PathError::AlreadyExists`]
/// unless `overwrite` is set.
pub fn write_destination(path: impl AsRef<Path>, bytes: &[u8], overwrite: bool) -> Result<(), PathError> {
    let path = path.as_ref();
    ensure_parent_dir(path)?;

    let mut options = OpenOptions::new();
    options.write(true);
    if overwrite {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }

    let mut file = options.open(path).map_err(|e| match e.kind() {
        ErrorKind::AlreadyExists => PathError::AlreadyExists(path.to_path_buf()),
        _ => PathError::IO(format!("Cannot open {}: {}", path.display(), e)),
    })?;
    file.write_all(bytes)
        .map_err(|e| PathError::IO(format!("Cannot write {}: {}", path.display(), e)))
}

/// File name component for log lines, falling back to the full path.
pub fn extract_filename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
