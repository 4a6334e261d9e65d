//! Temp-file-and-rename writes and timestamped backups.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tf_core::PersistenceError;

/// Serialize `value` as indented JSON and atomically replace `path`.
///
/// The temp file lives in the destination directory so the final rename
/// never crosses filesystems. A crash before the rename leaves the old file.
pub(crate) fn write_json<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<(), PersistenceError> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| PersistenceError::io(dir, e))?;

    let data = serde_json::to_vec_pretty(value).map_err(|e| PersistenceError::json(path, e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| PersistenceError::io(dir, e))?;
    tmp.write_all(&data)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| PersistenceError::io(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| PersistenceError::io(path, e.error))?;
    Ok(())
}

/// Read and parse a JSON file; `None` when it does not exist.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, PersistenceError> {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(PersistenceError::io(path, e)),
    };
    serde_json::from_slice(&data)
        .map(Some)
        .map_err(|e| PersistenceError::json(path, e))
}

/// Remove a file, treating "already gone" as success.
pub(crate) fn remove_if_exists(path: &Path) -> Result<bool, PersistenceError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(PersistenceError::io(path, e)),
    }
}

/// Copy `src` into `backup_dir` as `trades_YYYYMMDD_HHMMSS.json`.
pub(crate) fn backup(
    src: &Path,
    backup_dir: &Path,
    now: DateTime<Utc>,
) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(backup_dir)?;
    let dest = backup_dir.join(format!("trades_{}.json", now.format("%Y%m%d_%H%M%S")));
    std::fs::copy(src, &dest)?;
    Ok(dest)
}
