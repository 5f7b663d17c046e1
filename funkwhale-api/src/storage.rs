//! Token persistence: reads and writes the OAuth token record on disk.
//!
//! The record is a single JSON object without envelope or versioning:
//!
//! ```json
//! {
//!   "access_token": "abc",
//!   "expires_at": 1735689600.0,
//!   "refresh_token": "r1",
//!   "token_type": "Bearer"
//! }
//! ```
//!
//! Neither function keeps state between calls. Writes go to a sibling
//! temporary file that is renamed over the target, so a concurrent reader
//! sees either the old or the new record, never a partial one.

use crate::error::{FunkwhaleError, Result};
use serde::Serialize;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Read the raw persisted record at `path`.
///
/// # Errors
///
/// - [`FunkwhaleError::NotFound`]: `path` does not exist
/// - [`FunkwhaleError::Io`]: any other read failure
pub fn read(path: &Path) -> Result<String> {
    match fs::read_to_string(path) {
        Ok(data) => Ok(data),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            Err(FunkwhaleError::NotFound(path.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Serialize `record` as JSON and persist it at `path`, replacing any prior
/// content. Parent directories are created as needed.
///
/// Returns the serialized form that was written.
pub fn write<T: Serialize + ?Sized>(path: &Path, record: &T) -> Result<String> {
    let data = serde_json::to_string(record)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let tmp = temp_path(path);
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(data.as_bytes())?;
        file.sync_all()?;
    }

    // The record holds secrets: owner read/write only.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))?;
    }

    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }

    debug!(path = %path.display(), bytes = data.len(), "token record written");
    Ok(data)
}

/// Delete the record at `path`. Missing files are not an error.
///
/// Never called by the session itself; only an explicit logout removes the
/// record.
pub fn remove(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "token".to_owned());
    path.with_file_name(format!(".{name}.tmp"))
}
