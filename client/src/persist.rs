//! Snapshot files on disk.

use crate::error::{Result, SyncError};
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use stocksync_engine::StoreSnapshot;
use tokio::fs;

/// Write a snapshot as pretty JSON.
///
/// The file is written next to `path` first and renamed into place, so a
/// crash never leaves a half-written snapshot behind.
pub async fn save(path: &Path, snapshot: &StoreSnapshot) -> Result<()> {
    let json = snapshot.to_json_pretty()?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| persist_error(parent, e))?;
    }

    let tmp = tmp_path(path);
    fs::write(&tmp, json)
        .await
        .map_err(|e| persist_error(&tmp, e))?;
    fs::rename(&tmp, path)
        .await
        .map_err(|e| persist_error(path, e))?;

    tracing::debug!(path = %path.display(), records = snapshot.record_count(), "Saved snapshot");
    Ok(())
}

/// Read a snapshot. A missing file is `Ok(None)`.
pub async fn load(path: &Path) -> Result<Option<StoreSnapshot>> {
    let json = match fs::read_to_string(path).await {
        Ok(json) => json,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(persist_error(path, e)),
    };

    Ok(Some(StoreSnapshot::from_json(&json)?))
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

fn persist_error(path: &Path, error: std::io::Error) -> SyncError {
    SyncError::Persist(format!("{}: {}", path.display(), error))
}
