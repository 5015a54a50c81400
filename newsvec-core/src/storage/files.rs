use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use serde::de::DeserializeOwned;
use serde::Serialize;
use crate::core::errors::{ErrorCode, NewsvecError, Result};

/// Replace `path` with the JSON encoding of `value`: write a sibling temp
/// file, fsync it, rename over the target, then fsync the directory.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    {
        let file = File::create(&tmp).map_err(|e| {
            NewsvecError::storage(
                ErrorCode::StorageIOError,
                format!("Failed to create {}: {}", tmp.display(), e),
            )
        })?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, value)?;
        writer.flush()?;
        writer
            .into_inner()
            .map_err(|e| NewsvecError::storage(ErrorCode::StorageIOError, e.to_string()))?
            .sync_all()?;
    }
    fs::rename(&tmp, path).map_err(|e| {
        NewsvecError::storage(
            ErrorCode::StorageIOError,
            format!("Failed to rename {} into place: {}", tmp.display(), e),
        )
    })?;
    if let Some(parent) = path.parent() {
        sync_dir(parent)?;
    }
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).map_err(|e| {
        NewsvecError::storage(
            ErrorCode::StorageIOError,
            format!("Failed to read {}: {}", path.display(), e),
        )
    })?;
    serde_json::from_slice(&bytes).map_err(|e| {
        NewsvecError::storage(
            ErrorCode::SerializationError,
            format!("Failed to parse {}: {}", path.display(), e),
        )
    })
}

/// Make directory entries (creates, renames) durable.
#[cfg(unix)]
pub fn sync_dir(dir: &Path) -> Result<()> {
    File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
pub fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}
