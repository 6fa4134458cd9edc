//! Whole-file JSON persistence shared by the credential and user stores.
//!
//! Records are small, so every write replaces the file: serialize, write to a
//! temporary sibling, fsync, then rename over the target. Readers therefore
//! see either the old record or the new one, never a torn write.
//!
//! There is no locking. Two writers racing on the same file both succeed and
//! the last rename wins.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::Path;

/// Atomically replace `path` with the pretty-printed JSON of `value`.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value).context("Failed to serialize record to JSON")?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let tmp_path = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp_path)
            .with_context(|| format!("Failed to create {}", tmp_path.display()))?;
        file.write_all(&json)
            .context("Failed to write record data")?;
        file.sync_all()
            .context("Failed to sync record to disk")?;
    }

    fs::rename(&tmp_path, path)
        .with_context(|| format!("Failed to move record into place at {}", path.display()))?;

    Ok(())
}

/// Read a JSON record. `Ok(None)` when the file does not exist.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", path.display()));
        }
    };

    let value = serde_json::from_slice(&bytes)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(Some(value))
}
