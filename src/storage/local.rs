//! Local filesystem storage implementation.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── diary_data.json        # Current snapshot
//! └── diary_data_prev.json   # Previous snapshot
//! ```
//!
//! Every write goes to a temporary file first and is renamed into place, so
//! readers never see a half-written snapshot.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Serialize, de::DeserializeOwned};

use crate::error::{AppError, Result};
use crate::models::DiaryEntry;
use crate::storage::{PREVIOUS_SNAPSHOT_KEY, SNAPSHOT_KEY, SnapshotStorage};

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    /// Get the full path for a relative key.
    pub fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Write JSON data.
    fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        write_json_file(&self.path(key), value)
    }

    /// Read JSON data.
    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        read_json_file(&self.path(key))
    }
}

impl SnapshotStorage for LocalStorage {
    fn load_snapshot(&self) -> Result<Option<Vec<DiaryEntry>>> {
        self.read_json(SNAPSHOT_KEY)
    }

    fn load_previous(&self) -> Result<Option<Vec<DiaryEntry>>> {
        self.read_json(PREVIOUS_SNAPSHOT_KEY)
    }

    fn rotate_snapshot(&self) -> Result<bool> {
        let current = self.path(SNAPSHOT_KEY);
        if !current.exists() {
            log::debug!("No snapshot at {:?} to rotate", current);
            return Ok(false);
        }
        fs::copy(&current, self.path(PREVIOUS_SNAPSHOT_KEY))?;
        log::info!("Rotated snapshot to {}", PREVIOUS_SNAPSHOT_KEY);
        Ok(true)
    }

    fn store_snapshot(&self, entries: &[DiaryEntry]) -> Result<()> {
        self.write_json(SNAPSHOT_KEY, entries)?;
        log::info!("Stored {} entries to {}", entries.len(), SNAPSHOT_KEY);
        Ok(())
    }
}

/// Ensure parent directory exists.
fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Write bytes atomically (write to temp, then rename).
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    ensure_parent(path)?;

    let tmp = path.with_extension("tmp");
    let mut file = fs::File::create(&tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&tmp, path)?;
    Ok(())
}

/// Serialize pretty JSON and write it atomically.
pub fn write_json_file<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &bytes)
}

/// Read and parse a JSON file, returning `None` if it doesn't exist.
pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(AppError::Io(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IndexDirection, Topic};
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn sample() -> Vec<DiaryEntry> {
        vec![DiaryEntry {
            date: "2025-02-01".to_string(),
            index_direction: IndexDirection::Index,
            topics: vec![Topic {
                title: "散歩".to_string(),
                block_id: "h-1".to_string(),
                last_edited_at: Utc.with_ymd_and_hms(2025, 2, 1, 9, 30, 0).unwrap(),
                content: vec!["川沿いを歩いた<br>桜がきれい".to_string()],
                hashtags: vec!["春".to_string()],
            }],
        }]
    }

    #[test]
    fn test_snapshot_round_trip() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage.store_snapshot(&sample()).unwrap();
        let loaded = storage.load_snapshot().unwrap().unwrap();
        assert_eq!(loaded, sample());

        // UTF-8 is written as-is, not escaped
        let raw = fs::read_to_string(storage.path(SNAPSHOT_KEY)).unwrap();
        assert!(raw.contains("散歩"));
        assert!(!storage.path("diary_data.tmp").exists());
    }

    #[test]
    fn test_read_nonexistent() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        assert!(storage.load_snapshot().unwrap().is_none());
        assert!(storage.load_previous().unwrap().is_none());
    }

    #[test]
    fn test_rotate_copies_current() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        // Nothing to rotate yet
        assert!(!storage.rotate_snapshot().unwrap());
        assert!(!storage.path(PREVIOUS_SNAPSHOT_KEY).exists());

        storage.store_snapshot(&sample()).unwrap();
        assert!(storage.rotate_snapshot().unwrap());

        assert_eq!(storage.load_previous().unwrap().unwrap(), sample());
        assert!(storage.path(SNAPSHOT_KEY).exists());
    }

    #[test]
    fn test_corrupt_snapshot_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        fs::write(storage.path(SNAPSHOT_KEY), "{not json").unwrap();

        assert!(matches!(storage.load_snapshot(), Err(AppError::Json(_))));
    }

    #[test]
    fn test_write_creates_parent_dirs() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/dir/data.json");

        write_json_file(&path, &vec![1, 2, 3]).unwrap();
        let back: Vec<i32> = read_json_file(&path).unwrap().unwrap();
        assert_eq!(back, vec![1, 2, 3]);
    }
}
