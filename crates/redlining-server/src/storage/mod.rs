// redlining-map/crates/redlining-server/src/storage/mod.rs
//! Pin storage abstraction used by the server.
//!
//! This module provides a single trait `PinStore` and two concrete
//! implementations:
//!
//! - `FileStorage`: stores a single JSON file containing a map of pin ids to
//!   pins. The file is located in a per-user configuration directory
//!   (where possible) and is read/written synchronously.
//! - `MemoryStorage`: keeps pins in memory only; used by tests.
//!
//! Pins are independent of the redlining dataset: nothing in `redlining-lib`
//! depends on this module.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("Storage lock poisoned")]
    Poisoned,
}

pub type StorageResult<T> = Result<T, StorageError>;

/// A map pin dropped by a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pin {
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub user_id: String,
    pub timestamp: i64,
}

/// Document-store style backend for pins.
///
/// Pins are keyed by pin id; adding a pin with an existing id replaces it.
pub trait PinStore: Send + Sync {
    /// Store a pin owned by `user_id` under `pin_id`.
    fn add_document(&self, user_id: &str, pin_id: &str, pin: &Pin) -> StorageResult<()>;

    /// All pins of all users, ordered by pin id.
    fn get_all_pins(&self) -> StorageResult<Vec<Pin>>;

    /// Remove every pin owned by `user_id` (no-op if there are none).
    fn clear_user(&self, user_id: &str) -> StorageResult<()>;
}

type PinMap = BTreeMap<String, Pin>;

fn lock_pins(pins: &Mutex<PinMap>) -> StorageResult<MutexGuard<'_, PinMap>> {
    pins.lock().map_err(|_| StorageError::Poisoned)
}

fn insert_pin(map: &mut PinMap, user_id: &str, pin_id: &str, pin: &Pin) {
    if pin.user_id != user_id || pin.id != pin_id {
        tracing::warn!("Pin {} stored under user {user_id} / id {pin_id}", pin.id);
    }
    map.insert(pin_id.to_string(), pin.clone());
}

fn remove_user(map: &mut PinMap, user_id: &str) -> usize {
    let before = map.len();
    map.retain(|_, pin| pin.user_id != user_id);
    before - map.len()
}

//
// In-memory implementation
//

/// In-memory pin store; contents are lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    inner: Mutex<PinMap>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PinStore for MemoryStorage {
    fn add_document(&self, user_id: &str, pin_id: &str, pin: &Pin) -> StorageResult<()> {
        insert_pin(&mut *lock_pins(&self.inner)?, user_id, pin_id, pin);
        Ok(())
    }

    fn get_all_pins(&self) -> StorageResult<Vec<Pin>> {
        Ok(lock_pins(&self.inner)?.values().cloned().collect())
    }

    fn clear_user(&self, user_id: &str) -> StorageResult<()> {
        remove_user(&mut *lock_pins(&self.inner)?, user_id);
        Ok(())
    }
}

//
// File-backed implementation
//

/// File-based storage: stores a single JSON file which is a map of pin id -> pin.
///
/// Implementation notes:
/// - On init, file is read into memory (BTreeMap).
/// - Mutations update memory and flush the file back to disk synchronously.
#[derive(Debug)]
pub struct FileStorage {
    /// Path to the backing JSON file.
    path: PathBuf,
    /// In-memory copy of pin id -> pin
    inner: Mutex<PinMap>,
}

impl FileStorage {
    /// Determine a good default storage file path for the current user.
    /// Uses environment variables when available:
    /// - On Windows: %APPDATA%/RedliningMap/pins.json
    /// - Else: $HOME/.config/redlining-map/pins.json
    pub fn default_storage_path() -> PathBuf {
        if cfg!(windows)
            && let Ok(appdata) = std::env::var("APPDATA")
        {
            return Path::new(&appdata).join("RedliningMap").join("pins.json");
        }

        if let Ok(home) = std::env::var("HOME") {
            return Path::new(&home)
                .join(".config")
                .join("redlining-map")
                .join("pins.json");
        }

        // Fallback to current directory
        Path::new(".").join("redlining-map-pins.json")
    }

    pub fn new_with_path(path: Option<PathBuf>) -> StorageResult<Self> {
        let path = path.unwrap_or_else(Self::default_storage_path);

        // Ensure parent directory exists
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| {
                StorageError::Io(format!("Failed to create storage parent directory: {e}"))
            })?;
        }

        // Read file if present
        let mut map = PinMap::new();
        if path.exists() {
            let mut file = fs::File::open(&path)
                .map_err(|e| StorageError::Io(format!("Failed to open storage file: {e}")))?;
            let mut s = String::new();
            file.read_to_string(&mut s)
                .map_err(|e| StorageError::Io(format!("Failed to read storage file: {e}")))?;
            if !s.trim().is_empty() {
                map = serde_json::from_str(&s).map_err(|e| {
                    StorageError::Json(format!("Failed to parse storage JSON: {e}"))
                })?;
            }
        } else {
            // Ensure file exists by creating empty structure on disk
            fs::File::create(&path)
                .map_err(|e| StorageError::Io(format!("Failed to create storage file: {e}")))?;
        }

        tracing::info!("Pin storage at {} ({} pins)", path.display(), map.len());

        Ok(FileStorage {
            path,
            inner: Mutex::new(map),
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush_locked(&self, locked: &PinMap) -> StorageResult<()> {
        let s =
            serde_json::to_string_pretty(locked).map_err(|e| StorageError::Json(e.to_string()))?;
        fs::write(&self.path, s).map_err(|e| StorageError::Io(format!("write failed: {e}")))
    }
}

impl PinStore for FileStorage {
    fn add_document(&self, user_id: &str, pin_id: &str, pin: &Pin) -> StorageResult<()> {
        let mut guard = lock_pins(&self.inner)?;
        insert_pin(&mut guard, user_id, pin_id, pin);
        self.flush_locked(&guard)
    }

    fn get_all_pins(&self) -> StorageResult<Vec<Pin>> {
        Ok(lock_pins(&self.inner)?.values().cloned().collect())
    }

    fn clear_user(&self, user_id: &str) -> StorageResult<()> {
        let mut guard = lock_pins(&self.inner)?;
        if remove_user(&mut guard, user_id) == 0 {
            return Ok(());
        }
        self.flush_locked(&guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_pin(id: &str, user_id: &str) -> Pin {
        Pin {
            id: id.to_string(),
            latitude: 41.8268,
            longitude: -71.4025,
            user_id: user_id.to_string(),
            timestamp: 1_714_000_000_000,
        }
    }

    fn exercise_store(store: &dyn PinStore) {
        store.add_document("alice", "p1", &make_pin("p1", "alice")).unwrap();
        store.add_document("bob", "p2", &make_pin("p2", "bob")).unwrap();
        store.add_document("alice", "p3", &make_pin("p3", "alice")).unwrap();
        assert_eq!(store.get_all_pins().unwrap().len(), 3);

        store.clear_user("alice").unwrap();
        assert_eq!(store.get_all_pins().unwrap(), vec![make_pin("p2", "bob")]);

        // Clearing a user without pins is fine
        store.clear_user("carol").unwrap();
        assert_eq!(store.get_all_pins().unwrap().len(), 1);
    }

    #[test]
    fn test_memory_storage() {
        exercise_store(&MemoryStorage::new());
    }

    #[test]
    fn test_file_storage() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStorage::new_with_path(Some(dir.path().join("pins.json"))).unwrap();
        exercise_store(&store);
    }

    #[test]
    fn test_same_pin_id_replaces() {
        let store = MemoryStorage::new();
        store.add_document("alice", "p1", &make_pin("p1", "alice")).unwrap();
        let mut moved = make_pin("p1", "alice");
        moved.latitude = 40.0;
        store.add_document("alice", "p1", &moved).unwrap();

        assert_eq!(store.get_all_pins().unwrap(), vec![moved]);
    }

    #[test]
    fn test_file_storage_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("pins.json");

        let store = FileStorage::new_with_path(Some(path.clone())).unwrap();
        store.add_document("alice", "p1", &make_pin("p1", "alice")).unwrap();
        drop(store);

        let reopened = FileStorage::new_with_path(Some(path)).unwrap();
        assert_eq!(reopened.get_all_pins().unwrap(), vec![make_pin("p1", "alice")]);
    }

    #[test]
    fn test_file_storage_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pins.json");
        fs::write(&path, "{ not json").unwrap();

        let result = FileStorage::new_with_path(Some(path));
        assert!(matches!(result, Err(StorageError::Json(_))));
    }

    #[test]
    fn test_pin_wire_format() {
        let json = serde_json::to_value(make_pin("p1", "alice")).unwrap();
        assert_eq!(json["userId"], "alice");
        assert_eq!(json["timestamp"], 1_714_000_000_000i64);
    }
}
