//! Per-UID persisted user records.
//!
//! Moderation history and login keys are keyed by the stable UID, not
//! the transient numeric player ID, so they survive reconnects and
//! process restarts. The server never assumes a storage engine; it only
//! needs typed load/save plus the login-key lookup that marks a UID as
//! registered. Two backends ship here: an in-memory table for tests and
//! small deployments, and a JSON-per-record directory tree.

use crate::error::{ProtocolError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock};
use tracing::warn;

/// Key-value record store keyed by UID.
///
/// Records are raw JSON text at this level; the typed helpers on
/// `dyn UserDataStore` handle (de)serialization. Writes are
/// last-writer-wins per UID and kind.
pub trait UserDataStore: Send + Sync {
    /// Load the raw record of the given kind, if present.
    fn load_raw(&self, uid: &str, kind: &str) -> Option<String>;

    /// Persist the raw record of the given kind.
    fn save_raw(&self, uid: &str, kind: &str, json: &str) -> Result<()>;

    /// Login key registered for the UID, if any. A `Some` result marks
    /// the UID as a registered user.
    fn get_key(&self, uid: &str) -> Option<String>;

    /// Register (or replace) the login key for a UID.
    fn set_key(&self, uid: &str, key: &str) -> Result<()>;
}

impl dyn UserDataStore + '_ {
    /// Typed load; a missing or unreadable record yields `None`.
    pub fn load_as<T: DeserializeOwned>(&self, uid: &str, kind: &str) -> Option<T> {
        let raw = self.load_raw(uid, kind)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(uid, kind, error = %err, "Discarding unreadable user record");
                None
            }
        }
    }

    /// Typed load falling back to `T::default()` when absent.
    pub fn load_or_default<T: DeserializeOwned + Default>(&self, uid: &str, kind: &str) -> T {
        self.load_as(uid, kind).unwrap_or_default()
    }

    /// Typed save.
    pub fn save_as<T: Serialize>(&self, uid: &str, kind: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value)
            .map_err(|e| ProtocolError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        self.save_raw(uid, kind, &json)
    }
}

/// In-memory store. Separate locks for records and keys so key lookups
/// on the kick path never contend with record writes.
#[derive(Debug, Default)]
pub struct MemoryUserData {
    records: RwLock<HashMap<String, HashMap<String, String>>>,
    keys: RwLock<HashMap<String, String>>,
}

impl MemoryUserData {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserDataStore for MemoryUserData {
    fn load_raw(&self, uid: &str, kind: &str) -> Option<String> {
        // Poisoned locks hand back the data; a panicked writer cannot
        // leave the table half-updated across these single-statement
        // critical sections.
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        records.get(uid).and_then(|kinds| kinds.get(kind)).cloned()
    }

    fn save_raw(&self, uid: &str, kind: &str, json: &str) -> Result<()> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        records
            .entry(uid.to_string())
            .or_default()
            .insert(kind.to_string(), json.to_string());
        Ok(())
    }

    fn get_key(&self, uid: &str) -> Option<String> {
        let keys = self.keys.read().unwrap_or_else(PoisonError::into_inner);
        keys.get(uid).cloned()
    }

    fn set_key(&self, uid: &str, key: &str) -> Result<()> {
        let mut keys = self.keys.write().unwrap_or_else(PoisonError::into_inner);
        keys.insert(uid.to_string(), key.to_string());
        Ok(())
    }
}

/// Directory-tree store: one directory per UID, one JSON file per
/// record kind, the login key in a `key` file. Writes go through a
/// temp file and rename so a crash never leaves a torn record.
#[derive(Debug)]
pub struct JsonFileUserData {
    root: PathBuf,
    io_lock: Mutex<()>,
}

impl JsonFileUserData {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            io_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn user_dir(&self, uid: &str) -> PathBuf {
        self.root.join(sanitize_component(uid))
    }

    fn record_path(&self, uid: &str, kind: &str) -> PathBuf {
        self.user_dir(uid)
            .join(format!("{}.json", sanitize_component(kind)))
    }

    fn key_path(&self, uid: &str) -> PathBuf {
        self.user_dir(uid).join("key")
    }

    fn write_atomic(&self, path: &Path, contents: &str) -> Result<()> {
        let _guard = self.io_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

impl UserDataStore for JsonFileUserData {
    fn load_raw(&self, uid: &str, kind: &str) -> Option<String> {
        fs::read_to_string(self.record_path(uid, kind)).ok()
    }

    fn save_raw(&self, uid: &str, kind: &str, json: &str) -> Result<()> {
        self.write_atomic(&self.record_path(uid, kind), json)
    }

    fn get_key(&self, uid: &str) -> Option<String> {
        let key = fs::read_to_string(self.key_path(uid)).ok()?;
        let key = key.trim();
        if key.is_empty() {
            None
        } else {
            Some(key.to_string())
        }
    }

    fn set_key(&self, uid: &str, key: &str) -> Result<()> {
        self.write_atomic(&self.key_path(uid), key)
    }
}

/// Restrict a UID or kind to filesystem-safe characters.
fn sanitize_component(part: &str) -> String {
    let cleaned: String = part
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    // "." and ".." would escape the store root as path components.
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "_".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Profile {
        display_name: String,
        visits: u32,
    }

    #[test]
    fn test_memory_typed_roundtrip() {
        let store = MemoryUserData::new();
        let store: &dyn UserDataStore = &store;

        assert!(store.load_as::<Profile>("uid-1", "profile").is_none());

        let profile = Profile {
            display_name: "Madeline".into(),
            visits: 3,
        };
        store.save_as("uid-1", "profile", &profile).unwrap();
        assert_eq!(store.load_as::<Profile>("uid-1", "profile"), Some(profile));

        // Other UIDs and kinds stay untouched.
        assert!(store.load_as::<Profile>("uid-2", "profile").is_none());
        assert!(store.load_as::<Profile>("uid-1", "settings").is_none());
    }

    #[test]
    fn test_memory_keys() {
        let store = MemoryUserData::new();
        assert_eq!(store.get_key("uid-1"), None);
        store.set_key("uid-1", "login-abc").unwrap();
        assert_eq!(store.get_key("uid-1"), Some("login-abc".to_string()));
        store.set_key("uid-1", "login-def").unwrap();
        assert_eq!(store.get_key("uid-1"), Some("login-def".to_string()));
    }

    #[test]
    fn test_load_or_default_when_absent() {
        let store = MemoryUserData::new();
        let store: &dyn UserDataStore = &store;
        let profile: Profile = store.load_or_default("ghost", "profile");
        assert_eq!(profile, Profile::default());
    }

    #[test]
    fn test_corrupt_record_treated_as_absent() {
        let store = MemoryUserData::new();
        store.save_raw("uid-1", "profile", "{not json").unwrap();
        let store: &dyn UserDataStore = &store;
        assert!(store.load_as::<Profile>("uid-1", "profile").is_none());
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();

        {
            let store = JsonFileUserData::new(dir.path()).unwrap();
            let store: &dyn UserDataStore = &store;
            store
                .save_as(
                    "uid-00ff",
                    "profile",
                    &Profile {
                        display_name: "Theo".into(),
                        visits: 1,
                    },
                )
                .unwrap();
            store.set_key("uid-00ff", "login-xyz").unwrap();
        }

        let store = JsonFileUserData::new(dir.path()).unwrap();
        assert_eq!(store.get_key("uid-00ff"), Some("login-xyz".to_string()));
        let store: &dyn UserDataStore = &store;
        let profile: Profile = store.load_or_default("uid-00ff", "profile");
        assert_eq!(profile.display_name, "Theo");
        assert_eq!(profile.visits, 1);
    }

    #[test]
    fn test_sanitize_blocks_dot_components() {
        assert_eq!(sanitize_component(".."), "_");
        assert_eq!(sanitize_component("."), "_");
        assert_eq!(sanitize_component(""), "_");
        assert_eq!(sanitize_component("uid-00ff"), "uid-00ff");
        assert_eq!(sanitize_component("a/b\\c"), "a_b_c");
    }

    #[test]
    fn test_file_store_sanitizes_components() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileUserData::new(dir.path()).unwrap();
        store.save_raw("../escape", "kind/../../x", "{}").unwrap();

        // Everything stays under the store root.
        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(entries, vec![".._escape"]);
    }
}
