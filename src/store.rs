//! Local record store.
//!
//! A flat key-value namespace holding JSON-encoded lists (`patients`,
//! `analyses`, `notifications`, `savedCases`) plus a few scalar entries
//! (credential, profile). Two backends are provided:
//!
//! - [`FileStore`]: one `<key>.json` file per entry under a data directory
//! - [`MemoryStore`]: an in-process map, used by tests
//!
//! Lists are always read and written whole. [`RecordStore::append`] is a plain
//! read-modify-write with no locking: two writers racing on the same list can
//! lose an update. There are no transactions, no schema versioning and no
//! change notification.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Record store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage I/O error for '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to serialize '{key}': {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
    #[error("Storage backend poisoned")]
    Poisoned,
}

/// Named lists kept in the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Patients,
    Analyses,
    Notifications,
    SavedCases,
}

impl Collection {
    pub fn key(&self) -> &'static str {
        match self {
            Collection::Patients => "patients",
            Collection::Analyses => "analyses",
            Collection::Notifications => "notifications",
            Collection::SavedCases => "savedCases",
        }
    }
}

/// A record type that lives in one of the store's lists
pub trait Record: Serialize + DeserializeOwned {
    const COLLECTION: Collection;

    fn id(&self) -> &str;
}

/// Raw string storage, the equivalent of a browser's local storage
pub trait KeyValueStore: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove_item(&self, key: &str) -> Result<(), StoreError>;
}

/// In-memory backend
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        let items = self.items.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut items = self.items.lock().map_err(|_| StoreError::Poisoned)?;
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StoreError> {
        let mut items = self.items.lock().map_err(|_| StoreError::Poisoned)?;
        items.remove(key);
        Ok(())
    }
}

/// File-backed store: each key is a `<key>.json` file in `dir`
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl KeyValueStore for FileStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let io_err = |source| StoreError::Io {
            key: key.to_string(),
            source,
        };

        std::fs::create_dir_all(&self.dir).map_err(io_err)?;

        // Write to a temp file, then rename over the old value
        let temp_path = path.with_extension("json.tmp");
        std::fs::write(&temp_path, value).map_err(io_err)?;

        // The credential lives here too
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&temp_path, permissions).map_err(io_err)?;
        }

        std::fs::rename(&temp_path, &path).map_err(io_err)?;
        debug!("Wrote {} bytes to {:?}", value.len(), path);
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }
}

/// Typed access to the record lists on top of a [`KeyValueStore`]
#[derive(Clone)]
pub struct RecordStore {
    backend: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore").finish_non_exhaustive()
    }
}

impl RecordStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn on_disk(dir: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(FileStore::new(dir)))
    }

    pub fn backend(&self) -> &dyn KeyValueStore {
        self.backend.as_ref()
    }

    /// Raw JSON entries of a list. Anything that isn't a readable JSON array
    /// reads as empty.
    fn read_entries(&self, key: &str) -> Vec<serde_json::Value> {
        let raw = match self.backend.get_item(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(key, "Failed to read list, treating as empty: {}", e);
                return Vec::new();
            }
        };

        match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(serde_json::Value::Array(entries)) => entries,
            Ok(_) => {
                warn!(key, "Stored value is not a list, treating as empty");
                Vec::new()
            }
            Err(e) => {
                warn!(key, "Stored value is not valid JSON, treating as empty: {}", e);
                Vec::new()
            }
        }
    }

    /// Read a whole list.
    ///
    /// Missing keys, unreadable values and non-array JSON all read as an empty
    /// list. Entries that don't match the record shape are skipped.
    pub fn read_list<T: Record>(&self) -> Vec<T> {
        let key = T::COLLECTION.key();
        let entries = self.read_entries(key);

        let total = entries.len();
        let records: Vec<T> = entries
            .into_iter()
            .filter_map(|entry| serde_json::from_value(entry).ok())
            .collect();

        if records.len() < total {
            warn!(
                key,
                dropped = total - records.len(),
                "Skipped malformed entries while reading list"
            );
        }
        records
    }

    /// Every `id` string in a list, including entries that don't parse as `T`
    pub fn ids<T: Record>(&self) -> Vec<String> {
        self.read_entries(T::COLLECTION.key())
            .iter()
            .filter_map(|entry| entry.get("id").and_then(|id| id.as_str()))
            .map(str::to_string)
            .collect()
    }

    /// Replace a whole list
    pub fn write_list<T: Record>(&self, records: &[T]) -> Result<(), StoreError> {
        let key = T::COLLECTION.key();
        let json = serde_json::to_string(records).map_err(|source| StoreError::Serialize {
            key: key.to_string(),
            source,
        })?;
        self.backend.set_item(key, &json)?;
        debug!(key, count = records.len(), "List written");
        Ok(())
    }

    /// Append one record: read the list, push, write it back.
    ///
    /// Works on the raw entries, so entries that `read_list` skips are written
    /// back untouched. Not atomic: a concurrent writer between the read and the
    /// write loses its update.
    pub fn append<T: Record>(&self, record: T) -> Result<(), StoreError> {
        let key = T::COLLECTION.key();
        let mut entries = self.read_entries(key);
        let value = serde_json::to_value(&record).map_err(|source| StoreError::Serialize {
            key: key.to_string(),
            source,
        })?;
        entries.push(value);

        let json = serde_json::to_string(&entries).map_err(|source| StoreError::Serialize {
            key: key.to_string(),
            source,
        })?;
        self.backend.set_item(key, &json)?;
        info!(key, id = %record.id(), "Record appended");
        Ok(())
    }

    /// Read a scalar JSON value, falling back to `T::default()` when absent or
    /// malformed
    pub fn read_value<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        match self.backend.get_item(key) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(key, "Stored value is malformed, using default: {}", e);
                T::default()
            }),
            Ok(None) => T::default(),
            Err(e) => {
                warn!(key, "Failed to read value, using default: {}", e);
                T::default()
            }
        }
    }

    pub fn write_value<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let json = serde_json::to_string(value).map_err(|source| StoreError::Serialize {
            key: key.to_string(),
            source,
        })?;
        self.backend.set_item(key, &json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::tempdir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Item {
        id: String,
        value: u32,
    }

    impl Record for Item {
        const COLLECTION: Collection = Collection::SavedCases;

        fn id(&self) -> &str {
            &self.id
        }
    }

    fn item(id: &str, value: u32) -> Item {
        Item {
            id: id.to_string(),
            value,
        }
    }

    #[test]
    fn test_collection_keys() {
        assert_eq!(Collection::Patients.key(), "patients");
        assert_eq!(Collection::Analyses.key(), "analyses");
        assert_eq!(Collection::Notifications.key(), "notifications");
        assert_eq!(Collection::SavedCases.key(), "savedCases");
    }

    #[test]
    fn test_missing_list_reads_empty() {
        let store = RecordStore::in_memory();
        assert!(store.read_list::<Item>().is_empty());
    }

    #[test]
    fn test_append_and_read() {
        let store = RecordStore::in_memory();
        store.append(item("a", 1)).unwrap();
        store.append(item("b", 2)).unwrap();

        let items = store.read_list::<Item>();
        assert_eq!(items, vec![item("a", 1), item("b", 2)]);
    }

    #[test]
    fn test_invalid_json_reads_empty() {
        let store = RecordStore::in_memory();
        store.backend().set_item("savedCases", "{not json").unwrap();
        assert!(store.read_list::<Item>().is_empty());
    }

    #[test]
    fn test_non_array_reads_empty() {
        let store = RecordStore::in_memory();
        store
            .backend()
            .set_item("savedCases", r#"{"id":"a","value":1}"#)
            .unwrap();
        assert!(store.read_list::<Item>().is_empty());
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let store = RecordStore::in_memory();
        store
            .backend()
            .set_item(
                "savedCases",
                r#"[{"id":"a","value":1},{"id":"b"},42,{"id":"c","value":3}]"#,
            )
            .unwrap();

        let items = store.read_list::<Item>();
        assert_eq!(items, vec![item("a", 1), item("c", 3)]);
    }

    #[test]
    fn test_append_keeps_unparsed_entries() {
        let store = RecordStore::in_memory();
        store
            .backend()
            .set_item("savedCases", r#"[{"id":"old","value":"not a number"}]"#)
            .unwrap();

        store.append(item("new", 2)).unwrap();

        let raw = store.backend().get_item("savedCases").unwrap().unwrap();
        let entries: Vec<serde_json::Value> = serde_json::from_str(&raw).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["id"], "old");
        assert_eq!(entries[0]["value"], "not a number");
        assert_eq!(store.read_list::<Item>(), vec![item("new", 2)]);
    }

    #[test]
    fn test_ids_include_unparsed_entries() {
        let store = RecordStore::in_memory();
        store
            .backend()
            .set_item("savedCases", r#"[{"id":"a","value":1},{"id":"b"},42]"#)
            .unwrap();
        assert_eq!(store.ids::<Item>(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_write_list_replaces() {
        let store = RecordStore::in_memory();
        store.append(item("a", 1)).unwrap();
        store.write_list(&[item("z", 9)]).unwrap();
        assert_eq!(store.read_list::<Item>(), vec![item("z", 9)]);
    }

    #[test]
    fn test_stale_read_loses_update() {
        // Documents the unsynchronized read-modify-write
        let store = RecordStore::in_memory();
        let mut first = store.read_list::<Item>();
        let mut second = store.read_list::<Item>();

        first.push(item("a", 1));
        second.push(item("b", 2));
        store.write_list(&first).unwrap();
        store.write_list(&second).unwrap();

        assert_eq!(store.read_list::<Item>(), vec![item("b", 2)]);
    }

    #[test]
    fn test_read_value_defaults() {
        let store = RecordStore::in_memory();
        let missing: Vec<String> = store.read_value("nothing");
        assert!(missing.is_empty());

        store.backend().set_item("broken", "[1,").unwrap();
        let broken: Vec<u32> = store.read_value("broken");
        assert!(broken.is_empty());

        store.write_value("ok", &vec![1u32, 2]).unwrap();
        let ok: Vec<u32> = store.read_value("ok");
        assert_eq!(ok, vec![1, 2]);
    }

    #[test]
    fn test_file_store_persistence() {
        let dir = tempdir().unwrap();
        let data_dir = dir.path().join("data");

        let store = RecordStore::on_disk(&data_dir);
        store.append(item("a", 1)).unwrap();
        assert!(data_dir.join("savedCases.json").exists());
        assert!(!data_dir.join("savedCases.json.tmp").exists());

        let reopened = RecordStore::on_disk(&data_dir);
        assert_eq!(reopened.read_list::<Item>(), vec![item("a", 1)]);
    }

    #[test]
    fn test_file_store_remove() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path());

        store.set_item("GEMINI_API_KEY", "secret").unwrap();
        assert_eq!(store.get_item("GEMINI_API_KEY").unwrap().as_deref(), Some("secret"));

        store.remove_item("GEMINI_API_KEY").unwrap();
        assert!(store.get_item("GEMINI_API_KEY").unwrap().is_none());

        // Removing twice is fine
        store.remove_item("GEMINI_API_KEY").unwrap();
    }

    #[test]
    fn test_file_store_rejects_path_keys() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path());
        assert!(matches!(
            store.set_item("../escape", "x"),
            Err(StoreError::InvalidKey(_))
        ));
        assert!(matches!(store.get_item(""), Err(StoreError::InvalidKey(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store.set_item("GEMINI_API_KEY", "secret").unwrap();

        let mode = std::fs::metadata(dir.path().join("GEMINI_API_KEY.json"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
