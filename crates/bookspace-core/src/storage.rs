//! Local key-value persistence adapter.
//!
//! The engine serializes collections as JSON strings through this
//! boundary; it doubles as the full data store when no remote account is
//! active.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::models::{CollectionKind, ConfigRecord, EntityRecord, WorkspaceData};

/// Storage key for a synced collection.
#[must_use]
pub const fn collection_key(kind: CollectionKind) -> &'static str {
    match kind {
        CollectionKind::Transactions => "bookspace_transactions",
        CollectionKind::Clients => "bookspace_clients",
        CollectionKind::Providers => "bookspace_providers",
        CollectionKind::Employees => "bookspace_employees",
        CollectionKind::Leads => "bookspace_leads",
        CollectionKind::Invoices => "bookspace_invoices",
        CollectionKind::Meetings => "bookspace_meetings",
    }
}

/// Storage key for the config scalar.
pub const CONFIG_KEY: &str = "bookspace_config";

/// Minimal key-value persistence boundary.
pub trait LocalStore: Send + Sync + 'static {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Load the whole working set; absent keys default to empty.
pub fn load_all(store: &impl LocalStore) -> Result<WorkspaceData> {
    let mut data = WorkspaceData::default();
    for kind in CollectionKind::ALL {
        if let Some(raw) = store.get(collection_key(kind))? {
            *data.collection_mut(kind) = serde_json::from_str(&raw)?;
        }
    }
    if let Some(raw) = store.get(CONFIG_KEY)? {
        data.config = serde_json::from_str(&raw)?;
    }
    Ok(data)
}

/// Persist the whole working set.
pub fn save_all(store: &impl LocalStore, data: &WorkspaceData) -> Result<()> {
    for kind in CollectionKind::ALL {
        save_collection(store, kind, data.collection(kind))?;
    }
    save_config(store, &data.config)
}

/// Persist one collection.
pub fn save_collection(
    store: &impl LocalStore,
    kind: CollectionKind,
    items: &[EntityRecord],
) -> Result<()> {
    store.set(collection_key(kind), &serde_json::to_string(items)?)
}

/// Persist the config scalar.
pub fn save_config(store: &impl LocalStore, config: &ConfigRecord) -> Result<()> {
    store.set(CONFIG_KEY, &serde_json::to_string(config)?)
}

/// In-memory store for tests and throwaway sessions.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.lock().expect("store lock").get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .lock()
            .expect("store lock")
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// One JSON file per key under a data directory; backs fully-offline
/// clients.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|error| Error::Storage(format!("cannot create {}: {error}", dir.display())))?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl LocalStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(raw)),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(Error::Storage(format!(
                "cannot read {}: {error}",
                path.display()
            ))),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        std::fs::write(&path, value)
            .map_err(|error| Error::Storage(format!("cannot write {}: {error}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn roundtrip_through_memory_store() {
        let store = MemoryStore::new();
        let mut data = WorkspaceData::default();
        data.transactions
            .push(serde_json::from_value(json!({ "id": "t1", "monto": 100 })).unwrap());
        data.config.insert("empresa".to_string(), json!("Bookspace"));

        save_all(&store, &data).unwrap();
        let loaded = load_all(&store).unwrap();
        assert_eq!(loaded, data);
    }

    #[test]
    fn missing_keys_default_to_empty() {
        let store = MemoryStore::new();
        let loaded = load_all(&store).unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn file_store_roundtrip() {
        let dir = std::env::temp_dir().join(format!(
            "bookspace-storage-test-{}",
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        let store = FileStore::open(&dir).unwrap();

        store.set(CONFIG_KEY, r#"{"empresa":"Bookspace"}"#).unwrap();
        assert_eq!(
            store.get(CONFIG_KEY).unwrap().as_deref(),
            Some(r#"{"empresa":"Bookspace"}"#)
        );
        assert_eq!(store.get("bookspace_unknown").unwrap(), None);

        let _ = std::fs::remove_dir_all(dir);
    }
}
