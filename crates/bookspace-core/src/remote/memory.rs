//! In-process remote store used by the test suite and local demos.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{CollectionSnapshot, DocumentWrite, RemoteStore};
use crate::error::{Error, Result};
use crate::models::JsonMap;
use crate::util::now_millis;

#[derive(Default)]
struct Inner {
    collections: HashMap<String, BTreeMap<String, JsonMap>>,
    subscribers: HashMap<String, Vec<mpsc::UnboundedSender<CollectionSnapshot>>>,
    /// Remaining writes to fail, with the error to fail them with.
    fail_writes: u32,
    fail_transient: bool,
    server_time_override: Option<i64>,
}

/// Reference [`RemoteStore`] backed by in-process maps, with push
/// notifications and write-failure injection for tests.
#[derive(Default)]
pub struct MemoryRemote {
    inner: Mutex<Inner>,
}

impl MemoryRemote {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` write operations. Transient failures look
    /// like network outages; permanent ones like permission denials.
    pub fn fail_next_writes(&self, count: u32, transient: bool) {
        let mut inner = self.inner.lock().expect("remote store lock");
        inner.fail_writes = count;
        inner.fail_transient = transient;
    }

    /// Pin the server clock for deterministic tests.
    pub fn set_server_time(&self, millis: i64) {
        self.inner.lock().expect("remote store lock").server_time_override = Some(millis);
    }

    /// Snapshot a collection without going through the async trait.
    #[must_use]
    pub fn documents(&self, collection: &str) -> Vec<(String, JsonMap)> {
        let inner = self.inner.lock().expect("remote store lock");
        inner
            .collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, data)| (id.clone(), data.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn take_write_failure(inner: &mut Inner) -> Option<Error> {
        if inner.fail_writes == 0 {
            return None;
        }
        inner.fail_writes -= 1;
        Some(if inner.fail_transient {
            Error::Network("simulated network outage".to_string())
        } else {
            Error::Remote("permission denied".to_string())
        })
    }

    fn snapshot(inner: &Inner, collection: &str) -> CollectionSnapshot {
        inner
            .collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, data)| (id.clone(), data.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn notify(inner: &mut Inner, collection: &str) {
        let snapshot = Self::snapshot(inner, collection);
        if let Some(subscribers) = inner.subscribers.get_mut(collection) {
            subscribers.retain(|tx| tx.send(snapshot.clone()).is_ok());
        }
    }

    fn merge_into(target: &mut JsonMap, data: JsonMap) {
        for (field, value) in data {
            target.insert(field, value);
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn read_document(&self, collection: &str, doc_id: &str) -> Result<Option<JsonMap>> {
        let inner = self.inner.lock().expect("remote store lock");
        Ok(inner
            .collections
            .get(collection)
            .and_then(|docs| docs.get(doc_id))
            .cloned())
    }

    async fn upsert_document(&self, collection: &str, doc_id: &str, data: JsonMap) -> Result<()> {
        let mut inner = self.inner.lock().expect("remote store lock");
        if let Some(error) = Self::take_write_failure(&mut inner) {
            return Err(error);
        }
        let doc = inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .entry(doc_id.to_string())
            .or_default();
        Self::merge_into(doc, data);
        Self::notify(&mut inner, collection);
        Ok(())
    }

    async fn commit_batch(&self, collection: &str, writes: Vec<DocumentWrite>) -> Result<()> {
        let mut inner = self.inner.lock().expect("remote store lock");
        if let Some(error) = Self::take_write_failure(&mut inner) {
            return Err(error);
        }
        let docs = inner.collections.entry(collection.to_string()).or_default();
        for write in writes {
            let doc = docs.entry(write.doc_id).or_default();
            Self::merge_into(doc, write.data);
        }
        Self::notify(&mut inner, collection);
        Ok(())
    }

    async fn query_collection(&self, collection: &str) -> Result<CollectionSnapshot> {
        let inner = self.inner.lock().expect("remote store lock");
        Ok(Self::snapshot(&inner, collection))
    }

    async fn delete_document(&self, collection: &str, doc_id: &str) -> Result<()> {
        let mut inner = self.inner.lock().expect("remote store lock");
        if let Some(error) = Self::take_write_failure(&mut inner) {
            return Err(error);
        }
        if let Some(docs) = inner.collections.get_mut(collection) {
            docs.remove(doc_id);
        }
        Self::notify(&mut inner, collection);
        Ok(())
    }

    async fn subscribe(
        &self,
        collection: &str,
    ) -> Result<mpsc::UnboundedReceiver<CollectionSnapshot>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock().expect("remote store lock");
        // New subscribers get the current state immediately.
        let _ = tx.send(Self::snapshot(&inner, collection));
        inner
            .subscribers
            .entry(collection.to_string())
            .or_default()
            .push(tx);
        Ok(rx)
    }

    fn server_time_millis(&self) -> i64 {
        let inner = self.inner.lock().expect("remote store lock");
        inner.server_time_override.unwrap_or_else(now_millis)
    }
}
