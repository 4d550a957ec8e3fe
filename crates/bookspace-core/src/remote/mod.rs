//! Remote document store collaborator boundary.
//!
//! The engine assumes a store offering per-document merge-upsert, batched
//! atomic writes with a hard size cap, full-collection scans, and a
//! push-based change subscription. Backends implement [`RemoteStore`];
//! [`memory::MemoryRemote`] is the in-process reference implementation
//! used by the test suite.

pub mod memory;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::models::JsonMap;

pub use memory::MemoryRemote;

/// One document keyed by id inside an atomic batch.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentWrite {
    pub doc_id: String,
    pub data: JsonMap,
}

/// A full-collection snapshot of `(doc_id, data)` pairs pushed to
/// subscribers on every remote change.
pub type CollectionSnapshot = Vec<(String, JsonMap)>;

/// Capabilities the engine requires from the shared document store.
#[async_trait]
pub trait RemoteStore: Send + Sync + 'static {
    /// Read a single document, `None` when absent.
    async fn read_document(&self, collection: &str, doc_id: &str) -> Result<Option<JsonMap>>;

    /// Merge-upsert a single document: supplied fields overwrite, absent
    /// fields are preserved.
    async fn upsert_document(&self, collection: &str, doc_id: &str, data: JsonMap) -> Result<()>;

    /// Atomically commit a batch of merge-upserts. Callers keep each
    /// batch within the store's size cap.
    async fn commit_batch(&self, collection: &str, writes: Vec<DocumentWrite>) -> Result<()>;

    /// Full scan of a collection.
    async fn query_collection(&self, collection: &str) -> Result<CollectionSnapshot>;

    /// Hard-remove a document.
    async fn delete_document(&self, collection: &str, doc_id: &str) -> Result<()>;

    /// Open a push subscription delivering full-collection snapshots.
    /// The subscription ends when the receiver is dropped.
    async fn subscribe(&self, collection: &str) -> Result<mpsc::UnboundedReceiver<CollectionSnapshot>>;

    /// Server-generated wall clock in epoch millis, usable as a
    /// timestamp tiebreaker source.
    fn server_time_millis(&self) -> i64;
}
