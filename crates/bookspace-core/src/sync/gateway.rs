//! Remote collection gateway: chunked writes, full reads, and push
//! subscriptions over the shared document store.
//!
//! Entity collections are workspace-wide, so documents are keyed
//! `"{owner}_{id}"` to keep two owners' copies of the same business id
//! from colliding. Per-owner scalar documents (config + version) and the
//! legacy single-document schema use the bare owner id.

use std::sync::Arc;

use futures::future::try_join_all;
use tokio::sync::mpsc;

use crate::config::SyncConfig;
use crate::error::Result;
use crate::models::{
    CollectionKind, ConfigRecord, EntityRecord, JsonMap, Task, UserId, UserProfile, WorkspaceData,
};
use crate::remote::{CollectionSnapshot, DocumentWrite, RemoteStore};
use crate::retry::with_retry;

/// Per-owner scalar documents: config plus the version counter.
const USERS_COLLECTION: &str = "users";
/// The old single-document-per-user schema, kept for migration.
pub(crate) const LEGACY_COLLECTION: &str = "users_data";
/// Workspace-wide shared task collection.
const TASKS_COLLECTION: &str = "tasks";
/// Workspace member directory.
const PROFILES_COLLECTION: &str = "profiles";

/// Config scalar plus version counter delivered from the per-owner
/// document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserDoc {
    pub config: ConfigRecord,
    pub version: i64,
}

/// Typed read/write/subscribe operations over the raw [`RemoteStore`].
#[derive(Clone)]
pub struct CollectionGateway {
    store: Arc<dyn RemoteStore>,
    config: SyncConfig,
}

impl CollectionGateway {
    #[must_use]
    pub fn new(store: Arc<dyn RemoteStore>, config: SyncConfig) -> Self {
        Self { store, config }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn RemoteStore> {
        &self.store
    }

    /// Server wall clock used for version counters and tiebreakers.
    #[must_use]
    pub fn server_time_millis(&self) -> i64 {
        self.store.server_time_millis()
    }

    fn doc_key(owner: &UserId, id: &str) -> String {
        format!("{owner}_{id}")
    }

    /// Merge-upsert `items` into a shared collection in atomic chunks of
    /// at most `batch_size`, committed concurrently once constructed.
    /// Items lacking a usable id are skipped and logged, never fatal.
    /// Re-sending an unchanged record is a no-op from the merge
    /// perspective.
    pub async fn write_collection(
        &self,
        owner: &UserId,
        kind: CollectionKind,
        items: &[EntityRecord],
    ) -> Result<()> {
        let mut writes = Vec::with_capacity(items.len());
        for item in items {
            let Some(id) = item.doc_id() else {
                tracing::warn!(collection = %kind, "skipping item without id");
                continue;
            };
            // The bare business id is written back into the document so
            // reads never depend on the owner-prefixed key.
            let data = item.clone().with_doc_id(&id).into_map();
            writes.push(DocumentWrite {
                doc_id: Self::doc_key(owner, &id),
                data,
            });
        }
        if writes.is_empty() {
            return Ok(());
        }

        let policy = self.config.retry_policy();
        let chunk_size = self.config.batch_size.max(1);
        let commits = writes.chunks(chunk_size).map(|chunk| {
            let store = Arc::clone(&self.store);
            let chunk = chunk.to_vec();
            async move {
                with_retry(policy, "write_collection", || {
                    let store = Arc::clone(&store);
                    let chunk = chunk.clone();
                    async move { store.commit_batch(kind.as_str(), chunk).await }
                })
                .await
            }
        });
        try_join_all(commits).await?;
        Ok(())
    }

    /// Full scan of a shared collection with tombstoned records dropped.
    pub async fn read_collection(&self, kind: CollectionKind) -> Result<Vec<EntityRecord>> {
        let policy = self.config.retry_policy();
        let store = Arc::clone(&self.store);
        let snapshot = with_retry(policy, "read_collection", || {
            let store = Arc::clone(&store);
            async move { store.query_collection(kind.as_str()).await }
        })
        .await?;
        Ok(decode_snapshot(snapshot))
    }

    /// Open a push subscription over a shared collection, forwarding
    /// filtered, normalized snapshots into `tx`. Errors never cross the
    /// callback boundary; the forwarder logs and terminates silently.
    pub async fn subscribe_collection(
        &self,
        kind: CollectionKind,
        tx: mpsc::UnboundedSender<(CollectionKind, Vec<EntityRecord>)>,
    ) -> Result<()> {
        let mut rx = self.store.subscribe(kind.as_str()).await?;
        tokio::spawn(async move {
            while let Some(snapshot) = rx.recv().await {
                if tx.send((kind, decode_snapshot(snapshot))).is_err() {
                    break;
                }
            }
            tracing::debug!(collection = %kind, "collection subscription ended");
        });
        Ok(())
    }

    /// Write the per-owner config scalar and version counter.
    pub async fn write_user_doc(
        &self,
        owner: &UserId,
        config: &ConfigRecord,
        version: i64,
    ) -> Result<()> {
        let mut data = JsonMap::new();
        data.insert("config".to_string(), serde_json::Value::Object(config.clone()));
        data.insert("version".to_string(), version.into());
        data.insert("updatedAt".to_string(), self.server_time_millis().into());

        let policy = self.config.retry_policy();
        let store = Arc::clone(&self.store);
        let owner = owner.clone();
        with_retry(policy, "write_user_doc", move || {
            let store = Arc::clone(&store);
            let owner = owner.clone();
            let data = data.clone();
            async move {
                store
                    .upsert_document(USERS_COLLECTION, owner.as_str(), data)
                    .await
            }
        })
        .await
    }

    /// Read the per-owner scalar document, `None` when the owner has
    /// never pushed.
    pub async fn read_user_doc(&self, owner: &UserId) -> Result<Option<UserDoc>> {
        let policy = self.config.retry_policy();
        let store = Arc::clone(&self.store);
        let owner = owner.clone();
        let raw = with_retry(policy, "read_user_doc", move || {
            let store = Arc::clone(&store);
            let owner = owner.clone();
            async move { store.read_document(USERS_COLLECTION, owner.as_str()).await }
        })
        .await?;
        Ok(raw.map(decode_user_doc))
    }

    /// Subscribe to the owner's scalar document (config + version).
    pub async fn subscribe_user_doc(
        &self,
        owner: &UserId,
        tx: mpsc::UnboundedSender<UserDoc>,
    ) -> Result<()> {
        let mut rx = self.store.subscribe(USERS_COLLECTION).await?;
        let owner = owner.clone();
        tokio::spawn(async move {
            while let Some(snapshot) = rx.recv().await {
                let Some((_, raw)) = snapshot
                    .into_iter()
                    .find(|(doc_id, _)| doc_id == owner.as_str())
                else {
                    continue;
                };
                if tx.send(decode_user_doc(raw)).is_err() {
                    break;
                }
            }
            tracing::debug!("user doc subscription ended");
        });
        Ok(())
    }

    /// Push the whole working set: scalar document first, then every
    /// collection concurrently. A failed chunk does not roll back
    /// previously committed ones; a later retry is idempotent.
    pub async fn push_workspace(
        &self,
        owner: &UserId,
        data: &WorkspaceData,
        version: i64,
    ) -> Result<()> {
        self.write_user_doc(owner, &data.config, version).await?;
        let writes = CollectionKind::ALL
            .iter()
            .map(|kind| self.write_collection(owner, *kind, data.collection(*kind)));
        try_join_all(writes).await?;
        Ok(())
    }

    /// Read the whole remote copy; `None` when the owner has never
    /// pushed. Collections are read in parallel.
    pub async fn pull_workspace(&self, owner: &UserId) -> Result<Option<(WorkspaceData, i64)>> {
        let Some(user_doc) = self.read_user_doc(owner).await? else {
            return Ok(None);
        };

        let reads = CollectionKind::ALL.iter().map(|kind| self.read_collection(*kind));
        let collections = try_join_all(reads).await?;

        let mut data = WorkspaceData {
            config: user_doc.config,
            ..WorkspaceData::default()
        };
        for (kind, items) in CollectionKind::ALL.iter().zip(collections) {
            *data.collection_mut(*kind) = items;
        }
        Ok(Some((data, user_doc.version)))
    }

    // ----- tasks ----------------------------------------------------

    /// Load every task in the workspace-wide collection.
    pub async fn load_tasks(&self) -> Result<Vec<Task>> {
        let policy = self.config.retry_policy();
        let store = Arc::clone(&self.store);
        let snapshot = with_retry(policy, "load_tasks", move || {
            let store = Arc::clone(&store);
            async move { store.query_collection(TASKS_COLLECTION).await }
        })
        .await?;
        Ok(decode_tasks(snapshot))
    }

    /// Merge-upsert one task, keyed by its owner and id.
    pub async fn save_task(&self, task: &Task) -> Result<()> {
        let data = task.to_map()?;
        let doc_id = Self::doc_key(&task.created_by, &task.id);
        let policy = self.config.retry_policy();
        let store = Arc::clone(&self.store);
        with_retry(policy, "save_task", move || {
            let store = Arc::clone(&store);
            let doc_id = doc_id.clone();
            let data = data.clone();
            async move { store.upsert_document(TASKS_COLLECTION, &doc_id, data).await }
        })
        .await
    }

    /// Hard-remove a task document. Tasks do not use tombstones.
    pub async fn delete_task(&self, task: &Task) -> Result<()> {
        let doc_id = Self::doc_key(&task.created_by, &task.id);
        let policy = self.config.retry_policy();
        let store = Arc::clone(&self.store);
        with_retry(policy, "delete_task", move || {
            let store = Arc::clone(&store);
            let doc_id = doc_id.clone();
            async move { store.delete_document(TASKS_COLLECTION, &doc_id).await }
        })
        .await
    }

    /// Subscribe to the workspace-wide task collection.
    pub async fn subscribe_tasks(&self, tx: mpsc::UnboundedSender<Vec<Task>>) -> Result<()> {
        let mut rx = self.store.subscribe(TASKS_COLLECTION).await?;
        tokio::spawn(async move {
            while let Some(snapshot) = rx.recv().await {
                if tx.send(decode_tasks(snapshot)).is_err() {
                    break;
                }
            }
            tracing::debug!("task subscription ended");
        });
        Ok(())
    }

    // ----- profiles -------------------------------------------------

    /// Load the workspace member directory.
    pub async fn load_profiles(&self) -> Result<Vec<UserProfile>> {
        let policy = self.config.retry_policy();
        let store = Arc::clone(&self.store);
        let snapshot = with_retry(policy, "load_profiles", move || {
            let store = Arc::clone(&store);
            async move { store.query_collection(PROFILES_COLLECTION).await }
        })
        .await?;
        Ok(decode_profiles(snapshot))
    }

    /// Subscribe to the workspace member directory.
    pub async fn subscribe_profiles(
        &self,
        tx: mpsc::UnboundedSender<Vec<UserProfile>>,
    ) -> Result<()> {
        let mut rx = self.store.subscribe(PROFILES_COLLECTION).await?;
        tokio::spawn(async move {
            while let Some(snapshot) = rx.recv().await {
                if tx.send(decode_profiles(snapshot)).is_err() {
                    break;
                }
            }
            tracing::debug!("profile subscription ended");
        });
        Ok(())
    }
}

/// Normalize a raw snapshot: backfill ids from document keys and drop
/// tombstoned records.
fn decode_snapshot(snapshot: CollectionSnapshot) -> Vec<EntityRecord> {
    snapshot
        .into_iter()
        .map(|(doc_id, data)| EntityRecord::from_map(data).with_doc_id(&doc_id))
        .filter(|item| !item.is_deleted())
        .collect()
}

fn decode_tasks(snapshot: CollectionSnapshot) -> Vec<Task> {
    snapshot
        .into_iter()
        .filter_map(|(doc_id, data)| match Task::from_remote(&doc_id, data) {
            Ok(task) => Some(task),
            Err(error) => {
                tracing::warn!(doc_id, "dropping undecodable task: {error}");
                None
            }
        })
        .collect()
}

fn decode_profiles(snapshot: CollectionSnapshot) -> Vec<UserProfile> {
    snapshot
        .into_iter()
        .map(|(doc_id, mut data)| {
            data.entry("uid".to_string())
                .or_insert_with(|| doc_id.clone().into());
            serde_json::from_value(serde_json::Value::Object(data)).unwrap_or(UserProfile {
                uid: UserId::new(doc_id),
                ..UserProfile::default()
            })
        })
        .collect()
}

fn decode_user_doc(raw: JsonMap) -> UserDoc {
    let config = match raw.get("config") {
        Some(serde_json::Value::Object(map)) => map.clone(),
        _ => ConfigRecord::new(),
    };
    let version = raw
        .get("version")
        .map_or(0, crate::models::normalize_timestamp);
    UserDoc { config, version }
}
