//! Sync orchestrator: debounced push, full reconciliation, live
//! subscription intake, and offline handling.
//!
//! The working set is owned by exactly one consumer task. UI-facing code
//! holds a [`SyncHandle`] and issues commands over a channel; remote
//! subscriptions feed the same task through intake channels. Both
//! mutation sources therefore funnel through one event loop, and state
//! is always replaced with merge output rather than edited in place.

pub mod gateway;
pub mod merge;
pub mod migrate;
pub mod tasks;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;

use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::models::{
    CollectionKind, ConfigRecord, EntityRecord, SessionState, UserId, WorkspaceData,
};
use crate::remote::RemoteStore;
use crate::state::SyncStatus;
use crate::storage::{self, LocalStore};
use crate::util::now_millis;

pub use gateway::{CollectionGateway, UserDoc};
pub use merge::{merge_config, merge_records, merge_workspace};
pub use migrate::migrate_legacy;
pub use tasks::TaskStore;

/// What a full reconciliation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Local state was strictly newer and was pushed.
    Uploaded,
    /// Remote state was strictly newer and was adopted wholesale.
    Downloaded,
    /// Versions were equal; collections were merged and pushed back.
    Merged,
    /// No remote workspace or signed-in user; nothing to do.
    NotConfigured,
    /// Connectivity is down; reconciliation was suppressed.
    Offline,
}

enum Command {
    ReplaceCollection(CollectionKind, Vec<EntityRecord>),
    UpdateConfig(ConfigRecord),
    SyncNow(oneshot::Sender<Result<SyncOutcome>>),
    SetOnline(bool),
    Shutdown,
}

/// Cheap-to-clone handle to a running [`SyncEngine`] task.
///
/// Dropping every handle shuts the engine down.
#[derive(Clone)]
pub struct SyncHandle {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<SyncStatus>,
    data: watch::Receiver<WorkspaceData>,
}

impl SyncHandle {
    /// Replace a collection with the UI's new array; schedules a
    /// debounced push.
    pub fn replace_collection(
        &self,
        kind: CollectionKind,
        items: Vec<EntityRecord>,
    ) -> Result<()> {
        self.send(Command::ReplaceCollection(kind, items))
    }

    /// Replace the config scalar; schedules a debounced push.
    pub fn update_config(&self, config: ConfigRecord) -> Result<()> {
        self.send(Command::UpdateConfig(config))
    }

    /// Run a full bidirectional reconciliation now. This is the manual
    /// "retry sync" affordance; it is not meant to run on every tick.
    pub async fn sync_now(&self) -> Result<SyncOutcome> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::SyncNow(tx))?;
        rx.await.map_err(|_| Error::EngineStopped)?
    }

    /// Report a connectivity transition.
    pub fn set_online(&self, online: bool) -> Result<()> {
        self.send(Command::SetOnline(online))
    }

    /// Current sync status.
    #[must_use]
    pub fn status(&self) -> SyncStatus {
        *self.status.borrow()
    }

    /// Watch sync status transitions (the UI indicator).
    #[must_use]
    pub fn watch_status(&self) -> watch::Receiver<SyncStatus> {
        self.status.clone()
    }

    /// A point-in-time copy of the working set.
    #[must_use]
    pub fn snapshot(&self) -> WorkspaceData {
        self.data.borrow().clone()
    }

    /// Watch working-set replacements (the UI re-render signal).
    #[must_use]
    pub fn watch_data(&self) -> watch::Receiver<WorkspaceData> {
        self.data.clone()
    }

    /// Stop the engine task.
    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands.send(command).map_err(|_| Error::EngineStopped)
    }
}

/// The single-consumer sync task.
pub struct SyncEngine<L: LocalStore> {
    config: SyncConfig,
    remote: Option<(CollectionGateway, UserId)>,
    local: L,
    data: WorkspaceData,
    local_version: i64,
    dirty: bool,
    online: bool,
    debounce_deadline: Option<Instant>,
    status_tx: watch::Sender<SyncStatus>,
    data_tx: watch::Sender<WorkspaceData>,
    commands_rx: mpsc::UnboundedReceiver<Command>,
    collection_rx: mpsc::UnboundedReceiver<(CollectionKind, Vec<EntityRecord>)>,
    collection_tx: mpsc::UnboundedSender<(CollectionKind, Vec<EntityRecord>)>,
    user_doc_rx: mpsc::UnboundedReceiver<UserDoc>,
    user_doc_tx: mpsc::UnboundedSender<UserDoc>,
}

impl<L: LocalStore> SyncEngine<L> {
    /// Spawn the engine task and return a handle to it.
    ///
    /// Sync is enabled only when a remote store is supplied, the config
    /// names a workspace, and a user is signed in; otherwise the engine
    /// serves the local store alone.
    pub fn spawn(
        config: SyncConfig,
        store: Option<Arc<dyn RemoteStore>>,
        local: L,
        session: &SessionState,
    ) -> SyncHandle {
        let remote = match (store, session.user_id()) {
            (Some(store), Some(user_id)) if config.is_configured() => Some((
                CollectionGateway::new(store, config.clone()),
                user_id.clone(),
            )),
            _ => None,
        };

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (collection_tx, collection_rx) = mpsc::unbounded_channel();
        let (user_doc_tx, user_doc_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(SyncStatus::Idle);
        let (data_tx, data_rx) = watch::channel(WorkspaceData::default());

        let engine = Self {
            config,
            remote,
            local,
            data: WorkspaceData::default(),
            // Session recency: a fresh session outranks any older stored
            // version until a pull says otherwise.
            local_version: now_millis(),
            dirty: false,
            online: true,
            debounce_deadline: None,
            status_tx,
            data_tx,
            commands_rx,
            collection_rx,
            collection_tx,
            user_doc_rx,
            user_doc_tx,
        };
        tokio::spawn(engine.run());

        SyncHandle {
            commands: commands_tx,
            status: status_rx,
            data: data_rx,
        }
    }

    async fn run(mut self) {
        self.load_local();
        self.publish_data();
        self.initial_sync().await;
        self.open_subscriptions().await;

        loop {
            let debounce = self.debounce_deadline;
            tokio::select! {
                command = self.commands_rx.recv() => {
                    match command {
                        Some(Command::ReplaceCollection(kind, items)) => {
                            self.apply_collection_mutation(kind, items);
                        }
                        Some(Command::UpdateConfig(config)) => {
                            self.apply_config_mutation(config);
                        }
                        Some(Command::SyncNow(reply)) => {
                            let outcome = self.full_sync().await;
                            let _ = reply.send(outcome);
                        }
                        Some(Command::SetOnline(online)) => {
                            self.handle_connectivity(online).await;
                        }
                        Some(Command::Shutdown) | None => break,
                    }
                }
                Some((kind, items)) = self.collection_rx.recv() => {
                    self.apply_remote_collection(kind, &items);
                }
                Some(user_doc) = self.user_doc_rx.recv() => {
                    self.apply_remote_user_doc(user_doc);
                }
                () = sleep_until_opt(debounce) => {
                    self.debounce_deadline = None;
                    self.flush_pending_push().await;
                }
            }
        }
        tracing::debug!("sync engine stopped");
    }

    // ----- local command path ---------------------------------------

    fn apply_collection_mutation(&mut self, kind: CollectionKind, mut items: Vec<EntityRecord>) {
        let now = now_millis();
        for item in &mut items {
            item.ensure_updated_at(now);
        }
        *self.data.collection_mut(kind) = items;
        if let Err(error) = storage::save_collection(&self.local, kind, self.data.collection(kind))
        {
            tracing::warn!(collection = %kind, "local save failed: {error}");
        }
        self.publish_data();
        self.schedule_push();
    }

    fn apply_config_mutation(&mut self, config: ConfigRecord) {
        self.data.config = config;
        if let Err(error) = storage::save_config(&self.local, &self.data.config) {
            tracing::warn!("local config save failed: {error}");
        }
        self.publish_data();
        self.schedule_push();
    }

    /// Batch rapid-fire edits into one remote round trip.
    fn schedule_push(&mut self) {
        self.dirty = true;
        if self.remote.is_some() {
            self.debounce_deadline =
                Some(Instant::now() + Duration::from_millis(self.config.debounce_ms));
        }
    }

    async fn flush_pending_push(&mut self) {
        if !self.dirty {
            return;
        }
        let Some((gateway, owner)) = self.remote.clone() else {
            return;
        };
        if !self.online {
            // Suppressed; the pending state is delivered by the full
            // reconciliation that runs on reconnect.
            self.set_status(SyncStatus::Offline);
            return;
        }

        self.set_status(SyncStatus::Syncing);
        let version = self.next_version();
        match gateway.push_workspace(&owner, &self.data, version).await {
            Ok(()) => {
                self.local_version = version;
                self.dirty = false;
                self.set_status(SyncStatus::Synced);
            }
            Err(error) => {
                // Local data stays intact for the next debounce cycle or
                // a manual retry.
                tracing::warn!("debounced push failed: {error}");
                self.set_status(SyncStatus::Error);
            }
        }
    }

    // ----- remote intake path ---------------------------------------

    fn apply_remote_collection(&mut self, kind: CollectionKind, items: &[EntityRecord]) {
        // Always merge, never wholesale-replace: an in-flight unsynced
        // local edit must survive an overlapping remote push.
        let merged = merge_records(self.data.collection(kind), items);
        if &merged == self.data.collection(kind) {
            return;
        }
        *self.data.collection_mut(kind) = merged;
        if let Err(error) = storage::save_collection(&self.local, kind, self.data.collection(kind))
        {
            tracing::warn!(collection = %kind, "local save failed: {error}");
        }
        self.publish_data();
    }

    fn apply_remote_user_doc(&mut self, user_doc: UserDoc) {
        if user_doc.version <= self.local_version {
            return;
        }
        self.data.config = merge_config(&self.data.config, &user_doc.config);
        self.local_version = user_doc.version;
        if let Err(error) = storage::save_config(&self.local, &self.data.config) {
            tracing::warn!("local config save failed: {error}");
        }
        self.publish_data();
        self.set_status(SyncStatus::Synced);
    }

    // ----- reconciliation -------------------------------------------

    async fn initial_sync(&mut self) {
        if self.remote.is_none() {
            return;
        }
        let outcome = self.full_sync().await;
        if let Err(error) = outcome {
            tracing::warn!("initial sync failed: {error}");
        }
    }

    async fn full_sync(&mut self) -> Result<SyncOutcome> {
        let Some((gateway, owner)) = self.remote.clone() else {
            return Ok(SyncOutcome::NotConfigured);
        };
        if !self.online {
            self.set_status(SyncStatus::Offline);
            return Ok(SyncOutcome::Offline);
        }

        self.set_status(SyncStatus::Syncing);
        match self.reconcile(&gateway, &owner).await {
            Ok(outcome) => {
                self.set_status(SyncStatus::Synced);
                Ok(outcome)
            }
            Err(error) => {
                tracing::warn!("sync with cloud failed: {error}");
                self.set_status(SyncStatus::Error);
                Err(error)
            }
        }
    }

    async fn reconcile(
        &mut self,
        gateway: &CollectionGateway,
        owner: &UserId,
    ) -> Result<SyncOutcome> {
        migrate_legacy(gateway, owner).await?;

        let Some((remote_data, remote_version)) = gateway.pull_workspace(owner).await? else {
            // Nothing in the cloud yet; seed it from local state.
            return self.push_all(gateway, owner).await.map(|()| SyncOutcome::Uploaded);
        };

        // First load into an empty working set adopts the remote copy
        // outright; there is no local state worth comparing.
        if self.data.is_empty() {
            self.adopt(remote_data, remote_version);
            return Ok(SyncOutcome::Downloaded);
        }

        if self.local_version > remote_version {
            self.push_all(gateway, owner).await?;
            Ok(SyncOutcome::Uploaded)
        } else if remote_version > self.local_version {
            self.adopt(remote_data, remote_version);
            Ok(SyncOutcome::Downloaded)
        } else {
            self.data = merge_workspace(&self.data, &remote_data);
            self.push_all(gateway, owner).await?;
            self.persist_all();
            self.publish_data();
            Ok(SyncOutcome::Merged)
        }
    }

    async fn push_all(&mut self, gateway: &CollectionGateway, owner: &UserId) -> Result<()> {
        let version = self.next_version();
        gateway.push_workspace(owner, &self.data, version).await?;
        self.local_version = version;
        self.dirty = false;
        Ok(())
    }

    fn adopt(&mut self, remote_data: WorkspaceData, remote_version: i64) {
        self.data = remote_data;
        self.local_version = remote_version;
        self.dirty = false;
        self.persist_all();
        self.publish_data();
    }

    async fn handle_connectivity(&mut self, online: bool) {
        if online == self.online {
            return;
        }
        self.online = online;
        if online {
            let _ = self.full_sync().await;
        } else if self.remote.is_some() {
            self.set_status(SyncStatus::Offline);
        }
    }

    // ----- plumbing --------------------------------------------------

    async fn open_subscriptions(&self) {
        let Some((gateway, owner)) = &self.remote else {
            return;
        };
        for kind in CollectionKind::ALL {
            if let Err(error) = gateway
                .subscribe_collection(kind, self.collection_tx.clone())
                .await
            {
                tracing::warn!(collection = %kind, "subscription failed: {error}");
            }
        }
        if let Err(error) = gateway
            .subscribe_user_doc(owner, self.user_doc_tx.clone())
            .await
        {
            tracing::warn!("user doc subscription failed: {error}");
        }
    }

    fn load_local(&mut self) {
        match storage::load_all(&self.local) {
            Ok(data) => self.data = data,
            Err(error) => tracing::warn!("loading local data failed: {error}"),
        }
    }

    fn persist_all(&self) {
        if let Err(error) = storage::save_all(&self.local, &self.data) {
            tracing::warn!("local save failed: {error}");
        }
    }

    fn publish_data(&self) {
        self.data_tx.send_replace(self.data.clone());
    }

    fn set_status(&self, status: SyncStatus) {
        self.status_tx.send_replace(status);
    }

    /// Versions only ever move forward, even against a stale clock.
    fn next_version(&self) -> i64 {
        now_millis().max(self.local_version + 1)
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => futures::future::pending().await,
    }
}
