//! bookspace-core - Sync engine for the Bookspace dashboard
//!
//! This crate contains the shared models, the convergent merge logic, and
//! the sync orchestrator used by all Bookspace clients. Local edits land
//! in the working set immediately and reach the remote store through a
//! debounced, retried push; remote edits arrive over push subscriptions
//! and are merged record-by-record, last writer wins.

pub mod config;
pub mod error;
pub mod export;
pub mod models;
pub mod remote;
pub mod retry;
pub mod state;
pub mod storage;
pub mod sync;
pub mod util;

pub use config::SyncConfig;
pub use error::{Error, Result};
pub use models::{
    CollectionKind, ConfigRecord, EntityRecord, SessionState, Task, UserId, UserProfile,
    WorkspaceData,
};
pub use remote::{MemoryRemote, RemoteStore};
pub use state::SyncStatus;
pub use sync::{SyncEngine, SyncHandle, SyncOutcome, TaskStore};
