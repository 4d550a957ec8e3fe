//! Shared data model: entity records, collections, tasks, and users.

pub mod collection;
pub mod record;
pub mod task;
pub mod user;

pub use collection::{CollectionKind, WorkspaceData};
pub use record::{normalize_timestamp, ConfigRecord, EntityRecord, JsonMap, Timestamp};
pub use task::{Task, TaskPriority, TaskStatus};
pub use user::{SessionState, UserId, UserProfile};
