//! Task model
//!
//! Tasks live in one workspace-wide collection shared across users, with
//! assignee lists and derived sharing visibility. Unlike the other
//! collections they are deleted with a hard remove rather than a
//! tombstone; that asymmetry is intentional and preserved.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::record::{normalize_timestamp, JsonMap};
use super::user::UserId;
use crate::error::Result;

/// Task lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Done,
}

/// Task priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

/// A shared task record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Stable, client-assigned identifier (UUID v7).
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: TaskPriority,
    /// Due date in epoch millis, when set.
    #[serde(default)]
    pub due_date: Option<i64>,
    pub created_by: UserId,
    #[serde(default)]
    pub assignees: Vec<UserId>,
    /// Derived visibility: owner plus explicit shares plus assignees.
    #[serde(default)]
    pub shared_with: Vec<UserId>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
    /// Business fields not modeled here pass through untouched.
    #[serde(flatten)]
    pub extra: JsonMap,
}

impl Task {
    /// Create a new task owned by `created_by` with a generated id.
    #[must_use]
    pub fn new(created_by: UserId, title: impl Into<String>, now_ms: i64) -> Self {
        let mut task = Self {
            id: Uuid::now_v7().to_string(),
            title: title.into(),
            description: String::new(),
            status: TaskStatus::default(),
            priority: TaskPriority::default(),
            due_date: None,
            created_by: created_by.clone(),
            assignees: Vec::new(),
            shared_with: Vec::new(),
            created_at: now_ms,
            updated_at: now_ms,
            extra: JsonMap::new(),
        };
        task.normalize_sharing(&created_by);
        task
    }

    /// Recompute `shared_with` as owner plus explicit shares plus
    /// assignees, deduplicated. Called on every mutation.
    pub fn normalize_sharing(&mut self, owner: &UserId) {
        let mut shared = Vec::with_capacity(1 + self.shared_with.len() + self.assignees.len());
        shared.push(owner.clone());
        for user in self.shared_with.iter().chain(self.assignees.iter()) {
            if !shared.contains(user) {
                shared.push(user.clone());
            }
        }
        self.shared_with = shared;
    }

    /// Decode a raw remote document, normalizing the timestamp fields
    /// into epoch millis before typed deserialization.
    pub fn from_remote(doc_id: &str, mut raw: JsonMap) -> Result<Self> {
        raw.entry("id".to_string())
            .or_insert_with(|| doc_id.to_string().into());
        for field in ["createdAt", "updatedAt"] {
            if let Some(value) = raw.get(field) {
                let millis = normalize_timestamp(value);
                raw.insert(field.to_string(), millis.into());
            }
        }
        Ok(serde_json::from_value(serde_json::Value::Object(raw))?)
    }

    /// Encode for the remote write path.
    pub fn to_map(&self) -> Result<JsonMap> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map),
            _ => Err(crate::Error::InvalidInput(
                "task did not serialize to an object".to_string(),
            )),
        }
    }
}
