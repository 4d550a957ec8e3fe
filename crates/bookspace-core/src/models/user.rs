//! User identity types supplied by the external auth provider.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque stable user identifier issued by the auth provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Session lifecycle as reported by the auth provider.
///
/// `Absent` puts the engine in local-only mode; every remote operation
/// short-circuits with a not-configured result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Present(UserId),
    Absent,
}

impl SessionState {
    #[must_use]
    pub const fn user_id(&self) -> Option<&UserId> {
        match self {
            Self::Present(user_id) => Some(user_id),
            Self::Absent => None,
        }
    }
}

/// Workspace member directory entry, used by assignee pickers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: UserId,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub email: String,
}
