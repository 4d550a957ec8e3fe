//! Error types for bookspace-core

use thiserror::Error;

/// Result type alias using bookspace-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in bookspace-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// No remote workspace is configured; sync features are disabled
    #[error("Cloud sync is not configured")]
    NotConfigured,

    /// Network-level failure talking to the remote store
    #[error("Network error: {0}")]
    Network(String),

    /// Remote store rejected the operation (bad payload, permissions)
    #[error("Remote store error: {0}")]
    Remote(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Local persistence adapter error
    #[error("Storage error: {0}")]
    Storage(String),

    /// The sync engine task has shut down
    #[error("Sync engine has stopped")]
    EngineStopped,
}

impl Error {
    /// Whether a retry is likely to succeed.
    ///
    /// Network failures and anything the remote reports as an
    /// availability problem are transient; logic errors are not.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Remote(message) => {
                let message = message.to_ascii_lowercase();
                message.contains("offline")
                    || message.contains("network")
                    || message.contains("unavailable")
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_errors_are_transient() {
        assert!(Error::Network("connection reset".to_string()).is_transient());
        assert!(Error::Remote("service unavailable".to_string()).is_transient());
        assert!(Error::Remote("client is offline".to_string()).is_transient());
    }

    #[test]
    fn logic_errors_are_permanent() {
        assert!(!Error::Remote("permission denied".to_string()).is_transient());
        assert!(!Error::InvalidInput("missing id".to_string()).is_transient());
        assert!(!Error::NotConfigured.is_transient());
    }
}
