use thiserror::Error;

/// Result alias used throughout the core crate.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Canonical error surface for the ledger core.
///
/// `Validation` is raised before anything is persisted. `Configuration` aborts a
/// sync cycle before any network call. `Transport` covers every push failure
/// (connection, timeout, non-2xx) and leaves local state untouched.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Transport error: {message}")]
    Transport {
        status: Option<u16>,
        message: String,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LedgerError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            status: None,
            message: message.into(),
        }
    }

    /// A push the remote answered with a non-2xx status.
    pub fn rejected(status: u16, body: &str) -> Self {
        let body = body.trim();
        let message = if body.is_empty() {
            format!("remote rejected sync batch with status {status}")
        } else {
            format!("remote rejected sync batch with status {status}: {body}")
        };
        Self::Transport {
            status: Some(status),
            message,
        }
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}
