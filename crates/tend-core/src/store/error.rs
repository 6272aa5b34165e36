//! Store error handling
//!
//! Typed errors for remote store operations. Messages are shown to the user
//! as-is in the todo state's error slot, so they are written to be read.

use thiserror::Error;

use crate::config::ConfigError;
use crate::models::TaskId;

/// Errors that can occur talking to the remote store
#[derive(Error, Debug)]
pub enum StoreError {
    /// No URL or access key was configured
    #[error("Remote store is not configured")]
    NotConfigured,

    /// Access key cannot be sent as a header
    #[error("Store access key contains characters that cannot be sent in a header")]
    InvalidKey,

    /// Network or transport failure
    #[error("Could not reach the remote store: {0}")]
    Http(#[from] reqwest::Error),

    /// The store answered with a non-success status
    #[error("Remote store rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The task does not exist on the store
    #[error("Task not found: {0}")]
    NotFound(TaskId),

    /// Response body could not be understood
    #[error("Unexpected response from remote store: {0}")]
    Decode(String),

    /// Store settings could not be turned into an endpoint
    #[error("Invalid store settings: {0}")]
    Settings(#[from] ConfigError),

    /// The store is temporarily unavailable (in-process store)
    #[error("Remote store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Whether asking the user to try again could help
    ///
    /// Nothing retries automatically; this only drives the hint shown to
    /// the user.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Http(_) | StoreError::Unavailable(_) => true,
            StoreError::Rejected { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            StoreError::NotConfigured => {
                Some("Set TEND_STORE_URL and TEND_STORE_KEY, or run `tend config set`.")
            }
            StoreError::InvalidKey => Some("Check the configured store_key for stray characters."),
            StoreError::Settings(_) => Some("Check store_url with `tend config show`."),
            StoreError::Rejected { status: 401, .. } | StoreError::Rejected { status: 403, .. } => {
                Some("Check that store_key is valid for this project.")
            }
            _ if self.is_transient() => Some("Check your connection and try again."),
            _ => None,
        }
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_display() {
        let err = StoreError::Rejected {
            status: 409,
            message: "duplicate key value".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("409"));
        assert!(msg.contains("duplicate key value"));
    }

    #[test]
    fn test_transient_classification() {
        assert!(StoreError::Unavailable("offline".to_string()).is_transient());
        assert!(StoreError::Rejected {
            status: 503,
            message: String::new()
        }
        .is_transient());
        assert!(!StoreError::Rejected {
            status: 400,
            message: String::new()
        }
        .is_transient());
        assert!(!StoreError::NotConfigured.is_transient());
        assert!(!StoreError::NotFound(TaskId::from("1")).is_transient());
    }

    #[test]
    fn test_recovery_suggestions() {
        assert!(StoreError::NotConfigured.recovery_suggestion().is_some());
        assert!(StoreError::Rejected {
            status: 401,
            message: "bad jwt".to_string()
        }
        .recovery_suggestion()
        .unwrap()
        .contains("store_key"));
        assert!(StoreError::Unavailable("x".to_string())
            .recovery_suggestion()
            .is_some());
        assert!(StoreError::Decode("x".to_string())
            .recovery_suggestion()
            .is_none());
    }
}
