//! Error types for the sync engine.
//!
//! Errors are split by boundary (record store, stream relay, frame
//! parsing) and unified under [`SyncError`] for the task queue. Network
//! failures never escape the async task that hit them: they are converted
//! into local state transitions (rollback, error timeline entry, skipped
//! reconcile tick) at the boundary and surfaced as engine events.

use thiserror::Error;

/// Errors from the authoritative record store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server error ({status}): {message}")]
    Status { status: u16, message: String },

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Errors produced while assembling frames from the transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameParseError {
    #[error("invalid frame json: {detail}")]
    InvalidJson { detail: String },

    #[error("frame ended without data")]
    MissingData,
}

/// Errors from the agent streaming gateway.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Parse(#[from] FrameParseError),

    #[error("server error ({status}): {message}")]
    Status { status: u16, message: String },

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Unified error for sync queue tasks.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Relay(#[from] RelayError),
}

/// Result alias for queue tasks.
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let err = StoreError::Status {
            status: 500,
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "server error (500): boom");
    }

    #[test]
    fn test_parse_error_display() {
        let err = FrameParseError::InvalidJson {
            detail: "expected value".to_string(),
        };
        assert!(err.to_string().contains("invalid frame json"));
        assert_eq!(
            FrameParseError::MissingData.to_string(),
            "frame ended without data"
        );
    }

    #[test]
    fn test_sync_error_unifies_store_and_relay() {
        let err: SyncError = StoreError::Status {
            status: 404,
            message: "gone".to_string(),
        }
        .into();
        assert!(matches!(err, SyncError::Store(_)));

        let err: SyncError = RelayError::Parse(FrameParseError::MissingData).into();
        assert!(matches!(err, SyncError::Relay(_)));
    }
}
