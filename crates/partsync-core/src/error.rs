//! Sync error handling
//!
//! Every failure a store operation can hit falls into one of three remote
//! classes (transport, HTTP status, response shape) or is a local
//! precondition failure detected before any request is sent.

use thiserror::Error;

use crate::models::{BlockId, LineId};

/// Boxed error used for transport failures from any HTTP backend
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while talking to the part service
#[derive(Error, Debug)]
pub enum SyncError {
    /// The request never produced a response (connect, DNS, timeout, ...)
    #[error("Request to '{url}' failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: BoxError,
    },

    /// The server answered with a non-success status
    #[error("Server returned {status} for '{url}': {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    /// The response body did not have the expected shape
    #[error("Unexpected response from '{url}': {details}")]
    Malformed { url: String, details: String },

    /// No part is loaded yet
    #[error("No document part is loaded")]
    NotLoaded,

    /// The line is not held by the loaded part
    #[error("Line #{0} is not part of the loaded document part")]
    UnknownLine(LineId),

    /// The region is not held by the loaded part
    #[error("Region #{0} is not part of the loaded document part")]
    UnknownRegion(BlockId),

    /// The line's transcription has no version with this revision
    #[error("Line #{line} has no version '{revision}'")]
    UnknownVersion { line: LineId, revision: String },

    /// The store was disposed
    #[error("The part store has been disposed")]
    Closed,
}

/// Failure taxonomy used for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Network or transport failure
    Transport,
    /// Non-success HTTP status
    Status,
    /// Malformed or unexpected response shape
    Malformed,
    /// Rejected locally, nothing was sent
    Local,
}

impl SyncError {
    /// Build a transport error from any error type
    pub fn transport(url: impl Into<String>, source: impl Into<BoxError>) -> Self {
        SyncError::Transport {
            url: url.into(),
            source: source.into(),
        }
    }

    /// Build a malformed-response error
    pub fn malformed(url: impl Into<String>, details: impl ToString) -> Self {
        SyncError::Malformed {
            url: url.into(),
            details: details.to_string(),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> FailureKind {
        match self {
            SyncError::Transport { .. } => FailureKind::Transport,
            SyncError::Status { .. } => FailureKind::Status,
            SyncError::Malformed { .. } => FailureKind::Malformed,
            SyncError::NotLoaded
            | SyncError::UnknownLine(_)
            | SyncError::UnknownRegion(_)
            | SyncError::UnknownVersion { .. }
            | SyncError::Closed => FailureKind::Local,
        }
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            SyncError::Transport { .. } => {
                Some("Check that the server is reachable, then repeat the edit to re-send it.")
            }
            SyncError::Status { status: 401 | 403, .. } => {
                Some("The session or CSRF token was rejected. Log in again and refresh the tokens.")
            }
            SyncError::Status { status: 404, .. } => {
                Some("The resource no longer exists on the server. Reload the part.")
            }
            SyncError::Malformed { .. } => {
                Some("The server answered with an unexpected payload. Reload the part.")
            }
            SyncError::NotLoaded => Some("Load a part before editing it."),
            _ => None,
        }
    }
}

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_transport_classification() {
        let err = SyncError::transport(
            "http://localhost/api/",
            io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
        );

        assert_eq!(err.kind(), FailureKind::Transport);
        assert!(err.recovery_suggestion().is_some());
    }

    #[test]
    fn test_status_suggestions() {
        let forbidden = SyncError::Status {
            url: "/api/documents/1/parts/2/".to_string(),
            status: 403,
            body: "CSRF verification failed".to_string(),
        };
        assert_eq!(forbidden.kind(), FailureKind::Status);
        assert!(forbidden.recovery_suggestion().unwrap().contains("CSRF"));

        let server = SyncError::Status {
            url: "/api/documents/1/parts/2/".to_string(),
            status: 500,
            body: String::new(),
        };
        assert!(server.recovery_suggestion().is_none());
    }

    #[test]
    fn test_local_errors_are_local() {
        assert_eq!(SyncError::NotLoaded.kind(), FailureKind::Local);
        assert_eq!(SyncError::UnknownLine(4).kind(), FailureKind::Local);
        assert_eq!(SyncError::UnknownRegion(2).kind(), FailureKind::Local);
    }

    #[test]
    fn test_error_display() {
        let err = SyncError::malformed("/api/documents/1/parts/2/", "missing field `lines`");
        let msg = err.to_string();
        assert!(msg.contains("Unexpected response"));
        assert!(msg.contains("missing field `lines`"));

        assert!(SyncError::UnknownLine(12).to_string().contains("#12"));
    }
}
