//! Error types for session-uplink
//!
//! The error taxonomy mirrors how failures propagate through an upload
//! operation:
//! - Validation errors stop the operation locally, before any network call
//! - Submission errors abort the whole operation (no plan, no uploads)
//! - Per-asset upload failures are absorbed and only surface in progress
//!   telemetry
//! - Transient polling errors are swallowed and counted against the budget

use thiserror::Error;

use crate::types::SessionId;

/// Result type alias for session-uplink operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for session-uplink
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "base_url")
        key: Option<String>,
    },

    /// Session failed local eligibility checks
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Metadata submission failed
    #[error("submission error: {0}")]
    Submission(#[from] SubmissionError),

    /// Session not found in the local store
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    /// Local asset not found in the store
    #[error("asset not found: {0}")]
    AssetNotFound(String),

    /// An upload operation is already in flight for this session
    #[error("upload already in progress for session {0}")]
    OperationInProgress(SessionId),

    /// Network error outside the submission/poll paths
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Local session eligibility failures
///
/// These are rejected before any network side effect; the session stays in
/// local storage and no retry is offered automatically.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The session has no recorded end time yet
    #[error("session {id} is not finalized (no end time recorded)")]
    NotFinalized {
        /// The session that was rejected
        id: SessionId,
    },

    /// The session is shorter than the minimum eligible duration
    #[error("session {id} too short: {actual_seconds}s recorded, {required_seconds}s required")]
    SessionTooShort {
        /// The session that was rejected
        id: SessionId,
        /// Recorded duration in seconds
        actual_seconds: i64,
        /// Minimum eligible duration in seconds
        required_seconds: i64,
    },
}

/// Fatal metadata-submission failures
///
/// Any of these aborts the whole operation: no upload plan exists, so no
/// asset upload or polling is attempted. Variants carry owned context rather
/// than transport error types so outcomes stay cheaply cloneable into the
/// progress stream.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SubmissionError {
    /// HTTP transport failure (connect, timeout, TLS, ...)
    #[error("transport failure: {message}")]
    Transport {
        /// Underlying transport error description
        message: String,
    },

    /// Server returned a non-2xx status
    #[error("server rejected submission with status {code}: {body}")]
    Status {
        /// HTTP status code
        code: u16,
        /// Response body text, if any
        body: String,
    },

    /// Response body did not decode as an upload plan
    #[error("malformed upload plan: {message}")]
    Decode {
        /// Decode error description
        message: String,
    },

    /// The returned target list does not cover the submitted assets
    ///
    /// Proceeding would make asset association ambiguous, so this is fatal.
    #[error("upload plan mismatch: submitted {submitted} assets, received {returned} targets")]
    PlanMismatch {
        /// Number of assets in the submission
        submitted: usize,
        /// Number of targets in the plan
        returned: usize,
    },
}

/// Per-asset upload failures
///
/// These never fail the operation; they are recorded on the attempt and
/// surfaced in aggregate progress only.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The plan references a local file the store does not have
    #[error("no local asset for target {local_file_id}")]
    MissingLocalAsset {
        /// The local file id the plan referenced
        local_file_id: String,
    },

    /// The target URL is not parseable
    #[error("invalid upload URL: {0}")]
    InvalidTarget(String),

    /// Reading the local bytes failed
    #[error("failed to read asset bytes: {0}")]
    Read(String),

    /// The PUT itself failed at the transport level
    #[error("upload transport failure: {0}")]
    Transport(String),

    /// Object storage answered with a non-2xx status (including expired
    /// presigned targets)
    #[error("upload rejected with status {code}")]
    Status {
        /// HTTP status code
        code: u16,
    },
}

/// Trait for errors that can be classified as transient or permanent
///
/// The poller uses this to choose log severity: transient transport blips
/// are expected mid-poll and logged at `warn`, anything else at `error`.
/// Either way the error is swallowed and counted against the poll budget.
pub trait IsRetryable {
    /// Returns true if the error is transient and the same request may
    /// succeed on a later attempt
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for reqwest::Error {
    fn is_retryable(&self) -> bool {
        self.is_timeout() || self.is_connect() || self.is_request()
    }
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Network(e) => e.is_retryable(),
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
            ),
            // Submission errors abort the operation; retry is a manual,
            // later decision
            Error::Submission(_) => false,
            // Everything else is permanent for this attempt
            _ => false,
        }
    }
}
