//! # session-uplink
//!
//! Backend library for uploading locally recorded wellness sessions to a
//! remote analysis service and tracking them through processing.
//!
//! ## Design Philosophy
//!
//! session-uplink is designed to be:
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Explicitly wired** - No process-wide singletons; orchestrators are
//!   constructed with their store and credentials and passed around
//! - **Event-driven per operation** - Each upload operation owns a typed
//!   progress channel; there is no global broadcast bus
//! - **Cancellable** - Every stage honors a cancellation token and winds
//!   down within a configured grace period
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use session_uplink::{
//!     ApiConfig, Config, FsSessionStore, ProgressEvent, SessionId, StaticCredentials,
//!     UploadOrchestrator,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         api: ApiConfig {
//!             base_url: "https://api.example.com/v1".to_string(),
//!             ..Default::default()
//!         },
//!         ..Default::default()
//!     };
//!
//!     let store = Arc::new(FsSessionStore::new("/var/lib/app/sessions"));
//!     let credentials = Arc::new(StaticCredentials::new("token"));
//!     let orchestrator = UploadOrchestrator::new(config, store, credentials)?;
//!
//!     let mut handle = orchestrator.start(SessionId::new("session-uuid")).await?;
//!     while let Some(event) = handle.next_event().await {
//!         if let ProgressEvent::Finished(outcome) = event {
//!             println!("done: {:?}", outcome);
//!             break;
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Concurrent asset uploads against presigned URLs
pub mod asset_uploader;
/// Credential supply for authenticated API calls
pub mod auth;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Upload orchestration and the per-operation state machine
pub mod orchestrator;
/// Session eligibility checks and wire-format packaging
pub mod packager;
/// Processing-status polling
pub mod poller;
/// Local session and asset storage
pub mod store;
/// Batch metadata submission
pub mod submission;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use asset_uploader::{AssetUploader, UploadSummary};
pub use auth::{CredentialSupplier, StaticCredentials};
pub use config::{ApiConfig, Config, PollConfig, UploadConfig};
pub use error::{
    Error, IsRetryable, Result, SubmissionError, UploadError, ValidationError,
};
pub use orchestrator::{CancelHandle, UploadHandle, UploadOrchestrator};
pub use packager::{BatchSubmissionRequest, SessionPackager};
pub use poller::{PollOutcome, PollSnapshot, ProcessingStatusPoller};
pub use store::{FsSessionStore, MemorySessionStore, SessionStore};
pub use submission::BatchSubmissionClient;
pub use types::{
    AssetDescriptor, AssetUploadTarget, AttemptState, DeviceInfo, EnvironmentData,
    OperationOutcome, OperationStage, ProcessingJob, ProcessingStatus, ProgressEvent,
    RecordingSession, SessionId, UploadAttempt, UploadPlan,
};
