//! Core types for session-uplink

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{SubmissionError, ValidationError};

/// Unique identifier for a locally recorded session
///
/// This is the client-assigned identifier (typically a UUID string minted by
/// the recording collaborator), not the server-side job id.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Create a new SessionId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Device metadata snapshot attached to a session submission
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// Device model identifier (e.g., "iPhone", "Pixel 8")
    pub device_type: String,
    /// Application version string
    pub app_version: String,
    /// Operating system version string
    pub os_version: String,
    /// Opaque per-device identifier, if the platform exposes one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

/// Ambient environment readings captured alongside a session
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentData {
    /// Temperature in degrees Celsius
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Relative humidity percentage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity: Option<i32>,
    /// Ambient noise level (device-specific scale)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub noise_level: Option<i32>,
    /// Ambient light level (device-specific scale)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub light_level: Option<i32>,
}

/// A locally recorded activity session, immutable once finalized
///
/// Only sessions with a recorded `end_time` and a duration of at least the
/// configured minimum are eligible for packaging; shorter or unfinished
/// sessions are rejected before any network call is made.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingSession {
    /// Client-assigned session identifier
    pub local_id: SessionId,
    /// When recording started
    pub start_time: DateTime<Utc>,
    /// When recording ended (None while the activity is still in progress)
    pub end_time: Option<DateTime<Utc>>,
    /// Target duration in minutes, if the user set one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_duration_minutes: Option<u32>,
    /// Device metadata snapshot
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_info: Option<DeviceInfo>,
    /// Ambient environment readings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<EnvironmentData>,
    /// Free-text user notes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl RecordingSession {
    /// Recorded duration, or None if the session has not been finalized
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.end_time.map(|end| end - self.start_time)
    }

    /// Whether the session has a recorded end time
    pub fn is_finalized(&self) -> bool {
        self.end_time.is_some()
    }
}

/// Metadata for one locally stored binary asset (e.g., an audio segment)
///
/// Produced by the local-recording collaborator; consumed only by the
/// packager (metadata) and the uploader (bytes).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetDescriptor {
    /// Client-assigned identifier for the local file
    pub local_file_id: String,
    /// File name on local storage
    pub file_name: String,
    /// File size in bytes
    pub size_bytes: u64,
    /// Recorded duration of the segment in seconds
    pub duration_seconds: u32,
    /// When the segment was captured
    pub captured_at: DateTime<Utc>,
    /// Optional content checksum (SHA-256, lowercase hex)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

/// Server-issued destination for one asset's binary upload
///
/// Targets are single-use: once `expires_at` passes, an upload against the
/// stale URL fails with a non-2xx response and is recorded as an ordinary
/// per-asset failure. No refresh path exists for batch-upload targets.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetUploadTarget {
    /// The local file this target was allocated for
    pub local_file_id: String,
    /// Presigned upload URL
    #[serde(rename = "uploadURL")]
    pub upload_url: String,
    /// When the presigned URL expires
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Object-storage key the asset will land under
    pub storage_key: String,
}

/// Server response to a batch submission: the created job plus one upload
/// target per submitted asset
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadPlan {
    /// Server-side job identifier
    pub job_id: i64,
    /// Upload identifier used for status polling
    pub upload_id: String,
    /// Initial processing status (typically `queued`)
    pub processing_status: ProcessingStatus,
    /// One target per submitted asset, in submission order
    #[serde(default)]
    pub asset_upload_targets: Vec<AssetUploadTarget>,
}

/// Final state of one asset upload attempt
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AttemptState {
    /// Not yet started
    Pending,
    /// Transfer in flight
    Uploading,
    /// Upload completed with a 2xx response
    Succeeded,
    /// Upload failed after the allowed re-attempt
    Failed {
        /// Why the upload failed
        reason: String,
    },
}

impl AttemptState {
    /// Whether the attempt has reached a final per-asset state
    pub fn is_settled(&self) -> bool {
        matches!(self, AttemptState::Succeeded | AttemptState::Failed { .. })
    }
}

/// One asset's upload attempt, owned by the uploader for the duration of the
/// operation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadAttempt {
    /// The local file being uploaded
    pub local_file_id: String,
    /// Current attempt state
    pub state: AttemptState,
}

/// Server-side processing status of a job
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProcessingStatus {
    /// Created but not yet queued
    Pending,
    /// Waiting for a worker
    Queued,
    /// Analysis in progress
    Processing,
    /// Finished successfully
    Completed,
    /// Finished with a server-reported failure
    Failed,
    /// A status string this client version does not know; treated as
    /// still-processing so a new server state never terminates polling early
    Other(String),
}

impl ProcessingStatus {
    /// Whether this status ends the polling loop
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessingStatus::Completed | ProcessingStatus::Failed)
    }

    /// Wire representation of the status
    pub fn as_str(&self) -> &str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Queued => "queued",
            ProcessingStatus::Processing => "processing",
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Failed => "failed",
            ProcessingStatus::Other(s) => s,
        }
    }
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for ProcessingStatus {
    fn from(s: &str) -> Self {
        match s {
            "pending" => ProcessingStatus::Pending,
            "queued" => ProcessingStatus::Queued,
            "processing" => ProcessingStatus::Processing,
            "completed" => ProcessingStatus::Completed,
            "failed" => ProcessingStatus::Failed,
            other => ProcessingStatus::Other(other.to_string()),
        }
    }
}

impl Serialize for ProcessingStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ProcessingStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(ProcessingStatus::from(s.as_str()))
    }
}

/// A snapshot of the remote processing job, as returned by a status poll
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingJob {
    /// Upload identifier this snapshot belongs to
    pub upload_id: String,
    /// Server-side session id; genuinely optional, some responses omit it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<i64>,
    /// Current processing status
    pub processing_status: ProcessingStatus,
    /// Processing progress, 0-100
    pub progress: u8,
    /// Human-readable description of the current processing step
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,
    /// Free-text server message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Whether the analysis report is ready to fetch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_available: Option<bool>,
}

/// Non-terminal stage of an upload operation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStage {
    /// Checking session eligibility locally
    Validating,
    /// Metadata submission in flight
    Submitting,
    /// Binary asset uploads in flight
    UploadingAssets,
    /// Watching the remote job for a terminal status
    Polling,
}

impl OperationStage {
    /// Short human-readable description, suitable for status lines
    pub fn describe(&self) -> &'static str {
        match self {
            OperationStage::Validating => "validating session",
            OperationStage::Submitting => "submitting session metadata",
            OperationStage::UploadingAssets => "uploading assets",
            OperationStage::Polling => "waiting for remote processing",
        }
    }
}

/// Terminal result of one upload operation
#[derive(Clone, Debug, PartialEq)]
pub enum OperationOutcome {
    /// The remote job finished successfully
    Completed(ProcessingJob),
    /// The server explicitly reported job failure
    Failed(ProcessingJob),
    /// The polling budget ran out while the job was still in flight; the job
    /// may yet complete server-side ("still working, check back later")
    Exhausted(Option<ProcessingJob>),
    /// The session was ineligible; no network call was made
    ValidationRejected(ValidationError),
    /// The metadata submission failed; no server state was created, so a
    /// later manual retry is safe
    SubmissionAborted(SubmissionError),
    /// The caller stopped watching; server-side state is not rolled back
    Cancelled,
}

impl OperationOutcome {
    /// The final job snapshot, if the operation got far enough to have one
    pub fn job(&self) -> Option<&ProcessingJob> {
        match self {
            OperationOutcome::Completed(job) | OperationOutcome::Failed(job) => Some(job),
            OperationOutcome::Exhausted(job) => job.as_ref(),
            _ => None,
        }
    }
}

/// Progress event emitted while an upload operation runs
///
/// Events arrive on the channel owned by the operation's
/// [`UploadHandle`](crate::orchestrator::UploadHandle); there is no global
/// broadcast bus.
#[derive(Clone, Debug, PartialEq)]
pub enum ProgressEvent {
    /// The operation moved to a new stage
    StageChanged(OperationStage),
    /// One asset upload attempt settled
    AssetUploaded {
        /// Attempts settled successfully so far
        succeeded: usize,
        /// Attempts settled as failed so far
        failed: usize,
        /// Total assets in the plan
        total: usize,
        /// The attempt that just settled
        attempt: UploadAttempt,
    },
    /// One status poll completed with a job snapshot
    PollTick {
        /// 1-based poll attempt number
        attempt: u32,
        /// The snapshot returned by the server
        job: ProcessingJob,
    },
    /// The operation reached a terminal state
    Finished(OperationOutcome),
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processing_status_round_trips_known_values() {
        for (s, status) in [
            ("pending", ProcessingStatus::Pending),
            ("queued", ProcessingStatus::Queued),
            ("processing", ProcessingStatus::Processing),
            ("completed", ProcessingStatus::Completed),
            ("failed", ProcessingStatus::Failed),
        ] {
            assert_eq!(ProcessingStatus::from(s), status);
            assert_eq!(status.as_str(), s);
        }
    }

    #[test]
    fn unknown_status_is_preserved_and_not_terminal() {
        let status = ProcessingStatus::from("reticulating");
        assert_eq!(
            status,
            ProcessingStatus::Other("reticulating".to_string()),
            "unknown wire statuses must be preserved, not coerced to failed"
        );
        assert!(!status.is_terminal());
    }

    #[test]
    fn processing_job_decodes_without_session_id() {
        let json = r#"{
            "uploadId": "up-1",
            "processingStatus": "processing",
            "progress": 40,
            "currentStep": "audio analysis"
        }"#;
        let job: ProcessingJob = serde_json::from_str(json).unwrap();
        assert_eq!(job.session_id, None);
        assert_eq!(job.processing_status, ProcessingStatus::Processing);
        assert_eq!(job.progress, 40);
    }

    #[test]
    fn upload_target_decodes_server_field_names() {
        let json = r#"{
            "localFileId": "file-1",
            "uploadURL": "https://oss.example.com/bucket/key?sig=abc",
            "expiresAt": "2026-01-01T00:00:00Z",
            "storageKey": "sessions/1/file-1.wav"
        }"#;
        let target: AssetUploadTarget = serde_json::from_str(json).unwrap();
        assert_eq!(target.local_file_id, "file-1");
        assert!(target.upload_url.starts_with("https://oss"));
        assert!(target.expires_at.is_some());
    }

    #[test]
    fn session_duration_requires_end_time() {
        let session = RecordingSession {
            local_id: SessionId::new("s-1"),
            start_time: Utc::now(),
            end_time: None,
            target_duration_minutes: None,
            device_info: None,
            environment: None,
            notes: None,
        };
        assert!(!session.is_finalized());
        assert!(session.duration().is_none());
    }
}
