//! Session packaging — local session to wire-format batch submission
//!
//! Pure transformation, no I/O. Eligibility is checked here so ineligible
//! sessions are rejected before any network call happens: a session must be
//! finalized (end time recorded) and at least the configured minimum
//! duration long.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

use crate::error::ValidationError;
use crate::types::{AssetDescriptor, DeviceInfo, EnvironmentData, RecordingSession};

/// Wire shape of the metadata submission request
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSubmissionRequest {
    /// Session metadata
    pub session: SessionPayload,
    /// One entry per locally stored asset, in local recording order
    pub assets: Vec<AssetPayload>,
}

/// Session portion of the submission request
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPayload {
    /// Client-assigned session identifier
    pub local_session_id: String,
    /// Recording start, RFC 3339
    pub start_time: DateTime<Utc>,
    /// Recording end, RFC 3339
    pub end_time: DateTime<Utc>,
    /// Target duration in minutes, if set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_duration: Option<u32>,
    /// Device snapshot taken at packaging time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_info: Option<DevicePayload>,
    /// Ambient environment readings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment_data: Option<EnvironmentData>,
    /// Free-text user notes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Device metadata with a packaging-time snapshot timestamp
///
/// The snapshot timestamp is the only non-deterministic field in the whole
/// request; it describes the device, never the session identity.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DevicePayload {
    /// Device model identifier
    pub device_type: String,
    /// Application version string
    pub app_version: String,
    /// Operating system version string
    pub os_version: String,
    /// Opaque per-device identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    /// When this snapshot was taken
    pub snapshot_at: DateTime<Utc>,
}

/// Asset portion of the submission request
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetPayload {
    /// Client-assigned identifier for the local file
    pub local_file_id: String,
    /// File name on local storage
    pub file_name: String,
    /// File size in bytes
    pub size_bytes: u64,
    /// Recorded duration in seconds
    pub duration_seconds: u32,
    /// When the segment was captured, RFC 3339
    pub captured_at: DateTime<Utc>,
    /// Content checksum, if the store computed one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

/// Packages a finalized session and its asset list into a submission request
///
/// Identifiers are never assigned here; the server mints `jobId` and
/// `uploadId` in its response.
pub struct SessionPackager {
    min_duration: Duration,
}

impl SessionPackager {
    /// Create a packager with the given minimum eligible session duration
    pub fn new(min_duration: Duration) -> Self {
        Self { min_duration }
    }

    /// Map a session and its assets into the wire request, or reject it
    ///
    /// Rejection happens for unfinished sessions and sessions shorter than
    /// the minimum duration. Deterministic apart from the device snapshot
    /// timestamp.
    pub fn package(
        &self,
        session: &RecordingSession,
        assets: &[AssetDescriptor],
    ) -> Result<BatchSubmissionRequest, ValidationError> {
        let Some(end_time) = session.end_time else {
            return Err(ValidationError::NotFinalized {
                id: session.local_id.clone(),
            });
        };

        let actual_seconds = (end_time - session.start_time).num_seconds();
        let required_seconds = self.min_duration.as_secs() as i64;
        if actual_seconds < required_seconds {
            return Err(ValidationError::SessionTooShort {
                id: session.local_id.clone(),
                actual_seconds,
                required_seconds,
            });
        }

        let device_info = session.device_info.as_ref().map(Self::device_payload);

        Ok(BatchSubmissionRequest {
            session: SessionPayload {
                local_session_id: session.local_id.as_str().to_string(),
                start_time: session.start_time,
                end_time,
                target_duration: session.target_duration_minutes,
                device_info,
                environment_data: session.environment.clone(),
                notes: session.notes.clone(),
            },
            assets: assets
                .iter()
                .map(|asset| AssetPayload {
                    local_file_id: asset.local_file_id.clone(),
                    file_name: asset.file_name.clone(),
                    size_bytes: asset.size_bytes,
                    duration_seconds: asset.duration_seconds,
                    captured_at: asset.captured_at,
                    checksum: asset.checksum.clone(),
                })
                .collect(),
        })
    }

    fn device_payload(info: &DeviceInfo) -> DevicePayload {
        DevicePayload {
            device_type: info.device_type.clone(),
            app_version: info.app_version.clone(),
            os_version: info.os_version.clone(),
            device_id: info.device_id.clone(),
            snapshot_at: Utc::now(),
        }
    }
}
