//! Configuration types for session-uplink

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};

/// API endpoint configuration (metadata submission and status polling)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the session API (e.g., "https://api.example.com/v1")
    pub base_url: String,

    /// Timeout for metadata and status requests (default: 30s)
    #[serde(default = "default_request_timeout")]
    pub request_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            request_timeout: default_request_timeout(),
        }
    }
}

/// Asset upload behavior (concurrency, timeouts, eligibility)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Minimum session duration to be eligible for upload (default: 60s)
    ///
    /// Shorter sessions are rejected locally before any network call.
    #[serde(default = "default_min_session_duration")]
    pub min_session_duration: Duration,

    /// Maximum concurrent asset transfers (default: 3)
    ///
    /// Kept small so uploads don't saturate the device radio.
    #[serde(default = "default_max_concurrent_uploads")]
    pub max_concurrent_uploads: usize,

    /// Timeout for one asset PUT (default: 60s)
    #[serde(default = "default_upload_timeout")]
    pub upload_timeout: Duration,

    /// Content-Type sent with asset PUTs (default: "audio/wav")
    #[serde(default = "default_content_type")]
    pub content_type: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            min_session_duration: default_min_session_duration(),
            max_concurrent_uploads: default_max_concurrent_uploads(),
            upload_timeout: default_upload_timeout(),
            content_type: default_content_type(),
        }
    }
}

/// Processing-status polling behavior
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PollConfig {
    /// Fixed delay between poll cycles (default: 3s, no backoff)
    #[serde(default = "default_poll_interval")]
    pub interval: Duration,

    /// Maximum poll cycles before giving up with `Exhausted` (default: 60,
    /// ≈3 minutes at the default interval)
    ///
    /// Transient poll errors count against this budget too, so total
    /// wall-clock polling time stays bounded.
    #[serde(default = "default_max_poll_attempts")]
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: default_poll_interval(),
            max_attempts: default_max_poll_attempts(),
        }
    }
}

/// Main configuration for [`UploadOrchestrator`](crate::UploadOrchestrator)
///
/// Fields are organized into logical sub-configs:
/// - [`api`](ApiConfig) — endpoints and request timeouts
/// - [`upload`](UploadConfig) — asset transfer behavior and eligibility
/// - [`poll`](PollConfig) — status polling cadence and budget
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// API endpoint settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Asset upload settings
    #[serde(default)]
    pub upload: UploadConfig,

    /// Status polling settings
    #[serde(default)]
    pub poll: PollConfig,

    /// How long to wait for in-flight transfers to abort after cancellation
    /// before reporting `Cancelled` anyway (default: 5s)
    #[serde(default = "default_cancel_grace")]
    pub cancel_grace: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            upload: UploadConfig::default(),
            poll: PollConfig::default(),
            cancel_grace: default_cancel_grace(),
        }
    }
}

impl Config {
    /// Validate the configuration, returning a `Config` error naming the
    /// offending key if any setting is unusable
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.is_empty() {
            return Err(Error::Config {
                message: "base_url must be set".to_string(),
                key: Some("api.base_url".to_string()),
            });
        }
        if url::Url::parse(&self.api.base_url).is_err() {
            return Err(Error::Config {
                message: format!("base_url is not a valid URL: {}", self.api.base_url),
                key: Some("api.base_url".to_string()),
            });
        }
        if self.upload.max_concurrent_uploads == 0 {
            return Err(Error::Config {
                message: "max_concurrent_uploads must be at least 1".to_string(),
                key: Some("upload.max_concurrent_uploads".to_string()),
            });
        }
        if self.upload.content_type.is_empty() {
            return Err(Error::Config {
                message: "content_type must not be empty".to_string(),
                key: Some("upload.content_type".to_string()),
            });
        }
        if self.poll.max_attempts == 0 {
            return Err(Error::Config {
                message: "max_attempts must be at least 1".to_string(),
                key: Some("poll.max_attempts".to_string()),
            });
        }
        Ok(())
    }
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_min_session_duration() -> Duration {
    Duration::from_secs(60)
}

fn default_max_concurrent_uploads() -> usize {
    3
}

fn default_upload_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_content_type() -> String {
    "audio/wav".to_string()
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(3)
}

fn default_max_poll_attempts() -> u32 {
    60
}

fn default_cancel_grace() -> Duration {
    Duration::from_secs(5)
}
