//! Concurrent asset uploads to presigned object-storage targets
//!
//! Each asset is uploaded independently: one asset failing never cancels the
//! others, and a session with zero successful uploads still proceeds to
//! processing (the metadata alone may carry value). Concurrency is bounded
//! by a semaphore so transfers don't saturate the device radio. Each asset
//! gets at most one immediate re-attempt; repeated failure is recorded on
//! the attempt and surfaced only through aggregate progress.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::UploadConfig;
use crate::error::UploadError;
use crate::store::SessionStore;
use crate::types::{AssetUploadTarget, AttemptState, UploadAttempt};

/// Aggregate result of one upload set
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadSummary {
    /// All settled attempts, in settlement order
    pub attempts: Vec<UploadAttempt>,
    /// Number of attempts that succeeded
    pub succeeded: usize,
    /// Number of attempts that failed
    pub failed: usize,
}

impl UploadSummary {
    fn record(&mut self, attempt: &UploadAttempt) {
        match attempt.state {
            AttemptState::Succeeded => self.succeeded += 1,
            AttemptState::Failed { .. } => self.failed += 1,
            _ => {}
        }
    }
}

/// Uploads asset bytes to their server-assigned targets
pub struct AssetUploader {
    client: reqwest::Client,
    max_concurrency: usize,
    upload_timeout: Duration,
    content_type: String,
}

impl AssetUploader {
    /// Create an uploader sharing the orchestrator's HTTP client
    pub fn new(client: reqwest::Client, config: &UploadConfig) -> Self {
        Self {
            client,
            max_concurrency: config.max_concurrent_uploads.max(1),
            upload_timeout: config.upload_timeout,
            content_type: config.content_type.clone(),
        }
    }

    /// Upload every target's asset, settling the whole set
    ///
    /// One settled [`UploadAttempt`] is sent on `progress` per asset.
    /// Returns once every attempt has reached a final state; cancellation
    /// settles the remaining attempts as failed rather than leaving them
    /// pending.
    pub async fn upload_all(
        &self,
        targets: Vec<AssetUploadTarget>,
        store: Arc<dyn SessionStore>,
        progress: mpsc::UnboundedSender<UploadAttempt>,
        cancel: CancellationToken,
    ) -> UploadSummary {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();

        for target in targets {
            let client = self.client.clone();
            let store = store.clone();
            let semaphore = semaphore.clone();
            let cancel = cancel.clone();
            let timeout = self.upload_timeout;
            let content_type = self.content_type.clone();

            tasks.spawn(async move {
                let local_file_id = target.local_file_id.clone();
                let state = upload_one(
                    client,
                    store,
                    semaphore,
                    cancel,
                    target,
                    timeout,
                    content_type,
                )
                .await;
                UploadAttempt {
                    local_file_id,
                    state,
                }
            });
        }

        let mut summary = UploadSummary {
            attempts: Vec::new(),
            succeeded: 0,
            failed: 0,
        };
        while let Some(joined) = tasks.join_next().await {
            let attempt = match joined {
                Ok(attempt) => attempt,
                Err(e) => {
                    tracing::error!(error = %e, "upload task panicked");
                    continue;
                }
            };
            summary.record(&attempt);
            // No receiver just means nobody is watching progress
            progress.send(attempt.clone()).ok();
            summary.attempts.push(attempt);
        }

        tracing::info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            "asset upload set settled"
        );
        summary
    }
}

/// Drive one asset to a settled state: acquire a slot, read bytes, PUT with
/// at most one immediate re-attempt
async fn upload_one(
    client: reqwest::Client,
    store: Arc<dyn SessionStore>,
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
    target: AssetUploadTarget,
    timeout: Duration,
    content_type: String,
) -> AttemptState {
    let cancelled = || AttemptState::Failed {
        reason: "cancelled".to_string(),
    };

    let _permit = tokio::select! {
        _ = cancel.cancelled() => return cancelled(),
        permit = semaphore.acquire_owned() => match permit {
            Ok(permit) => permit,
            Err(_) => return cancelled(),
        },
    };

    if url::Url::parse(&target.upload_url).is_err() {
        let err = UploadError::InvalidTarget(target.upload_url.clone());
        tracing::warn!(local_file_id = %target.local_file_id, error = %err, "asset upload failed");
        return AttemptState::Failed {
            reason: err.to_string(),
        };
    }

    let bytes = match store.read_asset_bytes(&target.local_file_id).await {
        Ok(bytes) => bytes,
        Err(crate::error::Error::AssetNotFound(_)) => {
            let err = UploadError::MissingLocalAsset {
                local_file_id: target.local_file_id.clone(),
            };
            tracing::warn!(local_file_id = %target.local_file_id, error = %err, "asset upload failed");
            return AttemptState::Failed {
                reason: err.to_string(),
            };
        }
        Err(e) => {
            let err = UploadError::Read(e.to_string());
            tracing::warn!(local_file_id = %target.local_file_id, error = %err, "asset upload failed");
            return AttemptState::Failed {
                reason: err.to_string(),
            };
        }
    };

    // Initial attempt plus one immediate re-attempt, nothing more
    for attempt in 1..=2u32 {
        let result = tokio::select! {
            _ = cancel.cancelled() => return cancelled(),
            result = put_once(&client, &target, bytes.clone(), timeout, &content_type) => result,
        };

        match result {
            Ok(()) => {
                tracing::debug!(
                    local_file_id = %target.local_file_id,
                    storage_key = %target.storage_key,
                    size_bytes = bytes.len(),
                    "asset uploaded"
                );
                return AttemptState::Succeeded;
            }
            Err(e) if attempt == 1 => {
                tracing::warn!(
                    local_file_id = %target.local_file_id,
                    error = %e,
                    "asset upload failed, re-attempting once"
                );
            }
            Err(e) => {
                tracing::warn!(
                    local_file_id = %target.local_file_id,
                    storage_key = %target.storage_key,
                    error = %e,
                    "asset upload failed after re-attempt"
                );
                return AttemptState::Failed {
                    reason: e.to_string(),
                };
            }
        }
    }

    // Loop always returns from inside
    AttemptState::Failed {
        reason: "exhausted attempts".to_string(),
    }
}

/// One binary PUT; success is any 2xx, the response body is ignored
///
/// An expired presigned target surfaces here as a non-2xx status and is
/// treated like any other per-asset failure.
async fn put_once(
    client: &reqwest::Client,
    target: &AssetUploadTarget,
    bytes: Vec<u8>,
    timeout: Duration,
    content_type: &str,
) -> Result<(), UploadError> {
    let response = client
        .put(&target.upload_url)
        .header(reqwest::header::CONTENT_TYPE, content_type)
        .timeout(timeout)
        .body(bytes)
        .send()
        .await
        .map_err(|e| UploadError::Transport(e.to_string()))?;

    if response.status().is_success() {
        Ok(())
    } else {
        Err(UploadError::Status {
            code: response.status().as_u16(),
        })
    }
}
