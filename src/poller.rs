//! Processing-status polling
//!
//! One outstanding request at a time: job state is a single server-side
//! resource, so concurrent polls add nothing. The interval is fixed (no
//! backoff) and the attempt budget bounds total wall-clock time. A transient
//! transport error does not terminate polling; it is logged, swallowed, and
//! counted against the same budget, so a flapping network can never extend
//! the wait.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::auth::CredentialSupplier;
use crate::config::{ApiConfig, PollConfig};
use crate::error::{Error, IsRetryable};
use crate::types::{ProcessingJob, ProcessingStatus};

/// One successful poll cycle's result
#[derive(Clone, Debug, PartialEq)]
pub struct PollSnapshot {
    /// 1-based poll attempt number
    pub attempt: u32,
    /// The job snapshot the server returned
    pub job: ProcessingJob,
}

/// How a polling run ended
#[derive(Clone, Debug, PartialEq)]
pub enum PollOutcome {
    /// Server reported the job completed
    Completed(ProcessingJob),
    /// Server explicitly reported the job failed
    Failed(ProcessingJob),
    /// Budget consumed without a terminal status; the job may still be
    /// processing server-side
    Exhausted(Option<ProcessingJob>),
    /// Polling was cancelled by the caller
    Cancelled(Option<ProcessingJob>),
}

/// Polls a job's processing status until terminal or out of budget
pub struct ProcessingStatusPoller {
    client: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
    interval: Duration,
    max_attempts: u32,
    credentials: Arc<dyn CredentialSupplier>,
}

impl ProcessingStatusPoller {
    /// Create a poller sharing the orchestrator's HTTP client
    pub fn new(
        client: reqwest::Client,
        api: &ApiConfig,
        poll: &PollConfig,
        credentials: Arc<dyn CredentialSupplier>,
    ) -> Self {
        Self {
            client,
            base_url: api.base_url.clone(),
            request_timeout: api.request_timeout,
            interval: poll.interval,
            max_attempts: poll.max_attempts,
            credentials,
        }
    }

    fn endpoint(&self, upload_id: &str) -> String {
        format!(
            "{}/sessions/processing-status/{}",
            self.base_url.trim_end_matches('/'),
            upload_id
        )
    }

    /// Run the polling loop for one job
    ///
    /// Sends one [`PollSnapshot`] per successful poll (including the
    /// terminal one). Waits one interval before the first poll, matching the
    /// server's minimum turnaround for a freshly created job.
    pub async fn poll(
        &self,
        upload_id: &str,
        cancel: &CancellationToken,
        snapshots: mpsc::UnboundedSender<PollSnapshot>,
    ) -> PollOutcome {
        let mut last: Option<ProcessingJob> = None;

        for attempt in 1..=self.max_attempts {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!(upload_id, attempt, "polling cancelled");
                    return PollOutcome::Cancelled(last);
                }
                _ = tokio::time::sleep(self.interval) => {}
            }

            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!(upload_id, attempt, "polling cancelled");
                    return PollOutcome::Cancelled(last);
                }
                result = self.fetch_status(upload_id) => result,
            };

            let job = match result {
                Ok(job) => job,
                Err(e) => {
                    // Swallowed either way; the budget bounds how long a
                    // broken connection can keep us here
                    if e.is_retryable() {
                        tracing::warn!(
                            upload_id,
                            attempt,
                            max_attempts = self.max_attempts,
                            error = %e,
                            "transient poll failure, retrying next interval"
                        );
                    } else {
                        tracing::error!(upload_id, attempt, error = %e, "poll failure");
                    }
                    continue;
                }
            };

            tracing::debug!(
                upload_id,
                attempt,
                status = %job.processing_status,
                progress = job.progress,
                current_step = job.current_step.as_deref().unwrap_or(""),
                "poll snapshot"
            );
            snapshots
                .send(PollSnapshot {
                    attempt,
                    job: job.clone(),
                })
                .ok();

            match job.processing_status {
                ProcessingStatus::Completed => {
                    tracing::info!(upload_id, attempt, "remote processing completed");
                    return PollOutcome::Completed(job);
                }
                ProcessingStatus::Failed => {
                    tracing::warn!(
                        upload_id,
                        attempt,
                        message = job.message.as_deref().unwrap_or(""),
                        "remote processing failed"
                    );
                    return PollOutcome::Failed(job);
                }
                _ => last = Some(job),
            }
        }

        tracing::warn!(
            upload_id,
            max_attempts = self.max_attempts,
            "poll budget exhausted, job still in flight"
        );
        PollOutcome::Exhausted(last)
    }

    async fn fetch_status(&self, upload_id: &str) -> Result<ProcessingJob, Error> {
        let mut request = self
            .client
            .get(self.endpoint(upload_id))
            .timeout(self.request_timeout);

        if let Some(token) = self.credentials.bearer_token().await {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Other(format!(
                "status poll returned {}",
                status.as_u16()
            )));
        }
        Ok(response.json().await?)
    }
}
