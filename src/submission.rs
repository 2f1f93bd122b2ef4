//! Batch metadata submission
//!
//! One POST creates the server-side job and allocates one presigned upload
//! target per submitted asset. Any failure here is fatal for the operation:
//! without a plan there is nothing to upload against and nothing to poll.

use std::sync::Arc;
use std::time::Duration;

use crate::auth::CredentialSupplier;
use crate::error::SubmissionError;
use crate::packager::BatchSubmissionRequest;
use crate::types::UploadPlan;

/// Client for the batch-upload metadata endpoint
///
/// Stateless request/response; mutates nothing locally.
pub struct BatchSubmissionClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    credentials: Arc<dyn CredentialSupplier>,
}

impl BatchSubmissionClient {
    /// Create a submission client sharing the orchestrator's HTTP client
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        timeout: Duration,
        credentials: Arc<dyn CredentialSupplier>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            timeout,
            credentials,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/sessions/batch-upload",
            self.base_url.trim_end_matches('/')
        )
    }

    /// Submit the packaged request and validate the returned plan
    ///
    /// On success the plan is checked for the one-target-per-asset
    /// invariant; a count mismatch is fatal because asset association would
    /// be ambiguous.
    pub async fn submit(
        &self,
        request: &BatchSubmissionRequest,
    ) -> Result<UploadPlan, SubmissionError> {
        let session_id = request.session.local_session_id.as_str();
        tracing::debug!(
            session_id,
            assets = request.assets.len(),
            "submitting session batch"
        );

        let mut http_request = self
            .client
            .post(self.endpoint())
            .json(request)
            .timeout(self.timeout);

        if let Some(token) = self.credentials.bearer_token().await {
            http_request = http_request.bearer_auth(token);
        }

        let response = http_request
            .send()
            .await
            .map_err(|e| SubmissionError::Transport {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(session_id, code = status.as_u16(), "submission rejected");
            return Err(SubmissionError::Status {
                code: status.as_u16(),
                body,
            });
        }

        let plan: UploadPlan =
            response
                .json()
                .await
                .map_err(|e| SubmissionError::Decode {
                    message: e.to_string(),
                })?;

        if plan.asset_upload_targets.len() != request.assets.len() {
            tracing::error!(
                session_id,
                upload_id = %plan.upload_id,
                submitted = request.assets.len(),
                returned = plan.asset_upload_targets.len(),
                "upload plan does not cover submitted assets"
            );
            return Err(SubmissionError::PlanMismatch {
                submitted: request.assets.len(),
                returned: plan.asset_upload_targets.len(),
            });
        }

        tracing::info!(
            session_id,
            job_id = plan.job_id,
            upload_id = %plan.upload_id,
            targets = plan.asset_upload_targets.len(),
            "session batch submitted"
        );
        Ok(plan)
    }
}
