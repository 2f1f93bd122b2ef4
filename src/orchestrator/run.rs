//! The per-operation state machine.
//!
//! `Validating → Submitting → UploadingAssets → Polling → terminal`.
//! Ordering guarantees: submission completes before any asset upload begins
//! (targets are a precondition), and polling begins only after the upload
//! set has settled. Cancellation can interrupt any stage; the operation
//! reports `Cancelled` within the configured grace period even if a
//! transfer refuses to abort.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::asset_uploader::AssetUploader;
use crate::auth::CredentialSupplier;
use crate::config::Config;
use crate::packager::SessionPackager;
use crate::poller::{PollOutcome, ProcessingStatusPoller};
use crate::store::SessionStore;
use crate::submission::BatchSubmissionClient;
use crate::types::{
    AssetDescriptor, AttemptState, OperationOutcome, OperationStage, ProgressEvent,
    RecordingSession,
};

/// Everything one operation needs, moved into its task at spawn time
pub(super) struct OperationContext {
    pub(super) config: Arc<Config>,
    pub(super) store: Arc<dyn SessionStore>,
    pub(super) credentials: Arc<dyn CredentialSupplier>,
    pub(super) client: reqwest::Client,
    pub(super) session: RecordingSession,
    pub(super) assets: Vec<AssetDescriptor>,
    pub(super) cancel: CancellationToken,
    pub(super) events: mpsc::UnboundedSender<ProgressEvent>,
}

impl OperationContext {
    fn emit(&self, event: ProgressEvent) {
        // No receiver just means nobody is watching progress
        self.events.send(event).ok();
    }

    fn stage(&self, stage: OperationStage) {
        tracing::debug!(
            session_id = %self.session.local_id,
            stage = stage.describe(),
            "operation stage change"
        );
        self.emit(ProgressEvent::StageChanged(stage));
    }
}

/// Drive one operation to a terminal outcome
pub(super) async fn run(ctx: OperationContext) -> OperationOutcome {
    let session_id = ctx.session.local_id.clone();

    // Validating: local eligibility only, no network side effect
    ctx.stage(OperationStage::Validating);
    let packager = SessionPackager::new(ctx.config.upload.min_session_duration);
    let request = match packager.package(&ctx.session, &ctx.assets) {
        Ok(request) => request,
        Err(e) => {
            tracing::info!(session_id = %session_id, error = %e, "session rejected locally");
            return OperationOutcome::ValidationRejected(e);
        }
    };

    if ctx.cancel.is_cancelled() {
        return OperationOutcome::Cancelled;
    }

    // Submitting: one metadata POST creates the job and the upload plan
    ctx.stage(OperationStage::Submitting);
    let submission = BatchSubmissionClient::new(
        ctx.client.clone(),
        &ctx.config.api.base_url,
        ctx.config.api.request_timeout,
        ctx.credentials.clone(),
    );
    let plan = tokio::select! {
        _ = ctx.cancel.cancelled() => return OperationOutcome::Cancelled,
        result = submission.submit(&request) => match result {
            Ok(plan) => plan,
            Err(e) => {
                tracing::error!(session_id = %session_id, error = %e, "submission aborted");
                return OperationOutcome::SubmissionAborted(e);
            }
        },
    };
    let upload_id = plan.upload_id.clone();

    // UploadingAssets: the set settles (every attempt succeeds or fails)
    // before polling starts; failures degrade the job's input, nothing more
    ctx.stage(OperationStage::UploadingAssets);
    let uploader = AssetUploader::new(ctx.client.clone(), &ctx.config.upload);
    let total = plan.asset_upload_targets.len();
    let (attempt_tx, mut attempt_rx) = mpsc::unbounded_channel();
    let upload_fut = uploader.upload_all(
        plan.asset_upload_targets.clone(),
        ctx.store.clone(),
        attempt_tx,
        ctx.cancel.clone(),
    );
    tokio::pin!(upload_fut);

    let graceful_cancel = async {
        ctx.cancel.cancelled().await;
        tokio::time::sleep(ctx.config.cancel_grace).await;
    };
    tokio::pin!(graceful_cancel);

    let mut succeeded = 0usize;
    let mut failed = 0usize;
    let forward_attempt = |attempt: crate::types::UploadAttempt,
                           succeeded: &mut usize,
                           failed: &mut usize| {
        match attempt.state {
            AttemptState::Succeeded => *succeeded += 1,
            AttemptState::Failed { .. } => *failed += 1,
            _ => {}
        }
        ctx.emit(ProgressEvent::AssetUploaded {
            succeeded: *succeeded,
            failed: *failed,
            total,
            attempt,
        });
    };

    let summary = loop {
        tokio::select! {
            _ = &mut graceful_cancel => {
                tracing::warn!(
                    session_id = %session_id,
                    upload_id = %upload_id,
                    "cancellation grace period expired with transfers still in flight"
                );
                return OperationOutcome::Cancelled;
            }
            summary = &mut upload_fut => break summary,
            Some(attempt) = attempt_rx.recv() => {
                forward_attempt(attempt, &mut succeeded, &mut failed);
            }
        }
    };
    while let Ok(attempt) = attempt_rx.try_recv() {
        forward_attempt(attempt, &mut succeeded, &mut failed);
    }

    if ctx.cancel.is_cancelled() {
        return OperationOutcome::Cancelled;
    }

    tracing::info!(
        session_id = %session_id,
        upload_id = %upload_id,
        succeeded = summary.succeeded,
        failed = summary.failed,
        "asset uploads settled, watching remote processing"
    );

    // Polling: strictly sequential, bounded by the attempt budget
    ctx.stage(OperationStage::Polling);
    let poller = ProcessingStatusPoller::new(
        ctx.client.clone(),
        &ctx.config.api,
        &ctx.config.poll,
        ctx.credentials.clone(),
    );
    let (snapshot_tx, mut snapshot_rx) = mpsc::unbounded_channel();
    let poll_fut = poller.poll(&upload_id, &ctx.cancel, snapshot_tx);
    tokio::pin!(poll_fut);

    let outcome = loop {
        tokio::select! {
            outcome = &mut poll_fut => break outcome,
            Some(snapshot) = snapshot_rx.recv() => {
                ctx.emit(ProgressEvent::PollTick {
                    attempt: snapshot.attempt,
                    job: snapshot.job,
                });
            }
        }
    };
    while let Ok(snapshot) = snapshot_rx.try_recv() {
        ctx.emit(ProgressEvent::PollTick {
            attempt: snapshot.attempt,
            job: snapshot.job,
        });
    }

    match outcome {
        PollOutcome::Completed(job) => OperationOutcome::Completed(job),
        PollOutcome::Failed(job) => OperationOutcome::Failed(job),
        PollOutcome::Exhausted(last) => OperationOutcome::Exhausted(last),
        PollOutcome::Cancelled(_) => OperationOutcome::Cancelled,
    }
}
