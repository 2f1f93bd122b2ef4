//! Upload orchestration — the state machine driving one session's journey
//! from local record to remote processing result.
//!
//! The orchestrator sequences packaging, metadata submission, bounded-
//! concurrency asset uploads, and status polling, and exposes a single
//! typed progress channel per operation:
//! - [`handle`] - the caller-facing [`UploadHandle`] / [`CancelHandle`]
//! - [`run`] - the per-operation state machine
//!
//! An orchestrator is an explicitly constructed, injectable instance with no
//! process-wide state; it owns the in-flight guard that rejects a second
//! concurrent operation for the same session.

mod handle;
mod run;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use handle::{CancelHandle, UploadHandle};

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

use crate::auth::CredentialSupplier;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::store::SessionStore;
use crate::types::{ProgressEvent, SessionId};

/// Drives session batch uploads end to end (cloneable - all fields are
/// Arc-wrapped)
///
/// One instance serves many sessions, but at most one operation per session
/// id runs at a time; a second concurrent `start` for the same session is
/// rejected rather than interleaved.
#[derive(Clone)]
pub struct UploadOrchestrator {
    config: Arc<Config>,
    store: Arc<dyn SessionStore>,
    credentials: Arc<dyn CredentialSupplier>,
    /// Shared HTTP client for submission, asset PUTs, and polling
    client: reqwest::Client,
    /// Map of in-flight operations to their cancellation tokens
    active: Arc<Mutex<HashMap<SessionId, CancellationToken>>>,
}

impl UploadOrchestrator {
    /// Create an orchestrator over the given store and credential supplier
    ///
    /// Validates the configuration up front so a misconfigured instance
    /// never gets as far as a network call.
    pub fn new(
        config: Config,
        store: Arc<dyn SessionStore>,
        credentials: Arc<dyn CredentialSupplier>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            store,
            credentials,
            client: reqwest::Client::new(),
            active: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Start an upload operation for a locally stored session
    ///
    /// Loads the session and its asset list from the store, registers the
    /// operation in the in-flight guard, and spawns the state machine. The
    /// returned [`UploadHandle`] owns the progress event channel and the
    /// cancellation token; dropping it does not cancel the operation.
    ///
    /// # Errors
    ///
    /// - [`Error::SessionNotFound`] if the store has no such session
    /// - [`Error::OperationInProgress`] if an operation for this session is
    ///   already running
    pub async fn start(&self, session_id: SessionId) -> Result<UploadHandle> {
        let session = self
            .store
            .session(&session_id)
            .await?
            .ok_or_else(|| Error::SessionNotFound(session_id.clone()))?;
        let assets = self.store.assets_for_session(&session_id).await?;

        let cancel = CancellationToken::new();
        {
            let mut active = self.active.lock().await;
            if active.contains_key(&session_id) {
                return Err(Error::OperationInProgress(session_id));
            }
            active.insert(session_id.clone(), cancel.clone());
        }

        tracing::info!(
            session_id = %session_id,
            assets = assets.len(),
            "starting upload operation"
        );

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let ctx = run::OperationContext {
            config: self.config.clone(),
            store: self.store.clone(),
            credentials: self.credentials.clone(),
            client: self.client.clone(),
            session,
            assets,
            cancel: cancel.clone(),
            events: events_tx.clone(),
        };

        let active = self.active.clone();
        let guard_id = session_id.clone();
        let task = tokio::spawn(async move {
            let outcome = run::run(ctx).await;
            // The task itself releases the guard on every exit path, so a
            // follow-up start is accepted only after this operation has
            // actually wound down
            active.lock().await.remove(&guard_id);
            events_tx
                .send(ProgressEvent::Finished(outcome.clone()))
                .ok();
            outcome
        });

        Ok(UploadHandle::new(session_id, events_rx, cancel, task))
    }

    /// Whether an operation is currently in flight for this session
    pub async fn is_active(&self, session_id: &SessionId) -> bool {
        self.active.lock().await.contains_key(session_id)
    }

    /// Cancel an in-flight operation by session id
    ///
    /// Returns true if an operation was found and signalled. This is a
    /// client-side "stop watching": already-uploaded assets and an
    /// already-created job are not rolled back.
    pub async fn cancel(&self, session_id: &SessionId) -> bool {
        let active = self.active.lock().await;
        match active.get(session_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}
