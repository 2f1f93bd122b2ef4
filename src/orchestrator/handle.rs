//! Caller-facing handle for one upload operation.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::types::{OperationOutcome, ProgressEvent, SessionId};

/// Handle to a running upload operation
///
/// Owns the operation's progress channel and cancellation token. Progress
/// events arrive in order and end with [`ProgressEvent::Finished`]; the same
/// terminal outcome is returned by [`wait`](Self::wait). Dropping the handle
/// stops watching but does not cancel the operation.
pub struct UploadHandle {
    session_id: SessionId,
    events: mpsc::UnboundedReceiver<ProgressEvent>,
    cancel: CancellationToken,
    task: JoinHandle<OperationOutcome>,
}

impl UploadHandle {
    pub(super) fn new(
        session_id: SessionId,
        events: mpsc::UnboundedReceiver<ProgressEvent>,
        cancel: CancellationToken,
        task: JoinHandle<OperationOutcome>,
    ) -> Self {
        Self {
            session_id,
            events,
            cancel,
            task,
        }
    }

    /// The session this operation is uploading
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Receive the next progress event
    ///
    /// Returns None once the channel is drained after the operation
    /// finished.
    pub async fn next_event(&mut self) -> Option<ProgressEvent> {
        self.events.recv().await
    }

    /// Signal cancellation
    ///
    /// In-flight transfers abort per the transport's cancellation support
    /// and the operation reports `Cancelled` within the configured grace
    /// period. Server-side state is not rolled back.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A cloneable cancellation handle usable from another task
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            token: self.cancel.clone(),
        }
    }

    /// Wait for the operation's terminal outcome, consuming the handle
    ///
    /// Any undrained progress events are discarded.
    pub async fn wait(self) -> OperationOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(session_id = %self.session_id, error = %e, "operation task aborted");
                OperationOutcome::Cancelled
            }
        }
    }

    /// Split the handle into a progress event stream and a cancel handle
    ///
    /// The terminal outcome still arrives on the stream as
    /// [`ProgressEvent::Finished`].
    pub fn into_event_stream(self) -> (UnboundedReceiverStream<ProgressEvent>, CancelHandle) {
        let cancel = CancelHandle {
            token: self.cancel.clone(),
        };
        (UnboundedReceiverStream::new(self.events), cancel)
    }
}

/// Cloneable cancellation handle for an upload operation
#[derive(Clone)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    /// Signal cancellation of the operation this handle belongs to
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether cancellation has been signalled
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}
