//! The watch loop feeding the reconciler.
//!
//! One watcher owns the remote event stream and consumes it in delivery
//! order; event ordering is load-bearing and there is deliberately no
//! parallel consumption. The loop lifecycle is an explicit state machine:
//!
//! ```text
//! Connecting -> Streaming -> Stopped
//! ```
//!
//! `Stopped` is terminal. The watcher never reconnects on its own; the
//! process supervisor decides whether and when to start a fresh watcher.

use std::sync::{Arc, Mutex};

use futures::StreamExt;

use crate::reconcile::JobReconciler;
use crate::remote::OrchestratorClient;

/// Lifecycle state of the watch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    /// Opening the remote event stream.
    Connecting,
    /// Consuming events in delivery order.
    Streaming,
    /// The stream ended or failed; a new watcher must be started externally.
    Stopped,
}

impl std::fmt::Display for WatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connecting => write!(f, "CONNECTING"),
            Self::Streaming => write!(f, "STREAMING"),
            Self::Stopped => write!(f, "STOPPED"),
        }
    }
}

/// Single ordered consumer of the remote job event stream.
pub struct JobWatcher {
    orchestrator: Arc<dyn OrchestratorClient>,
    reconciler: Arc<JobReconciler>,
    state: Mutex<WatchState>,
}

impl JobWatcher {
    /// Creates a watcher in the `Connecting` state.
    #[must_use]
    pub fn new(orchestrator: Arc<dyn OrchestratorClient>, reconciler: Arc<JobReconciler>) -> Self {
        Self {
            orchestrator,
            reconciler,
            state: Mutex::new(WatchState::Connecting),
        }
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> WatchState {
        *self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Runs the watch loop until the stream ends or fails.
    ///
    /// Per-event reconcile errors are logged and skipped; the stream keeps
    /// flowing. A transport error item or the end of the stream stops the
    /// loop. Always returns [`WatchState::Stopped`].
    pub async fn run(&self) -> WatchState {
        let mut stream = match self.orchestrator.watch_jobs().await {
            Ok(stream) => {
                self.transition(WatchState::Streaming);
                stream
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to open the job event stream");
                self.transition(WatchState::Stopped);
                return WatchState::Stopped;
            }
        };

        while let Some(item) = stream.next().await {
            match item {
                Ok(event) => {
                    if let Err(err) = self.reconciler.handle_event(&event).await {
                        // One bad event must not take the stream down.
                        tracing::error!(
                            job_id = %event.job_id,
                            kind = %event.kind,
                            error = %err,
                            "failed to reconcile event, skipping"
                        );
                    }
                }
                Err(err) => {
                    tracing::error!(error = %err, "job event stream failed");
                    break;
                }
            }
        }
        self.transition(WatchState::Stopped);
        WatchState::Stopped
    }

    fn transition(&self, next: WatchState) {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        tracing::info!(from = %*state, to = %next, "watch state transition");
        *state = next;
    }
}
