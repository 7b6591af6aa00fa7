//! Relay shutdown: one cancellation signal for the listener and every
//! session, plus a tracker so shutdown can wait for sessions to send their
//! close frames.
//!
//! Upgraded sockets run on tasks axum detaches from the serve loop, so
//! stopping the listener alone does not wait for them.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::task_tracker::TrackedFuture;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

/// Drain timeout when none is configured.
const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Stops the listener and drains live sessions.
///
/// Sessions watch [`ShutdownCoordinator::token`] and close with code 1001
/// when it fires; [`ShutdownCoordinator::graceful_shutdown`] returns once
/// all of them have finished or the drain timeout passes.
pub struct ShutdownCoordinator {
    token: CancellationToken,
    sessions: TaskTracker,
}

impl ShutdownCoordinator {
    /// Create a coordinator with no sessions.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            sessions: TaskTracker::new(),
        }
    }

    /// Signal that sessions and the listener watch.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Wrap a session future so shutdown waits for it.
    pub fn track_session<F>(&self, session: F) -> TrackedFuture<F>
    where
        F: Future<Output = ()>,
    {
        self.sessions.track_future(session)
    }

    /// Sessions that have not finished yet.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Fire the shutdown signal without waiting.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether the shutdown signal has fired.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Fire the signal, then wait up to `timeout` for the listener task and
    /// every tracked session to finish.
    pub async fn graceful_shutdown(&self, listener: JoinHandle<()>, timeout: Option<Duration>) {
        let timeout = timeout.unwrap_or(DEFAULT_DRAIN_TIMEOUT);

        self.shutdown();
        let _ = self.sessions.close();
        info!(
            sessions = self.sessions.len(),
            timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            "draining sessions"
        );

        let drain = async {
            if let Err(e) = listener.await {
                warn!(error = %e, "listener task failed");
            }
            self.sessions.wait().await;
        };

        if tokio::time::timeout(timeout, drain).await.is_err() {
            warn!(
                remaining = self.sessions.len(),
                "shutdown timed out after {timeout:?}, abandoning sessions"
            );
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
