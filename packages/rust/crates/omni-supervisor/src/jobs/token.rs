//! Per-job cancellation token with optional deadline.
//!
//! The observed token is a child of a base token: manual cancel trips the
//! base, deadline expiry and driver completion trip the child. Observers only
//! ever watch the child, so every cause surfaces as the same "finished" signal.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// First cause that stopped a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// `cancel()` was called.
    Cancelled,
    /// The deadline elapsed.
    DeadlineExceeded,
    /// The driver returned on its own.
    Finished,
}

/// Cancellation token owned by one worker.
#[derive(Debug, Clone)]
pub struct JobToken {
    base: CancellationToken,
    token: CancellationToken,
    deadline: Option<Instant>,
    reason: Arc<OnceLock<StopReason>>,
}

impl Default for JobToken {
    fn default() -> Self {
        Self::new()
    }
}

impl JobToken {
    /// Plain token, stopped only by `cancel()` or driver completion.
    pub fn new() -> Self {
        let base = CancellationToken::new();
        let token = base.child_token();
        Self {
            base,
            token,
            deadline: None,
            reason: Arc::new(OnceLock::new()),
        }
    }

    /// Token that stops by itself once `timeout` elapses.
    ///
    /// Must be called from within a tokio runtime: the deadline is armed by a
    /// background timer task that exits early if the token stops first. A
    /// timeout past the clock's range yields a token without deadline.
    pub fn with_timeout(timeout: Duration) -> Self {
        let mut job_token = Self::new();
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            tracing::warn!(?timeout, "deadline out of range; token has no deadline");
            return job_token;
        };
        job_token.deadline = Some(deadline);

        let timer = job_token.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = tokio::time::sleep_until(deadline) => timer.stop(StopReason::DeadlineExceeded),
                () = timer.token.cancelled() => {}
            }
        });
        job_token
    }

    /// Cancel the job. Idempotent.
    pub fn cancel(&self) {
        self.record(StopReason::Cancelled);
        self.base.cancel();
    }

    /// Mark the driver as done.
    pub(crate) fn finish(&self) {
        self.stop(StopReason::Finished);
    }

    fn stop(&self, reason: StopReason) {
        self.record(reason);
        self.token.cancel();
    }

    // Reason is recorded before the token trips so observers never see a
    // finished token without a reason.
    fn record(&self, reason: StopReason) {
        let _ = self.reason.set(reason);
    }

    /// Whether the token is cancelled, expired or finished.
    pub fn is_finished(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the token is finished.
    pub async fn finished(&self) {
        self.token.cancelled().await;
    }

    /// Why the token stopped; `None` while live.
    pub fn reason(&self) -> Option<StopReason> {
        if self.is_finished() {
            self.reason.get().copied()
        } else {
            None
        }
    }

    /// Deadline, when the token was created with a timeout.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Plain `CancellationToken` tripped together with this token, for
    /// drivers handing cancellation to other libraries.
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }
}
