use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot, watch};

use crate::jobs::token::{JobToken, StopReason};
use crate::jobs::types::{JobRecord, JobState};

use super::{DriverOutcome, Query};

/// Owner of a job's authoritative record.
///
/// Sits between the freely running driver and synchronous callers: absorbs
/// driver snapshots, writes the terminal transition when the token trips, and
/// answers queries. Never spins; every iteration waits for one of the three
/// events.
pub(super) struct Bridge {
    record: JobRecord,
    token: JobToken,
    sync: watch::Receiver<JobRecord>,
    sync_closed: bool,
    outcome_rx: Option<oneshot::Receiver<DriverOutcome>>,
    outcome: Option<DriverOutcome>,
    queries: mpsc::Receiver<Query>,
    final_snapshot: Arc<OnceLock<JobRecord>>,
    last_served: DateTime<Utc>,
}

impl Bridge {
    pub(super) fn new(
        record: JobRecord,
        token: JobToken,
        sync: watch::Receiver<JobRecord>,
        outcome_rx: oneshot::Receiver<DriverOutcome>,
        queries: mpsc::Receiver<Query>,
        final_snapshot: Arc<OnceLock<JobRecord>>,
    ) -> Self {
        let last_served = record.progress.started;
        Self {
            record,
            token,
            sync,
            sync_closed: false,
            outcome_rx: Some(outcome_rx),
            outcome: None,
            queries,
            final_snapshot,
            last_served,
        }
    }

    pub(super) async fn run(mut self) {
        loop {
            tokio::select! {
                // Snapshots first: a query never overtakes an update published before it.
                biased;

                changed = self.sync.changed(), if !self.sync_closed => match changed {
                    Ok(()) => {
                        let latest = self.sync.borrow_and_update().clone();
                        self.absorb(latest);
                    }
                    Err(_) => self.sync_closed = true,
                },
                () = self.token.finished(), if !self.record.state.is_terminal() => {
                    self.finalize();
                }
                query = self.queries.recv() => {
                    let Some(reply) = query else {
                        tracing::debug!("all worker handles dropped; bridge stopping");
                        break;
                    };
                    if self.answer(reply) {
                        tracing::debug!(state = %self.record.state, "final snapshot served; bridge stopping");
                        break;
                    }
                }
            }
        }
    }

    /// Serve one query; returns `true` when this was the final answer.
    fn answer(&mut self, reply: Query) -> bool {
        self.absorb_latest();
        let finished = self.token.is_finished();
        if finished {
            self.finalize();
        }

        let now = self.now();
        self.last_served = now;
        self.record.progress.refresh(now);
        let snapshot = self.record.clone();

        if finished {
            let _ = self.final_snapshot.set(snapshot.clone());
        }
        if reply.send(snapshot).is_err() {
            tracing::debug!("caller went away before the reply");
        }
        finished
    }

    fn absorb_latest(&mut self) {
        match self.sync.has_changed() {
            Ok(true) => {}
            Ok(false) => return,
            // Closed: the last value may still be unseen; read it once.
            Err(_) if self.sync_closed => return,
            Err(_) => self.sync_closed = true,
        }
        let latest = self.sync.borrow_and_update().clone();
        self.absorb(latest);
    }

    fn absorb(&mut self, mut latest: JobRecord) {
        if self.record.state.is_terminal() {
            return;
        }
        latest.progress.started = self.record.progress.started;
        if latest.state.is_terminal() {
            let completed = latest
                .progress
                .completed
                .unwrap_or_else(Utc::now)
                .max(self.last_served);
            latest.progress.completed = Some(completed);
            tracing::debug!(state = %latest.state, "driver reported terminal state");
        } else {
            latest.progress.completed = None;
        }
        self.record = latest;
    }

    /// Write the terminal transition for a finished token.
    fn finalize(&mut self) {
        self.absorb_latest();
        self.take_outcome();
        if self.record.state.is_terminal() {
            return;
        }

        let state = match self.token.reason() {
            Some(StopReason::Cancelled) => JobState::Cancelled,
            Some(StopReason::DeadlineExceeded) => JobState::TimedOut,
            Some(StopReason::Finished) | None => match &self.outcome {
                Some(DriverOutcome::Failed(message)) => {
                    self.record.message.clone_from(message);
                    JobState::Failed
                }
                Some(DriverOutcome::Completed) | None => JobState::Completed,
            },
        };
        let now = self.now();
        self.record.finish(state, now);
        tracing::info!(state = %state, "job finished");
    }

    fn take_outcome(&mut self) {
        let Some(rx) = self.outcome_rx.as_mut() else {
            return;
        };
        match rx.try_recv() {
            Ok(outcome) => {
                self.outcome = Some(outcome);
                self.outcome_rx = None;
            }
            Err(oneshot::error::TryRecvError::Empty) => {}
            Err(oneshot::error::TryRecvError::Closed) => self.outcome_rx = None,
        }
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now().max(self.last_served)
    }
}
