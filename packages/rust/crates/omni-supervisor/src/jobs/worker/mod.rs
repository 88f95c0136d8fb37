//! Worker: one driver execution bound to one token and a query channel pair.

mod bridge;

use std::sync::{Arc, OnceLock};

use tokio::sync::{mpsc, oneshot, watch};
use tracing::Instrument;

use crate::error::{Result, SupervisorError};
use crate::jobs::driver::{OperationDriver, ProgressSink};
use crate::jobs::token::JobToken;
use crate::jobs::types::JobRecord;

use bridge::Bridge;

/// Reply slot handed to the bridge with every query.
type Query = oneshot::Sender<JobRecord>;

/// How the driver task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
enum DriverOutcome {
    Completed,
    Failed(String),
}

/// Live handle on a running job.
///
/// Queries go through the job's bridge task, which owns the authoritative
/// record; callers only ever get copies. Dropping the last handle cancels the
/// job.
#[derive(Debug)]
pub struct Worker {
    id: String,
    token: JobToken,
    queries: mpsc::Sender<Query>,
    final_snapshot: Arc<OnceLock<JobRecord>>,
}

impl Worker {
    /// Launch `driver` for `record` and the bridge serving its queries.
    pub fn spawn(
        record: JobRecord,
        token: JobToken,
        driver: Arc<dyn OperationDriver>,
    ) -> Arc<Self> {
        let id = record.id.clone();
        let span = tracing::info_span!("job", job_id = %id, kind = driver.kind());

        let (sync_tx, sync_rx) = watch::channel(record.clone());
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let (query_tx, query_rx) = mpsc::channel(1);
        let final_snapshot = Arc::new(OnceLock::new());

        let bridge = Bridge::new(
            record.clone(),
            token.clone(),
            sync_rx,
            outcome_rx,
            query_rx,
            Arc::clone(&final_snapshot),
        );
        tokio::spawn(bridge.run().instrument(span.clone()));

        let sink = ProgressSink::new(id.clone(), sync_tx);
        tokio::spawn(drive(driver, record, token.clone(), sink, outcome_tx).instrument(span));

        Arc::new(Self {
            id,
            token,
            queries: query_tx,
            final_snapshot,
        })
    }

    /// Job id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether the job's token is cancelled, expired or finished.
    pub fn is_finished(&self) -> bool {
        self.token.is_finished()
    }

    /// Signal cancellation. Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Latest snapshot with duration computed at answer time.
    ///
    /// Once the bridge has answered its final query it stops; later queries
    /// get that final snapshot.
    pub async fn query(&self) -> Result<JobRecord> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.queries.send(reply_tx).await.is_ok()
            && let Ok(record) = reply_rx.await
        {
            return Ok(record);
        }
        self.final_snapshot
            .get()
            .cloned()
            .ok_or_else(|| SupervisorError::not_found(self.id.clone()))
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn drive(
    driver: Arc<dyn OperationDriver>,
    record: JobRecord,
    token: JobToken,
    sink: ProgressSink,
    outcome_tx: oneshot::Sender<DriverOutcome>,
) {
    let run_token = token.clone();
    let run = tokio::spawn(
        async move { driver.run(record, run_token, sink).await }.in_current_span(),
    );

    let outcome = match run.await {
        Ok(Ok(())) => {
            tracing::debug!("driver returned");
            DriverOutcome::Completed
        }
        Ok(Err(error)) => {
            let message = format!("{error:#}");
            tracing::warn!(error = %message, "driver failed");
            DriverOutcome::Failed(message)
        }
        Err(join_error) => {
            tracing::error!(error = %join_error, "driver task crashed");
            DriverOutcome::Failed(format!("driver crashed: {join_error}"))
        }
    };

    // The outcome must be readable by the time the token trips.
    let _ = outcome_tx.send(outcome);
    token.finish();
}
