//! Operation driver contract: the pluggable long-running procedure behind a job.

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::watch;

use crate::jobs::token::JobToken;
use crate::jobs::types::JobRecord;

/// Device-specific operation run once per job (scan, update, ...).
///
/// The driver owns a working copy of the job record, publishes complete
/// copies through the sink whenever it has progress, and returns once its work
/// is done or `token` is finished. Returning an error marks the job `FAILED`
/// with the error text as message.
#[async_trait]
pub trait OperationDriver: Send + Sync {
    /// Short name stamped on every job this driver runs.
    fn kind(&self) -> &'static str;

    /// Run the operation for one job.
    async fn run(&self, job: JobRecord, token: JobToken, progress: ProgressSink) -> Result<()>;
}

/// Publishing end of a worker's one-slot snapshot channel.
///
/// Publishing never waits for the reader; an unread snapshot is replaced by
/// the next one.
#[derive(Debug)]
pub struct ProgressSink {
    id: String,
    tx: watch::Sender<JobRecord>,
}

impl ProgressSink {
    pub(crate) fn new(id: String, tx: watch::Sender<JobRecord>) -> Self {
        Self { id, tx }
    }

    /// Publish a full snapshot of the job.
    pub fn publish(&self, record: &JobRecord) {
        if record.id != self.id {
            tracing::warn!(
                job_id = %self.id,
                published_id = %record.id,
                "driver published a snapshot for another job; ignoring"
            );
            return;
        }
        self.tx.send_replace(record.clone());
    }
}
