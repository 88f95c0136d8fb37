//! Registry: bounded set of workers keyed by job id.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;

use crate::error::{Result, SupervisorError};
use crate::jobs::driver::OperationDriver;
use crate::jobs::token::JobToken;
use crate::jobs::types::{JobOptions, JobRecord, new_job_id};
use crate::jobs::worker::Worker;

/// Config for the registry.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Maximum live workers, finished-but-not-cleaned ones included.
    pub concurrency: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self { concurrency: 4 }
    }
}

/// Admits, tracks and cleans up jobs run by one injected driver.
pub struct Registry {
    driver: Arc<dyn OperationDriver>,
    concurrency: usize,
    workers: RwLock<HashMap<String, Arc<Worker>>>,
}

impl Registry {
    /// Create a registry; a zero ceiling is raised to one.
    pub fn new(driver: Arc<dyn OperationDriver>, config: RegistryConfig) -> Self {
        Self {
            driver,
            concurrency: config.concurrency.max(1),
            workers: RwLock::new(HashMap::new()),
        }
    }

    /// Concurrency ceiling.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Kind of the injected driver.
    pub fn driver_kind(&self) -> &'static str {
        self.driver.kind()
    }

    /// Number of registered workers.
    pub async fn len(&self) -> usize {
        self.workers.read().await.len()
    }

    /// Whether no worker is registered.
    pub async fn is_empty(&self) -> bool {
        self.workers.read().await.is_empty()
    }

    /// Admit a job and launch it. Returns the new job id without waiting.
    pub async fn start(&self, options: JobOptions) -> Result<String> {
        tracing::debug!(?options, "start request");
        let timeout = options.timeout().inspect_err(|error| {
            tracing::warn!(%error, "start request rejected");
        })?;

        let mut workers = self.workers.write().await;
        if workers.len() >= self.concurrency {
            let error = SupervisorError::ResourceExhausted {
                limit: self.concurrency,
            };
            tracing::warn!(%error, live = workers.len(), "start request rejected");
            return Err(error);
        }

        let id = new_job_id();
        let token = timeout.map_or_else(JobToken::new, JobToken::with_timeout);
        let record = JobRecord::started(id.clone(), self.driver.kind(), options, Utc::now());
        let worker = Worker::spawn(record, token, Arc::clone(&self.driver));
        workers.insert(id.clone(), worker);

        tracing::info!(
            job_id = %id,
            kind = self.driver.kind(),
            timeout_secs = timeout.map(|t| t.as_secs_f64()),
            live = workers.len(),
            "job started"
        );
        Ok(id)
    }

    /// Snapshot one job, or every live job when `id` is empty.
    ///
    /// All-jobs queries visit workers one after another; a job that finished
    /// is dropped from the registry after its snapshot is collected.
    pub async fn status(&self, id: &str) -> Result<Vec<JobRecord>> {
        tracing::debug!(job_id = %id, "status request");
        if !id.is_empty() {
            let worker = self.find(id).await?;
            let record = worker.query().await?;
            self.cleanup(&worker, &record).await;
            return Ok(vec![record]);
        }

        let workers: Vec<Arc<Worker>> = self.workers.read().await.values().cloned().collect();
        let mut jobs = Vec::with_capacity(workers.len());
        for worker in workers {
            let record = match worker.query().await {
                Ok(record) => record,
                Err(error) => {
                    tracing::debug!(%error, "skipping vanished worker");
                    continue;
                }
            };
            // Cleaned up by a concurrent caller between listing and querying.
            if !self.is_registered(&worker).await {
                continue;
            }
            self.cleanup(&worker, &record).await;
            jobs.push(record);
        }
        jobs.sort_by(|a, b| {
            a.progress
                .started
                .cmp(&b.progress.started)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(jobs)
    }

    /// Cancel a job and return its final snapshot.
    pub async fn cancel(&self, id: &str) -> Result<JobRecord> {
        tracing::debug!(job_id = %id, "cancel request");
        let worker = self.find(id).await?;
        worker.cancel();
        let record = worker.query().await?;
        self.cleanup(&worker, &record).await;
        tracing::info!(job_id = %id, state = %record.state, "job cancel served");
        Ok(record)
    }

    async fn find(&self, id: &str) -> Result<Arc<Worker>> {
        if let Some(worker) = self.workers.read().await.get(id) {
            return Ok(Arc::clone(worker));
        }
        let error = SupervisorError::not_found(id);
        tracing::warn!(%error, "lookup failed");
        Err(error)
    }

    async fn is_registered(&self, worker: &Arc<Worker>) -> bool {
        self.workers
            .read()
            .await
            .get(worker.id())
            .is_some_and(|current| Arc::ptr_eq(current, worker))
    }

    /// Drop a worker whose token is finished once a terminal snapshot has
    /// been served from it.
    async fn cleanup(&self, worker: &Arc<Worker>, served: &JobRecord) {
        if !worker.is_finished() || !served.state.is_terminal() {
            return;
        }
        let mut workers = self.workers.write().await;
        if workers
            .get(worker.id())
            .is_some_and(|current| Arc::ptr_eq(current, worker))
        {
            workers.remove(worker.id());
            tracing::debug!(job_id = %worker.id(), live = workers.len(), "worker cleaned up");
        }
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("driver", &self.driver.kind())
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}
