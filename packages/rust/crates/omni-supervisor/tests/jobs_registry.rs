#![allow(missing_docs)]

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use omni_supervisor::{
    Destination, JobOptions, JobRecord, JobState, JobToken, OperationDriver, ProgressSink,
    Registry, RegistryConfig, SupervisorError,
};

/// Publishes a step every `tick` until `steps` are done or the token stops.
/// Options: `"fail": "<msg>"` errors after the first step, `"panic": true`
/// panics after the first step.
struct MockDriver {
    tick: Duration,
    steps: usize,
}

impl MockDriver {
    fn endless(tick: Duration) -> Self {
        Self {
            tick,
            steps: usize::MAX,
        }
    }

    fn finite(tick: Duration, steps: usize) -> Self {
        Self { tick, steps }
    }
}

#[async_trait]
impl OperationDriver for MockDriver {
    fn kind(&self) -> &'static str {
        "mock"
    }

    async fn run(&self, mut job: JobRecord, token: JobToken, progress: ProgressSink) -> Result<()> {
        for step in 1..=self.steps {
            tokio::select! {
                () = token.finished() => return Ok(()),
                () = tokio::time::sleep(self.tick) => {}
            }
            // Message and destinations always agree within one snapshot.
            job.destinations.push(Destination::new(format!("dev-{step}")));
            job.message = format!("step {step}");
            progress.publish(&job);

            if let Some(message) = job.options.str_option("fail") {
                anyhow::bail!("{message}");
            }
            if job.options.extra.get("panic").is_some() {
                panic!("mock driver blew up");
            }
        }
        Ok(())
    }
}

fn registry(driver: MockDriver, concurrency: usize) -> Registry {
    Registry::new(Arc::new(driver), RegistryConfig { concurrency })
}

fn options(value: serde_json::Value) -> JobOptions {
    serde_json::from_value(value).expect("valid options")
}

async fn status_one(registry: &Registry, id: &str) -> Result<JobRecord, SupervisorError> {
    let mut jobs = registry.status(id).await?;
    assert_eq!(jobs.len(), 1);
    Ok(jobs.remove(0))
}

/// Poll until the job is terminal; returns that terminal snapshot.
async fn wait_terminal(registry: &Registry, id: &str) -> JobRecord {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let job = status_one(registry, id).await.expect("job should exist");
            if job.state.is_terminal() {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("job should reach a terminal state")
}

#[tokio::test]
async fn start_is_bounded_by_concurrency_ceiling() {
    let registry = registry(MockDriver::endless(Duration::from_millis(10)), 2);

    let first = registry.start(JobOptions::default()).await.expect("first");
    let second = registry.start(JobOptions::default()).await.expect("second");
    assert_ne!(first, second);
    assert_eq!(registry.len().await, 2);

    let error = registry
        .start(JobOptions::default())
        .await
        .expect_err("third start should be rejected");
    assert_eq!(error, SupervisorError::ResourceExhausted { limit: 2 });

    let cancelled = registry.cancel(&first).await.expect("cancel");
    assert_eq!(cancelled.state, JobState::Cancelled);

    let third = registry
        .start(JobOptions::default())
        .await
        .expect("slot freed by cancel");
    assert_ne!(third, second);
}

#[tokio::test]
async fn zero_concurrency_is_raised_to_one() {
    let registry = registry(MockDriver::endless(Duration::from_millis(10)), 0);
    assert_eq!(registry.concurrency(), 1);
    registry.start(JobOptions::default()).await.expect("one slot");
    assert!(matches!(
        registry.start(JobOptions::default()).await,
        Err(SupervisorError::ResourceExhausted { limit: 1 })
    ));
}

#[tokio::test]
async fn completed_job_is_cleaned_up_after_terminal_status() {
    let registry = registry(MockDriver::finite(Duration::from_millis(5), 3), 1);
    let id = registry.start(JobOptions::default()).await.expect("start");

    let done = wait_terminal(&registry, &id).await;
    assert_eq!(done.state, JobState::Completed);
    assert_eq!(done.message, "step 3");
    assert_eq!(done.destinations.len(), 3);
    assert!(done.progress.completed.is_some());

    assert_eq!(
        registry.status(&id).await,
        Err(SupervisorError::NotFound { id: id.clone() })
    );
    assert!(registry.is_empty().await);
    registry
        .start(JobOptions::default())
        .await
        .expect("slot freed by cleanup");
}

#[tokio::test]
async fn finished_but_unobserved_job_still_occupies_its_slot() {
    let registry = registry(MockDriver::finite(Duration::from_millis(1), 1), 1);
    let id = registry.start(JobOptions::default()).await.expect("start");
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(matches!(
        registry.start(JobOptions::default()).await,
        Err(SupervisorError::ResourceExhausted { .. })
    ));

    let done = status_one(&registry, &id).await.expect("terminal snapshot");
    assert_eq!(done.state, JobState::Completed);
    registry.start(JobOptions::default()).await.expect("slot freed");
}

#[tokio::test]
async fn duration_is_monotonic_and_frozen_after_terminal() {
    let registry = registry(MockDriver::endless(Duration::from_millis(5)), 1);
    let id = registry.start(JobOptions::default()).await.expect("start");

    let mut last = 0.0_f64;
    for _ in 0..5 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let job = status_one(&registry, &id).await.expect("running job");
        assert_eq!(job.state, JobState::Started);
        assert!(job.progress.completed.is_none());
        assert!(
            job.progress.duration >= last,
            "duration went backwards: {} < {last}",
            job.progress.duration
        );
        last = job.progress.duration;
    }
    assert!(last > 0.0);

    let cancelled = registry.cancel(&id).await.expect("cancel");
    assert_eq!(cancelled.state, JobState::Cancelled);
    assert!(cancelled.progress.duration >= last);
    let completed = cancelled.progress.completed.expect("completion time");
    assert!(completed >= cancelled.progress.started);
}

#[tokio::test]
async fn cancel_returns_cancelled_then_job_is_gone() {
    let registry = registry(MockDriver::endless(Duration::from_millis(10)), 1);
    let id = registry.start(JobOptions::default()).await.expect("start");
    tokio::time::sleep(Duration::from_millis(30)).await;

    let job = registry.cancel(&id).await.expect("cancel");
    assert_eq!(job.id, id);
    assert_eq!(job.kind, "mock");
    assert_eq!(job.state, JobState::Cancelled);

    assert_eq!(
        registry.status(&id).await,
        Err(SupervisorError::NotFound { id: id.clone() })
    );
    assert!(matches!(
        registry.cancel(&id).await,
        Err(SupervisorError::NotFound { .. })
    ));
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
    let registry = registry(MockDriver::endless(Duration::from_millis(10)), 1);
    assert!(matches!(
        registry.status("missing").await,
        Err(SupervisorError::NotFound { .. })
    ));
    assert!(matches!(
        registry.cancel("").await,
        Err(SupervisorError::NotFound { .. })
    ));
}

#[tokio::test]
async fn timeout_marks_job_timed_out() {
    let registry = registry(MockDriver::endless(Duration::from_millis(500)), 1);
    let id = registry
        .start(JobOptions::with_timeout_secs(0.2))
        .await
        .expect("start");

    let running = status_one(&registry, &id).await.expect("running");
    assert_eq!(running.state, JobState::Started);

    tokio::time::sleep(Duration::from_millis(400)).await;
    let job = status_one(&registry, &id).await.expect("timed out snapshot");
    assert_eq!(job.state, JobState::TimedOut);
    assert!(job.progress.duration >= 0.15);
    assert!(job.progress.duration < 2.0);
    assert!(registry.is_empty().await);
}

/// Sleeps far past any test deadline without ever looking at its token.
struct ObliviousDriver;

#[async_trait]
impl OperationDriver for ObliviousDriver {
    fn kind(&self) -> &'static str {
        "oblivious"
    }

    async fn run(&self, _job: JobRecord, _token: JobToken, _progress: ProgressSink) -> Result<()> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(())
    }
}

#[tokio::test]
async fn timeout_fires_even_when_driver_ignores_token() {
    let registry = Registry::new(Arc::new(ObliviousDriver), RegistryConfig { concurrency: 1 });
    let id = registry
        .start(JobOptions::with_timeout_secs(0.2))
        .await
        .expect("start");

    tokio::time::sleep(Duration::from_millis(400)).await;
    let job = status_one(&registry, &id).await.expect("timed out snapshot");
    assert_eq!(job.state, JobState::TimedOut);
    assert!(job.progress.duration < 2.0);

    assert!(registry.is_empty().await);
    assert!(matches!(
        registry.status(&id).await,
        Err(SupervisorError::NotFound { .. })
    ));
    registry
        .start(JobOptions::default())
        .await
        .expect("slot freed by cleanup");
}

#[tokio::test]
async fn out_of_range_timeout_is_rejected_without_panicking() {
    let registry = Arc::new(registry(MockDriver::endless(Duration::from_millis(10)), 1));

    let start = tokio::spawn({
        let registry = Arc::clone(&registry);
        async move { registry.start(options(serde_json::json!({"timeout": 1e19}))).await }
    });
    let error = start
        .await
        .expect("start must not panic")
        .expect_err("deadline out of range");
    assert!(matches!(error, SupervisorError::InvalidArgument(_)));
    assert!(registry.is_empty().await);

    let id = registry
        .start(JobOptions::default())
        .await
        .expect("registry still usable");
    registry.cancel(&id).await.expect("cancel");
}

#[tokio::test]
async fn invalid_timeout_is_rejected_before_admission() {
    let registry = registry(MockDriver::endless(Duration::from_millis(10)), 1);

    for bad in [
        serde_json::json!({"timeout": "soon"}),
        serde_json::json!({"timeout": -1}),
    ] {
        let error = registry
            .start(options(bad))
            .await
            .expect_err("bad timeout");
        assert!(matches!(error, SupervisorError::InvalidArgument(_)));
    }
    assert!(registry.is_empty().await);
}

#[tokio::test]
async fn status_all_returns_registered_jobs_once() {
    let registry = registry(MockDriver::endless(Duration::from_millis(10)), 3);
    let mut ids = HashSet::new();
    for _ in 0..3 {
        ids.insert(registry.start(JobOptions::default()).await.expect("start"));
    }

    let jobs = registry.status("").await.expect("status all");
    let seen: HashSet<String> = jobs.iter().map(|job| job.id.clone()).collect();
    assert_eq!(jobs.len(), 3);
    assert_eq!(seen, ids);
    assert!(
        jobs.windows(2)
            .all(|pair| pair[0].progress.started <= pair[1].progress.started)
    );

    let cancelled = ids.iter().next().cloned().expect("one id");
    registry.cancel(&cancelled).await.expect("cancel");
    let jobs = registry.status("").await.expect("status all");
    assert_eq!(jobs.len(), 2);
    assert!(jobs.iter().all(|job| job.id != cancelled));
}

#[tokio::test]
async fn status_all_on_empty_registry_is_empty() {
    let registry = registry(MockDriver::endless(Duration::from_millis(10)), 1);
    assert!(registry.status("").await.expect("status all").is_empty());
}

#[tokio::test]
async fn concurrent_queries_see_whole_snapshots() {
    let registry = Arc::new(registry(MockDriver::endless(Duration::from_millis(1)), 1));
    let id = registry.start(JobOptions::default()).await.expect("start");

    let mut readers = Vec::new();
    for _ in 0..8 {
        let registry = Arc::clone(&registry);
        let id = id.clone();
        readers.push(tokio::spawn(async move {
            let mut last_len = 0;
            for _ in 0..25 {
                let job = status_one(&registry, &id).await.expect("running job");
                let len = job.destinations.len();
                if len > 0 {
                    assert_eq!(job.message, format!("step {len}"));
                }
                assert!(len >= last_len);
                last_len = len;
                tokio::task::yield_now().await;
            }
        }));
    }
    for reader in readers {
        reader.await.expect("reader task");
    }
    registry.cancel(&id).await.expect("cancel");
}

#[tokio::test]
async fn driver_error_marks_job_failed_with_message() {
    let registry = registry(MockDriver::endless(Duration::from_millis(5)), 1);
    let id = registry
        .start(options(serde_json::json!({"fail": "device unreachable"})))
        .await
        .expect("start");

    let job = wait_terminal(&registry, &id).await;
    assert_eq!(job.state, JobState::Failed);
    assert_eq!(job.message, "device unreachable");
}

#[tokio::test]
async fn driver_panic_is_contained_to_its_job() {
    let registry = registry(MockDriver::endless(Duration::from_millis(5)), 2);
    let healthy = registry.start(JobOptions::default()).await.expect("start");
    let broken = registry
        .start(options(serde_json::json!({"panic": true})))
        .await
        .expect("start");

    let job = wait_terminal(&registry, &broken).await;
    assert_eq!(job.state, JobState::Failed);
    assert!(job.message.contains("driver crashed"), "{}", job.message);

    tokio::time::sleep(Duration::from_millis(20)).await;
    let alive = status_one(&registry, &healthy).await.expect("healthy job");
    assert_eq!(alive.state, JobState::Started);
    assert!(!alive.destinations.is_empty());
}

#[tokio::test]
async fn options_are_echoed_in_snapshots() {
    let registry = registry(MockDriver::endless(Duration::from_millis(10)), 1);
    let requested = options(serde_json::json!({
        "image": "fw-1.2.bin",
        "destinations": [{"id": "10.0.0.7"}],
        "timeout": 30,
        "site": "lab"
    }));
    let id = registry.start(requested.clone()).await.expect("start");

    let job = status_one(&registry, &id).await.expect("job");
    assert_eq!(job.options, requested);
    assert_eq!(job.options.str_option("site"), Some("lab"));
    registry.cancel(&id).await.expect("cancel");
}

#[tokio::test]
async fn dropping_registry_cancels_running_jobs() {
    struct Watcher(Arc<tokio::sync::Notify>);

    #[async_trait]
    impl OperationDriver for Watcher {
        fn kind(&self) -> &'static str {
            "watcher"
        }

        async fn run(&self, _job: JobRecord, token: JobToken, _progress: ProgressSink) -> Result<()> {
            token.finished().await;
            self.0.notify_one();
            Ok(())
        }
    }

    let token_seen = Arc::new(tokio::sync::Notify::new());
    let registry = Registry::new(
        Arc::new(Watcher(Arc::clone(&token_seen))),
        RegistryConfig::default(),
    );
    registry.start(JobOptions::default()).await.expect("start");
    drop(registry);

    tokio::time::timeout(Duration::from_secs(1), token_seen.notified())
        .await
        .expect("driver should observe cancellation");
}
