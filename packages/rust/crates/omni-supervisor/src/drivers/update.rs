use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::Utc;

use crate::jobs::{JobRecord, JobState, JobToken, OperationDriver, ProgressSink};

/// Simulated firmware update: flashes `options.image` to every
/// `options.destinations` entry, advancing one step per tick, and reports
/// `COMPLETED` itself at 100%.
#[derive(Debug, Clone)]
pub struct UpdateDriver {
    interval: Duration,
    steps: u32,
}

impl UpdateDriver {
    /// Update taking `steps` ticks of `interval` each.
    pub fn new(interval: Duration, steps: u32) -> Self {
        Self {
            interval,
            steps: steps.max(1),
        }
    }
}

impl Default for UpdateDriver {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), 100)
    }
}

#[async_trait]
impl OperationDriver for UpdateDriver {
    fn kind(&self) -> &'static str {
        "update"
    }

    async fn run(&self, mut job: JobRecord, token: JobToken, progress: ProgressSink) -> Result<()> {
        if job.options.image.trim().is_empty() {
            bail!("no image to flash");
        }
        if job.options.destinations.is_empty() {
            bail!("no destinations to update");
        }

        job.destinations = job.options.destinations.clone();
        let image = job.options.image.clone();
        let targets = job.destinations.len();

        for step in 1..=self.steps {
            tokio::select! {
                () = token.finished() => return Ok(()),
                () = tokio::time::sleep(self.interval) => {}
            }
            let percent = percent(step, self.steps);
            job.message = format!("flashing {image} to {targets} destination(s): {percent}%");
            progress.publish(&job);
        }

        job.message = format!("flashed {image} to {targets} destination(s)");
        job.finish(JobState::Completed, Utc::now());
        progress.publish(&job);
        tracing::info!(%image, targets, "update completed");
        Ok(())
    }
}

fn percent(step: u32, steps: u32) -> u64 {
    u64::from(step) * 100 / u64::from(steps.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_is_exact_for_large_step_counts() {
        assert_eq!(percent(1, 4), 25);
        assert_eq!(percent(4, 4), 100);
        assert_eq!(percent(u32::MAX / 2, u32::MAX), 49);
        assert_eq!(percent(u32::MAX, u32::MAX), 100);
    }
}
