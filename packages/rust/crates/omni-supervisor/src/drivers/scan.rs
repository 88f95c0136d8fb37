use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::jobs::{Destination, JobRecord, JobToken, OperationDriver, ProgressSink};

const APPLICATIONS: [&str; 3] = ["sensor", "gateway", "camera"];

/// Simulated network scan: probes one host per tick and reports the ones
/// matching the optional `application` / `mac` filters.
#[derive(Debug, Clone)]
pub struct ScanDriver {
    interval: Duration,
    probes: usize,
}

impl ScanDriver {
    /// Scan probing `probes` hosts, one every `interval`.
    pub fn new(interval: Duration, probes: usize) -> Self {
        Self { interval, probes }
    }
}

impl Default for ScanDriver {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), 100)
    }
}

#[async_trait]
impl OperationDriver for ScanDriver {
    fn kind(&self) -> &'static str {
        "scan"
    }

    async fn run(&self, mut job: JobRecord, token: JobToken, progress: ProgressSink) -> Result<()> {
        let application = job.options.str_option("application").map(str::to_owned);
        let mac = job.options.str_option("mac").map(str::to_owned);

        for index in 0..self.probes {
            tokio::select! {
                () = token.finished() => return Ok(()),
                () = tokio::time::sleep(self.interval) => {}
            }

            let host = simulated_host(index);
            if matches_filters(&host, application.as_deref(), mac.as_deref()) {
                tracing::debug!(host = %host.id, "device discovered");
                job.destinations.push(host);
            }
            job.message = format!(
                "probed {}/{} hosts, {} matched",
                index + 1,
                self.probes,
                job.destinations.len()
            );
            progress.publish(&job);
        }
        Ok(())
    }
}

fn simulated_host(index: usize) -> Destination {
    let subnet = (index / 254) % 256;
    let mut host = Destination::new(format!("10.0.{subnet}.{}", index % 254 + 1));
    host.extra.insert(
        "application".to_string(),
        Value::from(APPLICATIONS[index % APPLICATIONS.len()]),
    );
    host.extra.insert(
        "mac".to_string(),
        Value::from(format!(
            "02:00:00:00:{:02x}:{:02x}",
            (index >> 8) & 0xff,
            index & 0xff
        )),
    );
    host
}

fn matches_filters(host: &Destination, application: Option<&str>, mac: Option<&str>) -> bool {
    let matches = |key: &str, wanted: Option<&str>| {
        wanted.is_none_or(|wanted| {
            host.attr(key)
                .is_some_and(|value| value.eq_ignore_ascii_case(wanted))
        })
    };
    matches("application", application) && matches("mac", mac)
}
