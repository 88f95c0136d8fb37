//! Reference operation drivers, one per device job kind.

mod scan;
mod update;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

pub use scan::ScanDriver;
pub use update::UpdateDriver;

use crate::jobs::OperationDriver;

/// Driver selected for a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DriverKind {
    /// Network scan.
    #[default]
    Scan,
    /// Firmware update.
    Update,
}

impl DriverKind {
    /// Config / CLI name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scan => "scan",
            Self::Update => "update",
        }
    }
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DriverKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scan" => Ok(Self::Scan),
            "update" => Ok(Self::Update),
            other => Err(format!("unknown driver `{other}` (expected `scan` or `update`)")),
        }
    }
}

/// Parameters for building the deployment's driver.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Which driver to run.
    pub kind: DriverKind,
    /// Pacing of one unit of simulated work.
    pub tick_interval: Duration,
    /// Hosts probed by one scan.
    pub scan_probes: usize,
    /// Steps of one update.
    pub update_steps: u32,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            kind: DriverKind::Scan,
            tick_interval: Duration::from_secs(1),
            scan_probes: 100,
            update_steps: 100,
        }
    }
}

impl DriverConfig {
    /// Instantiate the configured driver.
    pub fn build(&self) -> Arc<dyn OperationDriver> {
        match self.kind {
            DriverKind::Scan => Arc::new(ScanDriver::new(self.tick_interval, self.scan_probes)),
            DriverKind::Update => Arc::new(UpdateDriver::new(self.tick_interval, self.update_steps)),
        }
    }
}
