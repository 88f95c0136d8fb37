use std::time::Duration;

use crate::drivers::{DriverConfig, DriverKind};
use crate::jobs::RegistryConfig;

use super::settings::SupervisorSettings;

/// Default gateway listen address.
pub const DEFAULT_BIND: &str = "127.0.0.1:8790";

/// Fully resolved configuration for `serve`.
#[derive(Debug, Clone)]
pub struct ServeConfig {
    /// Gateway listen address.
    pub bind: String,
    /// Registry limits.
    pub registry: RegistryConfig,
    /// Driver selection and pacing.
    pub driver: DriverConfig,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            registry: RegistryConfig::default(),
            driver: DriverConfig::default(),
        }
    }
}

impl ServeConfig {
    /// Built-in defaults overlaid with the settings file section.
    ///
    /// An unknown driver name is logged and the default driver kept.
    pub fn from_settings(settings: &SupervisorSettings) -> Self {
        let mut config = Self::default();
        if let Some(bind) = settings.bind.as_deref().map(str::trim).filter(|b| !b.is_empty()) {
            config.bind = bind.to_string();
        }
        if let Some(concurrency) = settings.concurrency {
            config.registry.concurrency = concurrency;
        }
        if let Some(name) = settings.driver.as_deref() {
            match name.parse::<DriverKind>() {
                Ok(kind) => config.driver.kind = kind,
                Err(error) => tracing::warn!(%error, "invalid supervisor.driver; using default"),
            }
        }
        if let Some(ms) = settings.tick_interval_ms {
            config.driver.tick_interval = Duration::from_millis(ms);
        }
        if let Some(probes) = settings.scan_probes {
            config.driver.scan_probes = probes;
        }
        if let Some(steps) = settings.update_steps {
            config.driver.update_steps = steps;
        }
        config
    }
}
