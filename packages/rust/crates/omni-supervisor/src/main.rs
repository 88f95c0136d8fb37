//! omni-supervisor binary: settings, CLI overrides, registry, HTTP gateway.

mod cli;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use omni_supervisor::{
    Registry, ServeConfig, load_runtime_settings, run_http, set_config_home_override,
};

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG overrides; --verbose => debug; else info
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if cli.verbose {
            "omni_supervisor=debug"
        } else {
            "omni_supervisor=info"
        })
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    if let Some(conf_dir) = cli.conf.clone() {
        set_config_home_override(conf_dir);
    }
    let runtime_settings = load_runtime_settings();

    match cli.command {
        Command::Serve {
            bind,
            concurrency,
            driver,
            tick_ms,
        } => {
            let mut config = ServeConfig::from_settings(&runtime_settings.supervisor);
            if let Some(bind) = bind {
                config.bind = bind;
            }
            if let Some(concurrency) = concurrency {
                config.registry.concurrency = concurrency;
            }
            if let Some(driver) = driver {
                config.driver.kind = driver.into();
            }
            if let Some(ms) = tick_ms {
                config.driver.tick_interval = Duration::from_millis(ms);
            }
            tracing::debug!(?config, "resolved serve config");

            let registry = Arc::new(Registry::new(config.driver.build(), config.registry));
            run_http(registry, &config.bind).await
        }
    }
}
