use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use omni_supervisor::DriverKind;

#[derive(Parser)]
#[command(name = "omni-supervisor")]
#[command(about = "Job supervisor for device operations: bounded workers, cancellable jobs, HTTP gateway.")]
pub(crate) struct Cli {
    /// Override config directory (replaces `PRJ_CONFIG_HOME`).
    #[arg(long, global = true)]
    pub(crate) conf: Option<PathBuf>,

    /// Debug logging for omni_supervisor (ignored when RUST_LOG is set).
    #[arg(long, short, global = true)]
    pub(crate) verbose: bool,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub(crate) enum DriverChoice {
    Scan,
    Update,
}

impl From<DriverChoice> for DriverKind {
    fn from(choice: DriverChoice) -> Self {
        match choice {
            DriverChoice::Scan => Self::Scan,
            DriverChoice::Update => Self::Update,
        }
    }
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the HTTP gateway over a job registry. Default bind: 127.0.0.1:8790
    Serve {
        /// Listen address (overrides `supervisor.bind`)
        #[arg(long)]
        bind: Option<String>,

        /// Max live jobs (overrides `supervisor.concurrency`; default 4)
        #[arg(long)]
        concurrency: Option<usize>,

        /// Operation driver (overrides `supervisor.driver`; default scan)
        #[arg(long, value_enum)]
        driver: Option<DriverChoice>,

        /// Driver tick in milliseconds (overrides `supervisor.tick_interval_ms`; default 1000)
        #[arg(long)]
        tick_ms: Option<u64>,
    },
}
