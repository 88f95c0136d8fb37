//! Supervisor for long-running device operations (network scans, firmware
//! updates).
//!
//! - **Registry**: admits jobs up to a concurrency ceiling, answers status and
//!   cancel calls, and drops finished jobs once their terminal state is served.
//! - **Worker**: one per job; a driver task publishes snapshots and a bridge
//!   task serves queries from the latest one.
//! - **Gateway**: JSON over HTTP on top of the registry.

mod config;
mod drivers;
mod error;
mod gateway;
mod jobs;

pub use config::{
    DEFAULT_BIND, RuntimeSettings, ServeConfig, SupervisorSettings, load_runtime_settings,
    load_runtime_settings_from_paths, runtime_settings_paths, set_config_home_override,
};
pub use drivers::{DriverConfig, DriverKind, ScanDriver, UpdateDriver};
pub use error::{ErrorCode, Result, SupervisorError};
pub use gateway::{
    ErrorResponse, GatewayError, GatewayHealthResponse, GatewayState, StartResponse,
    StatusResponse, router, run_http, status_for,
};
pub use jobs::{
    Destination, JobOptions, JobRecord, JobState, JobToken, OperationDriver, Progress,
    ProgressSink, Registry, RegistryConfig, StopReason, TIMEOUT_OPTION, Worker, new_job_id,
};
