//! Job lifecycle: admission, per-job workers, cancellation and cleanup.

mod driver;
mod registry;
mod token;
mod types;
mod worker;

pub use driver::{OperationDriver, ProgressSink};
pub use registry::{Registry, RegistryConfig};
pub use token::{JobToken, StopReason};
pub use types::{
    Destination, JobOptions, JobRecord, JobState, Progress, TIMEOUT_OPTION, new_job_id,
};
pub use worker::Worker;
