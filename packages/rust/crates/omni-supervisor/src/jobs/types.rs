//! Job data model shared by the registry, workers, drivers and the gateway.

use std::fmt;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{Result, SupervisorError};

/// Reserved option key bounding a job with a deadline (seconds).
pub const TIMEOUT_OPTION: &str = "timeout";

/// Generate a fresh job id.
pub fn new_job_id() -> String {
    Uuid::new_v4().to_string()
}

/// Job lifecycle state. Every state except `Started` is terminal and absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    /// Running; progress changes happen inside this state.
    Started,
    /// Driver finished its work.
    Completed,
    /// Explicit cancel observed before natural completion.
    Cancelled,
    /// Driver reported an error; `message` carries the detail.
    Failed,
    /// Deadline elapsed before completion.
    TimedOut,
}

impl JobState {
    /// Wire name of the state.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Started => "STARTED",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
            Self::Failed => "FAILED",
            Self::TimedOut => "TIMED_OUT",
        }
    }

    /// Whether no further transition is allowed.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Started)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A device discovered by a scan or addressed by an update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    /// Device address (IP, MAC, serial, ...).
    pub id: String,
    /// Driver-specific attributes.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl Destination {
    /// Destination with no extra attributes.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            extra: Map::new(),
        }
    }

    /// String attribute lookup.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }
}

/// Caller-supplied job parameters.
///
/// `image` and `destinations` are typed; every other key lands in `extra`,
/// including the reserved [`TIMEOUT_OPTION`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobOptions {
    /// Payload to flash (update jobs).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,
    /// Targets of the job (update jobs).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub destinations: Vec<Destination>,
    /// Free-form driver arguments.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl JobOptions {
    /// Options carrying only a deadline.
    pub fn with_timeout_secs(secs: f64) -> Self {
        let mut options = Self::default();
        options
            .extra
            .insert(TIMEOUT_OPTION.to_string(), Value::from(secs));
        options
    }

    /// Deadline requested by the caller; `None` when absent or zero.
    pub fn timeout(&self) -> Result<Option<Duration>> {
        let Some(value) = self.extra.get(TIMEOUT_OPTION) else {
            return Ok(None);
        };
        let secs = value.as_f64().ok_or_else(|| {
            SupervisorError::InvalidArgument(format!(
                "`{TIMEOUT_OPTION}` must be a number of seconds, got {value}"
            ))
        })?;
        let timeout = Duration::try_from_secs_f64(secs).map_err(|error| {
            SupervisorError::InvalidArgument(format!("`{TIMEOUT_OPTION}` = {secs}: {error}"))
        })?;
        if Instant::now().checked_add(timeout).is_none() {
            return Err(SupervisorError::InvalidArgument(format!(
                "`{TIMEOUT_OPTION}` = {secs}: deadline out of range"
            )));
        }
        Ok((!timeout.is_zero()).then_some(timeout))
    }

    /// String option lookup in `extra`, blank values treated as absent.
    pub fn str_option(&self, key: &str) -> Option<&str> {
        self.extra
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

/// Timing of a job. `duration` is recomputed on every read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    /// When the job was admitted.
    pub started: DateTime<Utc>,
    /// When the job reached a terminal state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<DateTime<Utc>>,
    /// Seconds between `started` and `completed` (or now while running).
    pub duration: f64,
}

impl Progress {
    /// Fresh progress starting at `now`.
    pub fn starting_at(now: DateTime<Utc>) -> Self {
        Self {
            started: now,
            completed: None,
            duration: 0.0,
        }
    }

    /// Recompute `duration` against `now` (ignored once completed).
    pub fn refresh(&mut self, now: DateTime<Utc>) {
        let end = self.completed.unwrap_or(now);
        self.duration = seconds_between(self.started, end);
    }
}

#[allow(clippy::cast_precision_loss)]
fn seconds_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds().max(0) as f64 / 1000.0
}

/// Complete point-in-time view of one job; the unit drivers publish and
/// callers receive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Job id.
    pub id: String,
    /// Driver kind running the job.
    pub kind: String,
    /// Options the job was started with.
    pub options: JobOptions,
    /// Lifecycle state.
    pub state: JobState,
    /// Timing.
    pub progress: Progress,
    /// Human-readable progress or failure detail.
    #[serde(default)]
    pub message: String,
    /// Devices found or handled so far.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub destinations: Vec<Destination>,
}

impl JobRecord {
    /// Initial record of a freshly admitted job.
    pub fn started(
        id: impl Into<String>,
        kind: impl Into<String>,
        options: JobOptions,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            options,
            state: JobState::Started,
            progress: Progress::starting_at(now),
            message: String::new(),
            destinations: Vec::new(),
        }
    }

    /// Terminal transition; no-op if the record is already terminal.
    pub fn finish(&mut self, state: JobState, now: DateTime<Utc>) {
        if self.state.is_terminal() {
            return;
        }
        self.state = state;
        self.progress.completed.get_or_insert(now);
    }
}
