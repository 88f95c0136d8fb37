//! Error types for supervisor entry points.
//!
//! Only admission and lookup failures are call errors. Domain failures end up
//! as terminal job states inside a successfully returned snapshot.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Stable error code carried over every transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Concurrency ceiling reached; retry later.
    ResourceExhausted,
    /// Unknown or already cleaned-up job id; do not retry.
    NotFound,
    /// Malformed request options.
    InvalidArgument,
}

impl ErrorCode {
    /// Wire name of the code.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ResourceExhausted => "RESOURCE_EXHAUSTED",
            Self::NotFound => "NOT_FOUND",
            Self::InvalidArgument => "INVALID_ARGUMENT",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supervisor-specific errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SupervisorError {
    /// All worker slots are taken.
    #[error("no workers available (limit {limit})")]
    ResourceExhausted {
        /// Configured concurrency ceiling.
        limit: usize,
    },

    /// No worker registered under this id.
    #[error("worker not found: {id}")]
    NotFound {
        /// Requested job id.
        id: String,
    },

    /// Options rejected before a job was created.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl SupervisorError {
    /// Code used by transports to classify this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::ResourceExhausted { .. } => ErrorCode::ResourceExhausted,
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
        }
    }

    pub(crate) fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }
}

/// Result type for supervisor operations.
pub type Result<T> = std::result::Result<T, SupervisorError>;
