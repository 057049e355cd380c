//! Scheduler error types.

use thiserror::Error;

/// Errors that can occur while evaluating or postponing one instance.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: &'static str, secs: u64 },

    #[error("{operation} failed: {source}")]
    Collaborator {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("instance {0} has neither a deadline nor a scheduled time")]
    Untracked(String),

    #[error("deadline for instance {0} kept changing underneath the update")]
    Conflict(String),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
