//! Notifier error types.

use thiserror::Error;

/// Errors raised while rendering or delivering a notice.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("mail relay request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to render email: {0}")]
    Template(#[from] askama::Error),

    #[error("mail relay rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

pub type NotifyResult<T> = Result<T, NotifyError>;
