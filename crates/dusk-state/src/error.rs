//! Error types for the dusk state store.

use thiserror::Error;

pub type StateResult<T> = Result<T, StateError>;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to open database: {0}")]
    Open(String),

    /// A redb transaction, table, read, or write failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// A stored record could not be encoded or decoded.
    #[error("record encoding error: {0}")]
    Codec(String),

    #[error("instance not found: {0}")]
    InstanceNotFound(String),

    #[error("instance {id} has unreadable schedule tags: {source}")]
    Schedule {
        id: String,
        #[source]
        source: dusk_core::CoreError,
    },
}
