//! Error types for the record store.

use thiserror::Error;

/// Result type alias for record store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur during record store operations.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    /// The collection's table has never been written. The control plane
    /// treats this as "no functions yet", not as a failure.
    #[error("collection not found: {0}")]
    CollectionMissing(String),
}
