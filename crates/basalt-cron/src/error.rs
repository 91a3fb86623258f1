//! Error types for the cron scheduler.

use thiserror::Error;

/// Result type alias for scheduler operations.
pub type CronResult<T> = Result<T, CronError>;

/// Errors that can occur during scheduler operations.
#[derive(Debug, Error)]
pub enum CronError {
    #[error("invalid cron expression {expr:?}: {reason}")]
    InvalidExpression { expr: String, reason: String },
}
