//! Error types for the trigger registry.

use thiserror::Error;

/// Result type alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors that can occur while registering a function's triggers.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Cron(#[from] basalt_cron::CronError),
}
