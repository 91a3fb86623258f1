//! Error types for the script engine.

use thiserror::Error;

/// Result type alias for engine-internal operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur while setting up or running a script runtime.
///
/// These never escape [`crate::ScriptEngine::execute`]; they are folded
/// into the `error` field of an [`crate::InvocationResult`] so that
/// dispatchers always have a response to project.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to create runtime: {0}")]
    Runtime(String),

    #[error("failed to bind context: {0}")]
    Bind(String),

    #[error("{0}")]
    Script(String),
}
