//! basalt-engine: isolated script execution for lambda functions.
//!
//! Every invocation gets a freshly created QuickJS runtime, populated
//! with the well-known globals (`$app`, `$template`, `$env`, `$trigger`,
//! `$request`, `$record`, `$oldRecord`, `console`) and torn down when the
//! invocation ends. Nothing a script stores in its globals survives into
//! the next invocation.
//!
//! The wall-clock budget is enforced twice: the QuickJS interrupt
//! handler terminates the stranded script shortly after the deadline,
//! and the caller abandons the blocking task at the deadline, so caller
//! latency never depends on interrupt granularity.

pub mod bind;
pub mod context;
pub mod engine;
pub mod error;
pub mod template;

pub use context::{InvocationContext, InvocationResult, RequestInfo, TriggerKind};
pub use engine::ScriptEngine;
pub use error::{EngineError, EngineResult};
pub use template::TemplateRegistry;
