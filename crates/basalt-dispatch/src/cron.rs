//! Cron dispatcher: the callback armed into every scheduled job.
//!
//! Each tick spawns a detached execution with `trigger_type = "cron"`.
//! Failures are logged, never surfaced; there is no caller to surface
//! them to.

use std::sync::Arc;

use basalt_engine::{InvocationContext, ScriptEngine};
use basalt_registry::CronHandler;
use tracing::error;

/// Build the registry's cron handler.
pub fn make_cron_handler(engine: Arc<ScriptEngine>) -> CronHandler {
    Arc::new(move |function_id: String| {
        let engine = engine.clone();
        tokio::spawn(async move {
            let result = engine
                .execute(InvocationContext::cron(function_id.clone()))
                .await;
            if !result.success {
                error!(
                    %function_id,
                    error = %result.error_message(),
                    "cron lambda execution failed"
                );
            }
        });
    })
}
