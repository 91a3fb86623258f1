//! The execution engine.
//!
//! `ScriptEngine::execute` loads the function record, refuses missing or
//! disabled functions, then evaluates the source in a brand-new QuickJS
//! runtime on a blocking thread. The caller waits at most the function's
//! configured budget; a stranded evaluation is abandoned and terminated
//! by the runtime's interrupt handler shortly after the deadline, and
//! its output is discarded.

use std::sync::Arc;
use std::time::{Duration, Instant};

use basalt_core::PluginConfig;
use basalt_state::RecordStore;
use rquickjs::{Context, Runtime};
use tracing::{debug, warn};

use crate::bind::{self, BoundContext};
use crate::context::{InvocationContext, InvocationResult};
use crate::error::{EngineError, EngineResult};
use crate::template::TemplateRegistry;

const ERR_NOT_FOUND: &str = "function not found";
const ERR_DISABLED: &str = "function is disabled";
const ERR_TIMEOUT: &str = "execution timeout";

/// Executes lambda functions in isolated, per-invocation runtimes.
///
/// Cheap to share: clones of the store handle and the template registry
/// are captured per invocation, all other state is local to the call.
pub struct ScriptEngine {
    store: RecordStore,
    templates: Arc<TemplateRegistry>,
    config: PluginConfig,
}

impl ScriptEngine {
    pub fn new(store: RecordStore, config: PluginConfig) -> Self {
        Self {
            store,
            templates: Arc::new(TemplateRegistry::new()),
            config,
        }
    }

    pub fn with_templates(mut self, templates: Arc<TemplateRegistry>) -> Self {
        self.templates = templates;
        self
    }

    pub fn templates(&self) -> Arc<TemplateRegistry> {
        self.templates.clone()
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    /// Run one invocation to completion or deadline.
    ///
    /// Never returns an `Err`: every failure mode is folded into the
    /// result so dispatchers always have something to project.
    pub async fn execute(&self, inv: InvocationContext) -> InvocationResult {
        let function = match self.store.get_function(&inv.function_id) {
            Ok(Some(function)) => function,
            Ok(None) => return InvocationResult::fail(ERR_NOT_FOUND, inv.start.elapsed()),
            Err(e) => {
                warn!(function_id = %inv.function_id, error = %e, "function lookup failed");
                return InvocationResult::fail(
                    format!("{ERR_NOT_FOUND}: {e}"),
                    inv.start.elapsed(),
                );
            }
        };

        if !function.enabled {
            return InvocationResult::fail(ERR_DISABLED, inv.start.elapsed());
        }

        let budget = function
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.config.default_timeout());
        let deadline = Instant::now() + budget;

        let bound = BoundContext::prepare(&function, &inv);
        let code = function.code.clone();
        let store = self.store.clone();
        let templates = self.templates.clone();
        let max_memory = self.config.max_memory_bytes;

        let task = tokio::task::spawn_blocking(move || {
            run_script(&code, bound, store, templates, deadline, max_memory)
        });

        let result = match tokio::time::timeout(budget, task).await {
            Ok(Ok(Ok(output))) => InvocationResult::ok(output, inv.start.elapsed()),
            Ok(Ok(Err(error))) => {
                InvocationResult::fail(error.to_string(), inv.start.elapsed())
            }
            Ok(Err(join_error)) => {
                warn!(function_id = %inv.function_id, error = %join_error, "script task failed");
                InvocationResult::fail(
                    format!("script execution failed: {join_error}"),
                    inv.start.elapsed(),
                )
            }
            // Deadline elapsed: the blocking task is orphaned. Its
            // interrupt handler will terminate it; its output is lost.
            Err(_) => InvocationResult::fail(ERR_TIMEOUT, inv.start.elapsed()),
        };

        debug!(
            function_id = %inv.function_id,
            trigger = %inv.trigger,
            success = result.success,
            duration_ms = result.duration.as_millis() as u64,
            "invocation finished"
        );
        result
    }
}

/// Evaluate source in a fresh runtime. Runs on a blocking thread.
fn run_script(
    code: &str,
    bound: BoundContext,
    store: RecordStore,
    templates: Arc<TemplateRegistry>,
    deadline: Instant,
    max_memory: usize,
) -> EngineResult<serde_json::Value> {
    let runtime = Runtime::new().map_err(|e| EngineError::Runtime(e.to_string()))?;
    runtime.set_memory_limit(max_memory);
    runtime.set_interrupt_handler(Some(Box::new(move || Instant::now() >= deadline)));

    let context = Context::full(&runtime).map_err(|e| EngineError::Runtime(e.to_string()))?;

    context.with(|ctx| {
        bind::install(&ctx, &bound, store, templates)
            .map_err(|e| EngineError::Bind(e.to_string()))?;

        match ctx.eval::<rquickjs::Value, _>(code.as_bytes().to_vec()) {
            Ok(value) => {
                let json = ctx
                    .json_stringify(value)
                    .map_err(|e| script_error(&ctx, e, deadline))?;
                match json {
                    Some(text) => {
                        let text = text.to_string().map_err(|e| {
                            EngineError::Script(format!("unserializable return value: {e}"))
                        })?;
                        serde_json::from_str(&text).map_err(|e| {
                            EngineError::Script(format!("unserializable return value: {e}"))
                        })
                    }
                    // `undefined` and other non-JSON values project to null.
                    None => Ok(serde_json::Value::Null),
                }
            }
            Err(e) => Err(script_error(&ctx, e, deadline)),
        }
    })
}

/// Fold an evaluation error into a message, attributing post-deadline
/// failures to the timeout rather than to the interrupt artifact.
fn script_error(
    ctx: &rquickjs::Ctx<'_>,
    error: rquickjs::Error,
    deadline: Instant,
) -> EngineError {
    if Instant::now() >= deadline {
        return EngineError::Script(ERR_TIMEOUT.to_string());
    }
    match error {
        rquickjs::Error::Exception => EngineError::Script(caught_message(ctx)),
        other => EngineError::Script(other.to_string()),
    }
}

/// Extract a message from the pending exception.
fn caught_message(ctx: &rquickjs::Ctx<'_>) -> String {
    let caught = ctx.catch();
    if let Some(obj) = caught.as_object() {
        if let Ok(message) = obj.get::<_, String>("message") {
            return message;
        }
    }
    ctx.json_stringify(caught)
        .ok()
        .flatten()
        .and_then(|s| s.to_string().ok())
        .unwrap_or_else(|| "unknown script error".to_string())
}
