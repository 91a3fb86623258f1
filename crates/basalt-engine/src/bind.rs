//! Context binder: populates a fresh runtime with the well-known globals.
//!
//! Six script-facing names are bound per invocation: `$app`, `$template`,
//! `$env`, `$trigger`, `$request` (HTTP only), and `$record` /
//! `$oldRecord` (database only, the latter for updates). A `console`
//! shim forwards to the host log. Host capabilities cross the JS
//! boundary as JSON text through a few native functions; a small
//! bootstrap script wraps them into the ergonomic objects scripts see.

use std::sync::Arc;

use basalt_core::FunctionDef;
use basalt_state::RecordStore;
use rquickjs::{Ctx, Function, Object};
use tracing::{error, info, warn};

use crate::context::InvocationContext;
use crate::template::TemplateRegistry;

/// Wraps the native capability functions into `$app`, `$template`, and
/// `console`, then removes the raw hooks from the global object.
const BOOTSTRAP_JS: &str = r#"
(function () {
    const app = globalThis.__basalt_app;
    globalThis.$app = {
        findRecord: (collection, id) => {
            const raw = app.findRecord(collection, id);
            return raw == null ? null : JSON.parse(raw);
        },
        saveRecord: (collection, id, value) =>
            app.saveRecord(collection, id, JSON.stringify(value)),
        listRecords: (collection) => JSON.parse(app.listRecords(collection)),
    };

    const tpl = globalThis.__basalt_template;
    globalThis.$template = {
        render: (name, data) => tpl.render(name, JSON.stringify(data ?? {})),
    };

    const log = globalThis.__basalt_log;
    globalThis.console = {
        log: (...args) => log("info", args.map(String).join(" ")),
        warn: (...args) => log("warn", args.map(String).join(" ")),
        error: (...args) => log("error", args.map(String).join(" ")),
    };

    delete globalThis.__basalt_app;
    delete globalThis.__basalt_template;
    delete globalThis.__basalt_log;
})();
"#;

/// The JSON-projected values bound into one invocation's runtime.
///
/// Prepared outside the runtime so the blocking execution thread never
/// touches the function record again.
#[derive(Debug, Clone)]
pub struct BoundContext {
    pub function_id: String,
    pub env: serde_json::Value,
    pub trigger: serde_json::Value,
    pub request: Option<serde_json::Value>,
    pub record: Option<serde_json::Value>,
    pub old_record: Option<serde_json::Value>,
}

impl BoundContext {
    /// Project a function record and an invocation context into the
    /// values the binder will install.
    pub fn prepare(function: &FunctionDef, inv: &InvocationContext) -> Self {
        let env = serde_json::to_value(function.environment())
            .unwrap_or_else(|_| serde_json::json!({}));

        let trigger = serde_json::json!({
            "type": inv.trigger.as_str(),
            "function": function.name,
            "timestamp": inv.started_unix,
        });

        let request = inv.request.as_ref().map(|req| {
            serde_json::json!({
                "method": req.method,
                "url": req.url,
                "headers": req.headers,
                "body": req.body,
            })
        });

        Self {
            function_id: function.id.clone(),
            env,
            trigger,
            request,
            record: inv.record.clone(),
            old_record: inv.old_record.clone(),
        }
    }
}

/// Install all bindings into a runtime context.
///
/// Must run before the script is evaluated; the script may overwrite any
/// of these names within its own evaluation, but nothing carries over to
/// the next invocation because the runtime itself does not.
pub fn install(
    ctx: &Ctx<'_>,
    bound: &BoundContext,
    store: RecordStore,
    templates: Arc<TemplateRegistry>,
) -> rquickjs::Result<()> {
    let globals = ctx.globals();

    // Native capability hooks, consumed by the bootstrap script.
    let app = Object::new(ctx.clone())?;
    let find_store = store.clone();
    app.set(
        "findRecord",
        Function::new(ctx.clone(), move |collection: String, id: String| {
            find_store
                .get_record(&collection, &id)
                .ok()
                .flatten()
                .map(|v| v.to_string())
        })?,
    )?;
    let save_store = store.clone();
    app.set(
        "saveRecord",
        Function::new(
            ctx.clone(),
            move |collection: String, id: String, json: String| {
                let Ok(value) = serde_json::from_str::<serde_json::Value>(&json) else {
                    return false;
                };
                save_store.put_record(&collection, &id, &value).is_ok()
            },
        )?,
    )?;
    let list_store = store;
    app.set(
        "listRecords",
        Function::new(ctx.clone(), move |collection: String| {
            let records = list_store.list_records(&collection).unwrap_or_default();
            serde_json::Value::Array(records).to_string()
        })?,
    )?;
    globals.set("__basalt_app", app)?;

    let tpl = Object::new(ctx.clone())?;
    tpl.set(
        "render",
        Function::new(ctx.clone(), move |name: String, data_json: String| {
            let data = serde_json::from_str(&data_json)
                .unwrap_or(serde_json::Value::Object(Default::default()));
            templates.render(&name, &data)
        })?,
    )?;
    globals.set("__basalt_template", tpl)?;

    let function_id = bound.function_id.clone();
    globals.set(
        "__basalt_log",
        Function::new(ctx.clone(), move |level: String, message: String| {
            match level.as_str() {
                "warn" => warn!(function_id = %function_id, "{message}"),
                "error" => error!(function_id = %function_id, "{message}"),
                _ => info!(function_id = %function_id, "{message}"),
            }
        })?,
    )?;

    ctx.eval::<(), _>(BOOTSTRAP_JS)?;

    // Invocation data, bound directly as parsed JSON.
    set_json(ctx, &globals, "$env", &bound.env)?;
    set_json(ctx, &globals, "$trigger", &bound.trigger)?;
    if let Some(request) = &bound.request {
        set_json(ctx, &globals, "$request", request)?;
    }
    if let Some(record) = &bound.record {
        set_json(ctx, &globals, "$record", record)?;
        if let Some(old) = &bound.old_record {
            set_json(ctx, &globals, "$oldRecord", old)?;
        }
    }

    Ok(())
}

fn set_json<'js>(
    ctx: &Ctx<'js>,
    globals: &Object<'js>,
    name: &str,
    value: &serde_json::Value,
) -> rquickjs::Result<()> {
    let js = ctx.json_parse(value.to_string())?;
    globals.set(name, js)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{RequestInfo, TriggerKind};

    fn test_function() -> FunctionDef {
        FunctionDef {
            id: "fn_1".to_string(),
            name: "greeter".to_string(),
            enabled: true,
            code: "1".to_string(),
            timeout_ms: None,
            content_type: None,
            env_vars: r#"{"KEY":"value"}"#.to_string(),
            triggers: String::new(),
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn prepare_builds_trigger_object() {
        let function = test_function();
        let inv = InvocationContext::cron("fn_1");
        let bound = BoundContext::prepare(&function, &inv);

        assert_eq!(bound.trigger["type"], "cron");
        assert_eq!(bound.trigger["function"], "greeter");
        assert!(bound.trigger["timestamp"].as_u64().unwrap() > 1_700_000_000);
        assert!(bound.request.is_none());
        assert!(bound.record.is_none());
    }

    #[test]
    fn prepare_projects_request() {
        let function = test_function();
        let inv = InvocationContext::http(
            "fn_1",
            RequestInfo {
                method: "POST".to_string(),
                url: "/api/x?q=1".to_string(),
                headers: serde_json::json!({"accept": ["text/html"]}),
                body: "payload".to_string(),
            },
        );
        let bound = BoundContext::prepare(&function, &inv);

        let request = bound.request.unwrap();
        assert_eq!(request["method"], "POST");
        assert_eq!(request["url"], "/api/x?q=1");
        assert_eq!(request["body"], "payload");
        assert_eq!(inv.trigger, TriggerKind::Http);
    }

    #[test]
    fn prepare_parses_env_and_tolerates_garbage() {
        let mut function = test_function();
        let inv = InvocationContext::cron("fn_1");

        let bound = BoundContext::prepare(&function, &inv);
        assert_eq!(bound.env["KEY"], "value");

        function.env_vars = "###".to_string();
        let bound = BoundContext::prepare(&function, &inv);
        assert_eq!(bound.env, serde_json::json!({}));
    }

    #[test]
    fn prepare_passes_records_through() {
        let function = test_function();
        let inv = InvocationContext::database(
            "fn_1",
            serde_json::json!({"title": "new"}),
            Some(serde_json::json!({"title": "old"})),
        );
        let bound = BoundContext::prepare(&function, &inv);

        assert_eq!(bound.record.unwrap()["title"], "new");
        assert_eq!(bound.old_record.unwrap()["title"], "old");
    }
}
