//! HTTP dispatcher: one handler closure per registered route.
//!
//! The closure extracts the request into the shape scripts see, runs the
//! engine, and projects the result. Failures become a 500 whose body is
//! the error message; the router never sees an error from a lambda
//! handler.

use std::sync::Arc;

use basalt_engine::{InvocationContext, RequestInfo, ScriptEngine};
use basalt_router::RouteHandler;
use basalt_state::RecordStore;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::Request;
use tracing::debug;

use crate::project;

/// Build the route handler for one function id.
///
/// The function record is re-read on every invocation, so a disabled or
/// deleted function behind a still-attached route yields a clean 500,
/// not a stale execution.
pub fn make_http_handler(
    function_id: String,
    engine: Arc<ScriptEngine>,
    store: RecordStore,
) -> RouteHandler {
    Arc::new(move |req: Request<Incoming>| {
        let function_id = function_id.clone();
        let engine = engine.clone();
        let store = store.clone();
        Box::pin(async move {
            let info =
                extract_request(req, engine.config().max_request_body_bytes).await;
            debug!(%function_id, method = %info.method, url = %info.url, "http dispatch");

            let result = engine
                .execute(InvocationContext::http(function_id.clone(), info))
                .await;

            if !result.success {
                return project::error_response(result.error_message());
            }

            let function = store.get_function(&function_id).ok().flatten();
            project::project_response(&result.output, function.as_ref())
        })
    })
}

/// Pull the pieces of a request that scripts can see.
async fn extract_request(req: Request<Incoming>, body_cap: usize) -> RequestInfo {
    let (parts, body) = req.into_parts();

    let headers = headers_to_json(&parts.headers);
    let body = match body.collect().await {
        Ok(collected) => truncated_utf8(&collected.to_bytes(), body_cap),
        Err(_) => String::new(),
    };

    RequestInfo {
        method: parts.method.to_string(),
        url: parts.uri.to_string(),
        headers,
        body,
    }
}

/// Render the header multimap as `{name: [values...]}`.
fn headers_to_json(headers: &hyper::HeaderMap) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for name in headers.keys() {
        let values: Vec<serde_json::Value> = headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(|v| serde_json::Value::String(v.to_string()))
            .collect();
        map.insert(name.as_str().to_string(), serde_json::Value::Array(values));
    }
    serde_json::Value::Object(map)
}

/// Lossy UTF-8 decode of at most `cap` bytes.
fn truncated_utf8(bytes: &[u8], cap: usize) -> String {
    let slice = if bytes.len() > cap { &bytes[..cap] } else { bytes };
    String::from_utf8_lossy(slice).into_owned()
}
