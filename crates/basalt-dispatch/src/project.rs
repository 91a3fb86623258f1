//! Response projector: turns a script's return value into an HTTP
//! response.
//!
//! A structured value containing any of the keys `status`, `headers`,
//! `body` is a response descriptor; anything else is a bare payload
//! serialized as JSON with status 200. String bodies without an explicit
//! `Content-Type` header get the function's configured content type, or
//! the rule-based classifier when that is `auto` or unset.

use basalt_core::{ContentType, FunctionDef};
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use tracing::debug;

const DESCRIPTOR_KEYS: [&str; 3] = ["status", "headers", "body"];

/// Project a script's output value into a response.
///
/// `function` is the definition re-read at response time; `None` (the
/// record vanished mid-flight) falls back to `text/plain` for string
/// bodies.
pub fn project_response(
    output: &serde_json::Value,
    function: Option<&FunctionDef>,
) -> Response<Full<Bytes>> {
    let descriptor = output
        .as_object()
        .filter(|map| DESCRIPTOR_KEYS.iter().any(|k| map.contains_key(*k)));

    let Some(map) = descriptor else {
        // Bare payload: JSON with status 200.
        return json_response(StatusCode::OK, output);
    };

    let status = map
        .get("status")
        .and_then(|v| v.as_f64())
        .and_then(|f| StatusCode::from_u16(f as u16).ok())
        .unwrap_or(StatusCode::OK);

    let mut builder = Response::builder().status(status);
    let mut has_content_type = false;
    if let Some(headers) = map.get("headers").and_then(|v| v.as_object()) {
        for (name, value) in headers {
            let rendered = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            if name.eq_ignore_ascii_case("content-type") {
                has_content_type = true;
            }
            builder = builder.header(name.as_str(), rendered);
        }
    }

    let response = match map.get("body") {
        Some(serde_json::Value::String(body)) => {
            if !has_content_type {
                let content_type = resolve_content_type(function, body);
                debug!(%content_type, "content type resolved for string body");
                builder = builder.header("content-type", content_type);
            }
            builder.body(Full::new(Bytes::from(body.clone())))
        }
        Some(other) => {
            if !has_content_type {
                builder = builder.header("content-type", "application/json");
            }
            builder.body(Full::new(Bytes::from(other.to_string())))
        }
        None => builder.body(Full::new(Bytes::new())),
    };

    response.unwrap_or_else(|e| error_response(&format!("invalid response descriptor: {e}")))
}

/// 200 + application/json + serialized value.
fn json_response(status: StatusCode, value: &serde_json::Value) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Full::new(Bytes::from(value.to_string())))
        .unwrap()
}

/// 500 with a plain-text message.
pub fn error_response(message: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header("content-type", "text/plain")
        .body(Full::new(Bytes::from(message.to_string())))
        .unwrap()
}

/// Pick the content type for a string body: configured MIME when the
/// function declares one, classifier otherwise, `text/plain` when the
/// function record is gone.
fn resolve_content_type(function: Option<&FunctionDef>, body: &str) -> &'static str {
    match function {
        Some(def) => match def.content_type.as_ref().and_then(ContentType::as_mime) {
            Some(mime) => mime,
            None => detect_content_type(body),
        },
        None => "text/plain",
    }
}

/// Rule-based content classifier for `auto` mode.
///
/// Clauses are evaluated in order; the first match wins.
pub fn detect_content_type(content: &str) -> &'static str {
    let content = content.trim();

    if content.starts_with("<!DOCTYPE html")
        || content.starts_with("<html")
        || content.contains("<body")
        || content.contains("<div")
        || content.contains("<span")
    {
        return "text/html";
    }

    if (content.starts_with('{') && content.ends_with('}'))
        || (content.starts_with('[') && content.ends_with(']'))
    {
        return "application/json";
    }

    if content.starts_with("<?xml") || (content.starts_with('<') && content.contains('>')) {
        return "application/xml";
    }

    if content.contains('{')
        && content.contains('}')
        && (content.contains("color:")
            || content.contains("font-")
            || content.contains("margin:")
            || content.contains("padding:"))
    {
        return "text/css";
    }

    if content.contains("function")
        || content.contains("var ")
        || content.contains("let ")
        || content.contains("const ")
        || content.contains("console.log")
        || content.contains("document.")
    {
        return "application/javascript";
    }

    "text/plain"
}
