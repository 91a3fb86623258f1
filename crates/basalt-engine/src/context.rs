//! Invocation context and result types.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// What caused a function to be invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    Http,
    Database,
    Cron,
}

impl TriggerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::Http => "http",
            TriggerKind::Database => "database",
            TriggerKind::Cron => "cron",
        }
    }
}

impl std::fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The slice of an HTTP request exposed to scripts as `$request`.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub method: String,
    pub url: String,
    /// Header multimap rendered as `{name: [values...]}`.
    pub headers: serde_json::Value,
    /// Request entity as text, possibly truncated to the configured cap.
    pub body: String,
}

/// Everything the engine needs to run one invocation.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    pub function_id: String,
    pub trigger: TriggerKind,
    pub request: Option<RequestInfo>,
    pub record: Option<serde_json::Value>,
    pub old_record: Option<serde_json::Value>,
    /// Monotonic start, for duration accounting.
    pub start: Instant,
    /// Wall-clock start in unix seconds, exposed as `$trigger.timestamp`.
    pub started_unix: u64,
}

impl InvocationContext {
    fn new(function_id: String, trigger: TriggerKind) -> Self {
        Self {
            function_id,
            trigger,
            request: None,
            record: None,
            old_record: None,
            start: Instant::now(),
            started_unix: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
        }
    }

    pub fn http(function_id: impl Into<String>, request: RequestInfo) -> Self {
        let mut ctx = Self::new(function_id.into(), TriggerKind::Http);
        ctx.request = Some(request);
        ctx
    }

    pub fn database(
        function_id: impl Into<String>,
        record: serde_json::Value,
        old_record: Option<serde_json::Value>,
    ) -> Self {
        let mut ctx = Self::new(function_id.into(), TriggerKind::Database);
        ctx.record = Some(record);
        ctx.old_record = old_record;
        ctx
    }

    pub fn cron(function_id: impl Into<String>) -> Self {
        Self::new(function_id.into(), TriggerKind::Cron)
    }
}

/// Outcome of one invocation.
#[derive(Debug, Clone)]
pub struct InvocationResult {
    pub success: bool,
    /// The value of the script's final expression, JSON-projected.
    pub output: serde_json::Value,
    pub error: Option<String>,
    pub duration: Duration,
}

impl InvocationResult {
    pub fn ok(output: serde_json::Value, duration: Duration) -> Self {
        Self {
            success: true,
            output,
            error: None,
            duration,
        }
    }

    pub fn fail(error: impl Into<String>, duration: Duration) -> Self {
        Self {
            success: false,
            output: serde_json::Value::Null,
            error: Some(error.into()),
            duration,
        }
    }

    /// The error message, or an empty string for successful results.
    pub fn error_message(&self) -> &str {
        self.error.as_deref().unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_kind_strings() {
        assert_eq!(TriggerKind::Http.as_str(), "http");
        assert_eq!(TriggerKind::Database.to_string(), "database");
        assert_eq!(TriggerKind::Cron.as_str(), "cron");
    }

    #[test]
    fn http_context_carries_request() {
        let ctx = InvocationContext::http(
            "fn_1",
            RequestInfo {
                method: "GET".to_string(),
                url: "/ping".to_string(),
                headers: serde_json::json!({}),
                body: String::new(),
            },
        );
        assert_eq!(ctx.trigger, TriggerKind::Http);
        assert!(ctx.request.is_some());
        assert!(ctx.record.is_none());
        assert!(ctx.started_unix > 1_700_000_000);
    }

    #[test]
    fn database_context_carries_records() {
        let ctx = InvocationContext::database(
            "fn_1",
            serde_json::json!({"title": "new"}),
            Some(serde_json::json!({"title": "old"})),
        );
        assert_eq!(ctx.trigger, TriggerKind::Database);
        assert!(ctx.record.is_some());
        assert!(ctx.old_record.is_some());
        assert!(ctx.request.is_none());
    }

    #[test]
    fn failure_result_has_message_and_null_output() {
        let result = InvocationResult::fail("boom", Duration::from_millis(5));
        assert!(!result.success);
        assert_eq!(result.error_message(), "boom");
        assert!(result.output.is_null());
    }
}
