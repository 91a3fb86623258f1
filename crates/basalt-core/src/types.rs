//! The persisted lambda function record and its field types.

use serde::{Deserialize, Serialize};

/// Name of the record collection that holds lambda function definitions.
pub const LAMBDAS_COLLECTION: &str = "lambdas";

/// A lambda function definition, as persisted in the `lambdas` collection.
///
/// `env_vars` and `triggers` are stored as JSON text, matching the admin
/// surface where both are free-form editors. Parsing happens at
/// registration time, not at load time, so a bad trigger config in one
/// record never prevents the rest of the collection from deserializing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionDef {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    /// The script source. The value of the final expression is the
    /// function's return value.
    pub code: String,
    /// Per-invocation wall-clock budget in milliseconds. `None` falls
    /// back to the plugin default. Persisted as `timeout`.
    #[serde(default, rename = "timeout")]
    pub timeout_ms: Option<u64>,
    /// Preferred response content type for string bodies. `None` and
    /// `Some(Auto)` both mean "classify the body text". Persisted as
    /// `contentType`.
    #[serde(default, rename = "contentType", skip_serializing_if = "Option::is_none")]
    pub content_type: Option<ContentType>,
    /// JSON object text mapping environment variable names to values.
    #[serde(default)]
    pub env_vars: String,
    /// JSON text of the trigger configuration, see [`crate::TriggerConfig`].
    #[serde(default)]
    pub triggers: String,
    /// Unix timestamp (seconds) when this record was created.
    #[serde(default)]
    pub created_at: u64,
    /// Unix timestamp (seconds) when this record was last updated.
    #[serde(default)]
    pub updated_at: u64,
}

impl FunctionDef {
    /// Parse the stringified `env_vars` field. A missing or unparsable
    /// mapping yields an empty one; scripts always see a `$env` object.
    pub fn environment(&self) -> std::collections::HashMap<String, String> {
        if self.env_vars.trim().is_empty() {
            return Default::default();
        }
        serde_json::from_str(&self.env_vars).unwrap_or_default()
    }
}

/// Response content types a function may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentType {
    #[serde(rename = "auto")]
    Auto,
    #[serde(rename = "text/plain")]
    TextPlain,
    #[serde(rename = "text/html")]
    TextHtml,
    #[serde(rename = "application/json")]
    ApplicationJson,
    #[serde(rename = "text/css")]
    TextCss,
    #[serde(rename = "application/javascript")]
    ApplicationJavascript,
    #[serde(rename = "application/xml")]
    ApplicationXml,
    #[serde(rename = "text/xml")]
    TextXml,
}

impl ContentType {
    /// The MIME string, or `None` for [`ContentType::Auto`] which has no
    /// concrete MIME of its own.
    pub fn as_mime(&self) -> Option<&'static str> {
        match self {
            ContentType::Auto => None,
            ContentType::TextPlain => Some("text/plain"),
            ContentType::TextHtml => Some("text/html"),
            ContentType::ApplicationJson => Some("application/json"),
            ContentType::TextCss => Some("text/css"),
            ContentType::ApplicationJavascript => Some("application/javascript"),
            ContentType::ApplicationXml => Some("application/xml"),
            ContentType::TextXml => Some("text/xml"),
        }
    }
}
