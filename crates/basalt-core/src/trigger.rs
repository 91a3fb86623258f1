//! Trigger configuration embedded in each function record.
//!
//! The `triggers` field of a [`crate::FunctionDef`] holds JSON text with
//! up to three recognised keys: `http`, `database`, and `cron`. Unknown
//! keys are ignored so that older hosts tolerate newer records.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error produced when a record's `triggers` text cannot be parsed.
#[derive(Debug, Error)]
#[error("invalid trigger configuration: {0}")]
pub struct TriggerParseError(String);

/// Parsed trigger configuration for one function.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TriggerConfig {
    #[serde(default)]
    pub http: Vec<HttpTriggerSpec>,
    #[serde(default)]
    pub database: Vec<DbTriggerSpec>,
    #[serde(default)]
    pub cron: Vec<CronTriggerSpec>,
}

/// An HTTP trigger: invoke the function for requests matching
/// method + path. The path is used verbatim; no prefix is imposed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HttpTriggerSpec {
    pub method: String,
    pub path: String,
}

/// A database trigger: invoke the function when a record in
/// `collection` sees the given lifecycle event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DbTriggerSpec {
    pub collection: String,
    pub event: DbEvent,
}

/// A cron trigger: invoke the function on a schedule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CronTriggerSpec {
    pub schedule: String,
}

/// Record lifecycle events a database trigger can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbEvent {
    Create,
    Update,
    Delete,
}

impl DbEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            DbEvent::Create => "create",
            DbEvent::Update => "update",
            DbEvent::Delete => "delete",
        }
    }
}

impl std::fmt::Display for DbEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TriggerConfig {
    /// Parse the stringified trigger configuration from a record.
    ///
    /// Empty text parses as an empty configuration (a function with no
    /// triggers is valid, just unreachable).
    pub fn parse(text: &str) -> Result<Self, TriggerParseError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(text).map_err(|e| TriggerParseError(e.to_string()))
    }

    /// Whether this configuration registers anything at all.
    pub fn is_empty(&self) -> bool {
        self.http.is_empty() && self.database.is_empty() && self.cron.is_empty()
    }
}
