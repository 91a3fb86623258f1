//! basalt-core: shared domain types for the Basalt lambda runtime.
//!
//! A lambda function is a user-authored script persisted as a record in
//! the `lambdas` collection. This crate holds the record shape
//! ([`FunctionDef`]), the trigger configuration embedded in it
//! ([`TriggerConfig`]), and the runtime-wide plugin configuration.

pub mod config;
pub mod trigger;
pub mod types;

pub use config::PluginConfig;
pub use trigger::{
    CronTriggerSpec, DbEvent, DbTriggerSpec, HttpTriggerSpec, TriggerConfig, TriggerParseError,
};
pub use types::{ContentType, FunctionDef, LAMBDAS_COLLECTION};
