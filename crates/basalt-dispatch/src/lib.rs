//! basalt-dispatch: adapters between external events and the engine.
//!
//! Three thin dispatchers turn events into invocations: an HTTP handler
//! closure per registered route, one global database-event subscriber
//! that fans out by `(collection, event)`, and a cron callback per
//! schedule. The response projector interprets a script's return value
//! as either a response descriptor or a bare payload and picks the
//! content type.

pub mod cron;
pub mod db;
pub mod http;
pub mod project;

pub use cron::make_cron_handler;
pub use db::DbDispatcher;
pub use http::make_http_handler;
pub use project::{detect_content_type, project_response};
