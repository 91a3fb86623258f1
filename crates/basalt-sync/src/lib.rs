//! basalt-sync: mirrors persisted function records into the runtime.
//!
//! The synchroniser subscribes to lifecycle events on the `lambdas`
//! collection and keeps the trigger registry, the host router, and the
//! cron scheduler in step with what is persisted. The registry is the
//! source of truth; the router is a downstream projection reconciled
//! idempotently whenever either side becomes available.
//!
//! Per-function failures (unparsable triggers, bad cron expressions)
//! are logged and skipped so one broken record never takes down the
//! rest of the collection.

pub mod lifecycle;
pub mod sync;

pub use lifecycle::Lifecycle;
pub use sync::Synchronizer;
