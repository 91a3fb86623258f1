//! basalt-registry: in-memory trigger indices for lambda functions.
//!
//! Three tables map external events back to function ids: HTTP routes
//! keyed `"METHOD:path"`, database triggers keyed `"collection:event"`,
//! and cron jobs keyed by function id. All three live under a single
//! lock so that `replace` is atomic across tables: a concurrent reader
//! observes either the old configuration everywhere or the new one
//! everywhere.

pub mod entries;
pub mod error;
pub mod registry;

pub use entries::{CronJob, DbTrigger, HttpRoute};
pub use error::{RegistryError, RegistryResult};
pub use registry::{CronHandler, TriggerRegistry};
