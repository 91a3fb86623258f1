//! basalt-cron: the host's cron scheduler.
//!
//! Jobs are keyed by id and carry a cron expression plus a callback.
//! `start()` spawns one tokio task per job that sleeps until the next
//! occurrence (UTC) and invokes the callback; jobs added while the
//! scheduler is running spawn immediately. `stop()` tears all job tasks
//! down. Classic five-field cron expressions are accepted by prepending
//! a zero seconds field.

pub mod error;
pub mod scheduler;

pub use error::{CronError, CronResult};
pub use scheduler::{CronScheduler, JobCallback};
