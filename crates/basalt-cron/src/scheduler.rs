//! The cron scheduler.
//!
//! One tokio task per job. Each task computes the next occurrence of its
//! schedule in UTC, sleeps until then, and invokes the job callback.
//! Shutdown is propagated through a watch channel, the same way the
//! host's other background loops stop.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use cron::Schedule;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{CronError, CronResult};

/// Callback invoked on every tick of a job's schedule.
pub type JobCallback = Arc<dyn Fn() + Send + Sync>;

struct JobSlot {
    schedule: Schedule,
    callback: JobCallback,
    handle: Option<JoinHandle<()>>,
}

struct Inner {
    jobs: HashMap<String, JobSlot>,
    shutdown_tx: Option<watch::Sender<bool>>,
}

/// Cron scheduler keyed by job id.
///
/// `add` upserts: scheduling an id that already exists replaces the old
/// job and stops its task. Jobs added while the scheduler is running
/// start ticking immediately; jobs added before `start()` are held.
pub struct CronScheduler {
    inner: Mutex<Inner>,
}

impl CronScheduler {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                jobs: HashMap::new(),
                shutdown_tx: None,
            }),
        }
    }

    /// Parse a cron expression, accepting both the classic five-field
    /// form and the six/seven-field form with seconds.
    pub fn parse_expression(expr: &str) -> CronResult<Schedule> {
        let normalized = if expr.split_whitespace().count() == 5 {
            format!("0 {expr}")
        } else {
            expr.to_string()
        };
        Schedule::from_str(&normalized).map_err(|e| CronError::InvalidExpression {
            expr: expr.to_string(),
            reason: e.to_string(),
        })
    }

    /// Add (or replace) a job. Started schedulers spawn the job task
    /// immediately.
    pub fn add(&self, id: &str, expr: &str, callback: JobCallback) -> CronResult<()> {
        let schedule = Self::parse_expression(expr)?;
        let mut inner = self.inner.lock().expect("scheduler lock");

        let handle = inner.shutdown_tx.as_ref().map(|tx| {
            spawn_job(
                id.to_string(),
                schedule.clone(),
                callback.clone(),
                tx.subscribe(),
            )
        });

        if let Some(old) = inner.jobs.insert(
            id.to_string(),
            JobSlot {
                schedule,
                callback,
                handle,
            },
        ) {
            if let Some(handle) = old.handle {
                handle.abort();
            }
            warn!(job_id = %id, "cron job replaced");
        }

        debug!(job_id = %id, %expr, "cron job added");
        Ok(())
    }

    /// Remove a job and stop its task. Returns true if it existed.
    pub fn remove(&self, id: &str) -> bool {
        let mut inner = self.inner.lock().expect("scheduler lock");
        match inner.jobs.remove(id) {
            Some(slot) => {
                if let Some(handle) = slot.handle {
                    handle.abort();
                }
                debug!(job_id = %id, "cron job removed");
                true
            }
            None => false,
        }
    }

    /// Start ticking. Spawns a task for every held job; a no-op when
    /// already started.
    pub fn start(&self) {
        let mut inner = self.inner.lock().expect("scheduler lock");
        if inner.shutdown_tx.is_some() {
            return;
        }
        let (tx, _) = watch::channel(false);
        for (id, slot) in inner.jobs.iter_mut() {
            slot.handle = Some(spawn_job(
                id.clone(),
                slot.schedule.clone(),
                slot.callback.clone(),
                tx.subscribe(),
            ));
        }
        let count = inner.jobs.len();
        inner.shutdown_tx = Some(tx);
        info!(jobs = count, "cron scheduler started");
    }

    /// Stop ticking. Held jobs survive and can be restarted.
    pub fn stop(&self) {
        let mut inner = self.inner.lock().expect("scheduler lock");
        let Some(tx) = inner.shutdown_tx.take() else {
            return;
        };
        let _ = tx.send(true);
        for slot in inner.jobs.values_mut() {
            if let Some(handle) = slot.handle.take() {
                handle.abort();
            }
        }
        info!("cron scheduler stopped");
    }

    pub fn is_started(&self) -> bool {
        self.inner.lock().expect("scheduler lock").shutdown_tx.is_some()
    }

    /// Ids of all registered jobs, in no particular order.
    pub fn job_ids(&self) -> Vec<String> {
        self.inner
            .lock()
            .expect("scheduler lock")
            .jobs
            .keys()
            .cloned()
            .collect()
    }
}

impl Default for CronScheduler {
    fn default() -> Self {
        Self::new()
    }
}

fn spawn_job(
    id: String,
    schedule: Schedule,
    callback: JobCallback,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let now = Utc::now();
            let Some(next) = schedule.after(&now).next() else {
                debug!(job_id = %id, "schedule exhausted, job task exiting");
                break;
            };
            let wait = (next - now).to_std().unwrap_or_default();

            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    debug!(job_id = %id, "cron tick");
                    (callback)();
                }
                _ = shutdown.changed() => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn counting_callback(counter: Arc<AtomicUsize>) -> JobCallback {
        Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn five_field_expressions_are_accepted() {
        assert!(CronScheduler::parse_expression("*/1 * * * *").is_ok());
        assert!(CronScheduler::parse_expression("0 9 * * 1").is_ok());
    }

    #[test]
    fn six_field_expressions_are_accepted() {
        assert!(CronScheduler::parse_expression("*/30 * * * * *").is_ok());
    }

    #[test]
    fn garbage_expressions_are_rejected() {
        let err = CronScheduler::parse_expression("every tuesday").unwrap_err();
        assert!(err.to_string().contains("every tuesday"));
        assert!(CronScheduler::parse_expression("* * *").is_err());
    }

    #[tokio::test]
    async fn add_and_remove_jobs() {
        let scheduler = CronScheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));

        scheduler
            .add("job-1", "*/5 * * * *", counting_callback(counter.clone()))
            .unwrap();
        scheduler
            .add("job-2", "*/5 * * * *", counting_callback(counter))
            .unwrap();

        let mut ids = scheduler.job_ids();
        ids.sort();
        assert_eq!(ids, ["job-1", "job-2"]);

        assert!(scheduler.remove("job-1"));
        assert!(!scheduler.remove("job-1"));
        assert_eq!(scheduler.job_ids(), ["job-2"]);
    }

    #[tokio::test]
    async fn add_with_bad_expression_registers_nothing() {
        let scheduler = CronScheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));
        assert!(scheduler
            .add("job-1", "nope", counting_callback(counter))
            .is_err());
        assert!(scheduler.job_ids().is_empty());
    }

    #[tokio::test]
    async fn start_is_idempotent_and_stop_resets() {
        let scheduler = CronScheduler::new();
        assert!(!scheduler.is_started());

        scheduler.start();
        scheduler.start();
        assert!(scheduler.is_started());

        scheduler.stop();
        assert!(!scheduler.is_started());
        // Stopping twice is harmless.
        scheduler.stop();
    }

    #[tokio::test]
    async fn every_second_job_ticks_while_started() {
        let scheduler = CronScheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));
        scheduler
            .add("tick", "* * * * * *", counting_callback(counter.clone()))
            .unwrap();

        scheduler.start();
        tokio::time::sleep(Duration::from_millis(2500)).await;
        scheduler.stop();

        let ticks = counter.load(Ordering::SeqCst);
        assert!(ticks >= 2, "expected at least 2 ticks, got {ticks}");

        // No further ticks after stop.
        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert_eq!(counter.load(Ordering::SeqCst), ticks);
    }

    #[tokio::test]
    async fn job_added_after_start_ticks_immediately() {
        let scheduler = CronScheduler::new();
        scheduler.start();

        let counter = Arc::new(AtomicUsize::new(0));
        scheduler
            .add("late", "* * * * * *", counting_callback(counter.clone()))
            .unwrap();

        tokio::time::sleep(Duration::from_millis(1500)).await;
        scheduler.stop();
        assert!(counter.load(Ordering::SeqCst) >= 1);
    }
}
