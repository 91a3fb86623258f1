//! Startup and shutdown ordering for the lambda runtime.
//!
//! Startup: hooks first (so no mutation is missed once traffic is
//! accepted), then the bootstrap load, then router reconciliation, then
//! the cron scheduler. Shutdown only needs to stop the scheduler;
//! runtimes are per-invocation and the registry is process-scoped.

use std::sync::Arc;

use basalt_router::HostRouter;
use basalt_state::RecordHooks;
use tracing::info;

use crate::sync::Synchronizer;

/// Orders the lambda runtime's lifecycle around the host's.
pub struct Lifecycle {
    sync: Arc<Synchronizer>,
}

impl Lifecycle {
    pub fn new(sync: Arc<Synchronizer>) -> Self {
        Self { sync }
    }

    pub fn sync(&self) -> &Arc<Synchronizer> {
        &self.sync
    }

    /// Run the startup sequence. Safe to run again: hook installation
    /// is guarded, registration replaces, attachment is tracked, and
    /// scheduler start is a no-op when already started.
    pub fn startup(&self, hooks: &RecordHooks) {
        self.sync.install_hooks(hooks);
        self.sync.load_functions();
        self.sync.reconcile_router();
        self.sync.registry().scheduler().start();
        info!("lambda runtime started");
    }

    /// The host router has come up (possibly before, possibly after
    /// `startup`).
    pub fn router_available(&self, router: Arc<HostRouter>) {
        self.sync.attach_router(router);
    }

    /// Stop the cron scheduler. Everything else tears down with the
    /// process.
    pub fn shutdown(&self) {
        self.sync.registry().scheduler().stop();
        info!("lambda runtime stopped");
    }
}
