//! Record lifecycle hook bus.
//!
//! Subscribers register async callbacks for record create/update/delete
//! events across all collections. Events are delivered by
//! [`crate::CollectionOps`] after the write has been persisted and
//! before the mutating call returns, so a subscriber that mirrors state
//! (the lambda control plane) is always up to date by the time the
//! caller observes success.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

use tracing::debug;

/// A record lifecycle event.
#[derive(Debug, Clone)]
pub struct RecordEvent {
    pub collection: String,
    pub id: String,
    /// The record value after the mutation (for deletes, the value that
    /// was removed).
    pub record: serde_json::Value,
    /// The previous value, set only for update events.
    pub old_record: Option<serde_json::Value>,
}

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// An async hook callback.
pub type HookFn = Arc<dyn Fn(RecordEvent) -> BoxFuture + Send + Sync>;

/// Fan-out bus for record lifecycle events.
///
/// Subscription happens during host bootstrap; delivery happens on every
/// mutation. The subscriber lists are cloned out of the lock before the
/// futures are awaited, so a slow subscriber never holds the lock.
#[derive(Default)]
pub struct RecordHooks {
    on_create: RwLock<Vec<HookFn>>,
    on_update: RwLock<Vec<HookFn>>,
    on_delete: RwLock<Vec<HookFn>>,
}

impl RecordHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe_create(&self, hook: HookFn) {
        self.on_create.write().expect("hooks lock").push(hook);
    }

    pub fn subscribe_update(&self, hook: HookFn) {
        self.on_update.write().expect("hooks lock").push(hook);
    }

    pub fn subscribe_delete(&self, hook: HookFn) {
        self.on_delete.write().expect("hooks lock").push(hook);
    }

    /// Deliver a create event to every subscriber, in subscription order.
    pub async fn fire_created(&self, event: RecordEvent) {
        let hooks = self.on_create.read().expect("hooks lock").clone();
        debug!(collection = %event.collection, id = %event.id, subscribers = hooks.len(), "record created");
        for hook in hooks {
            hook(event.clone()).await;
        }
    }

    /// Deliver an update event to every subscriber, in subscription order.
    pub async fn fire_updated(&self, event: RecordEvent) {
        let hooks = self.on_update.read().expect("hooks lock").clone();
        debug!(collection = %event.collection, id = %event.id, subscribers = hooks.len(), "record updated");
        for hook in hooks {
            hook(event.clone()).await;
        }
    }

    /// Deliver a delete event to every subscriber, in subscription order.
    pub async fn fire_deleted(&self, event: RecordEvent) {
        let hooks = self.on_delete.read().expect("hooks lock").clone();
        debug!(collection = %event.collection, id = %event.id, subscribers = hooks.len(), "record deleted");
        for hook in hooks {
            hook(event.clone()).await;
        }
    }
}
