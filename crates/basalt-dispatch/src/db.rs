//! Database dispatcher: one global subscriber fanning out by
//! `(collection, event)`.
//!
//! Every matched function runs on a detached task so the mutating
//! database operation is never blocked on script execution. Failures
//! are logged and dropped; the mutation has already committed.

use std::sync::Arc;

use basalt_core::DbEvent;
use basalt_engine::{InvocationContext, ScriptEngine};
use basalt_registry::TriggerRegistry;
use basalt_state::{RecordEvent, RecordHooks};
use tracing::{debug, error};

/// The global database-event subscriber.
pub struct DbDispatcher {
    registry: Arc<TriggerRegistry>,
    engine: Arc<ScriptEngine>,
}

impl DbDispatcher {
    pub fn new(registry: Arc<TriggerRegistry>, engine: Arc<ScriptEngine>) -> Arc<Self> {
        Arc::new(Self { registry, engine })
    }

    /// Subscribe to create/update/delete on all collections.
    pub fn install(self: &Arc<Self>, hooks: &RecordHooks) {
        for (event, subscribe) in [
            (
                DbEvent::Create,
                RecordHooks::subscribe_create as fn(&RecordHooks, basalt_state::HookFn),
            ),
            (DbEvent::Update, RecordHooks::subscribe_update),
            (DbEvent::Delete, RecordHooks::subscribe_delete),
        ] {
            let dispatcher = self.clone();
            subscribe(
                hooks,
                Arc::new(move |record_event| {
                    let dispatcher = dispatcher.clone();
                    Box::pin(async move {
                        dispatcher.fan_out(record_event, event);
                    })
                }),
            );
        }
    }

    /// Spawn one detached execution per subscribed function.
    fn fan_out(&self, record_event: RecordEvent, event: DbEvent) {
        let triggers = self
            .registry
            .db_triggers(&record_event.collection, event);
        if triggers.is_empty() {
            return;
        }
        debug!(
            collection = %record_event.collection,
            %event,
            matched = triggers.len(),
            "database dispatch"
        );

        for trigger in triggers {
            let engine = self.engine.clone();
            let old_record = match event {
                DbEvent::Update => record_event.old_record.clone(),
                _ => None,
            };
            let ctx = InvocationContext::database(
                trigger.function_id.clone(),
                record_event.record.clone(),
                old_record,
            );
            tokio::spawn(async move {
                let result = engine.execute(ctx).await;
                if !result.success {
                    error!(
                        function_id = %trigger.function_id,
                        error = %result.error_message(),
                        "database lambda execution failed"
                    );
                }
            });
        }
    }
}
