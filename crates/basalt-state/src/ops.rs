//! Hook-firing mutation path for collections.
//!
//! `CollectionOps` pairs a [`RecordStore`] with a [`RecordHooks`] bus.
//! Every mutation persists first and then awaits all subscribers before
//! returning, so lifecycle mirrors (the lambda control plane, database
//! dispatchers) observe the transition before the caller does.

use std::sync::Arc;

use basalt_core::{FunctionDef, LAMBDAS_COLLECTION};

use crate::error::StateResult;
use crate::hooks::{RecordEvent, RecordHooks};
use crate::store::RecordStore;

/// Mutation front-end that mirrors writes into the hook bus.
#[derive(Clone)]
pub struct CollectionOps {
    store: RecordStore,
    hooks: Arc<RecordHooks>,
}

impl CollectionOps {
    pub fn new(store: RecordStore, hooks: Arc<RecordHooks>) -> Self {
        Self { store, hooks }
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn hooks(&self) -> &Arc<RecordHooks> {
        &self.hooks
    }

    // ── Lambda functions ───────────────────────────────────────────

    /// Persist a function definition and fire created/updated hooks.
    ///
    /// Whether this is a create or an update is decided by the presence
    /// of a prior record with the same id.
    pub async fn save_function(&self, def: &FunctionDef) -> StateResult<()> {
        let previous = self.store.get_function(&def.id)?;
        self.store.put_function(def)?;

        let record = serde_json::to_value(def)
            .map_err(|e| crate::StateError::Serialize(e.to_string()))?;
        let event = RecordEvent {
            collection: LAMBDAS_COLLECTION.to_string(),
            id: def.id.clone(),
            record,
            old_record: previous
                .map(|p| serde_json::to_value(p).unwrap_or(serde_json::Value::Null)),
        };

        if event.old_record.is_some() {
            self.hooks.fire_updated(event).await;
        } else {
            self.hooks.fire_created(event).await;
        }
        Ok(())
    }

    /// Delete a function definition and fire delete hooks.
    /// Returns false (and fires nothing) if the record did not exist.
    pub async fn delete_function(&self, id: &str) -> StateResult<bool> {
        let Some(previous) = self.store.get_function(id)? else {
            return Ok(false);
        };
        self.store.delete_function(id)?;

        let record = serde_json::to_value(&previous)
            .map_err(|e| crate::StateError::Serialize(e.to_string()))?;
        self.hooks
            .fire_deleted(RecordEvent {
                collection: LAMBDAS_COLLECTION.to_string(),
                id: id.to_string(),
                record,
                old_record: None,
            })
            .await;
        Ok(true)
    }

    // ── Generic records ────────────────────────────────────────────

    /// Persist a user-data record and fire created/updated hooks.
    pub async fn save_record(
        &self,
        collection: &str,
        id: &str,
        value: serde_json::Value,
    ) -> StateResult<()> {
        let previous = self.store.get_record(collection, id)?;
        self.store.put_record(collection, id, &value)?;

        let event = RecordEvent {
            collection: collection.to_string(),
            id: id.to_string(),
            record: value,
            old_record: previous,
        };
        if event.old_record.is_some() {
            self.hooks.fire_updated(event).await;
        } else {
            self.hooks.fire_created(event).await;
        }
        Ok(())
    }

    /// Delete a user-data record and fire delete hooks.
    pub async fn delete_record(&self, collection: &str, id: &str) -> StateResult<bool> {
        let Some(previous) = self.store.get_record(collection, id)? else {
            return Ok(false);
        };
        self.store.delete_record(collection, id)?;

        self.hooks
            .fire_deleted(RecordEvent {
                collection: collection.to_string(),
                id: id.to_string(),
                record: previous,
                old_record: None,
            })
            .await;
        Ok(true)
    }
}
