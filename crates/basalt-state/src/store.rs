//! RecordStore: redb-backed persistence for lambda definitions and
//! generic user-data collections.
//!
//! Tables are created lazily on first write. A read against a table that
//! has never been written reports [`StateError::CollectionMissing`] for
//! list operations (the control plane logs it and continues) and an empty
//! result for point lookups.

use std::path::Path;
use std::sync::Arc;

use basalt_core::FunctionDef;
use redb::{Database, ReadableTable, TableError};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::{LAMBDAS, RECORDS};

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe record store backed by redb.
#[derive(Clone)]
pub struct RecordStore {
    db: Arc<Database>,
}

impl RecordStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        debug!(?path, "record store opened");
        Ok(Self { db: Arc::new(db) })
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        debug!("in-memory record store opened");
        Ok(Self { db: Arc::new(db) })
    }

    // ── Lambda functions ───────────────────────────────────────────

    /// Insert or update a function definition.
    pub fn put_function(&self, def: &FunctionDef) -> StateResult<()> {
        let value = serde_json::to_vec(def).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(LAMBDAS).map_err(map_err!(Table))?;
            table
                .insert(def.id.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(id = %def.id, name = %def.name, "function stored");
        Ok(())
    }

    /// Get a function definition by record id.
    ///
    /// Returns `Ok(None)` both for an unknown id and for a store where
    /// the collection has never been written.
    pub fn get_function(&self, id: &str) -> StateResult<Option<FunctionDef>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = match txn.open_table(LAMBDAS) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(StateError::Table(e.to_string())),
        };
        match table.get(id).map_err(map_err!(Read))? {
            Some(guard) => {
                let def: FunctionDef =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(def))
            }
            None => Ok(None),
        }
    }

    /// List every function definition.
    pub fn list_functions(&self) -> StateResult<Vec<FunctionDef>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = match txn.open_table(LAMBDAS) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => {
                return Err(StateError::CollectionMissing(
                    basalt_core::LAMBDAS_COLLECTION.to_string(),
                ))
            }
            Err(e) => return Err(StateError::Table(e.to_string())),
        };
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let def: FunctionDef =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(def);
        }
        Ok(results)
    }

    /// List function definitions with `enabled = true`.
    pub fn list_enabled_functions(&self) -> StateResult<Vec<FunctionDef>> {
        let mut functions = self.list_functions()?;
        functions.retain(|f| f.enabled);
        Ok(functions)
    }

    /// Delete a function definition. Returns true if it existed.
    pub fn delete_function(&self, id: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(LAMBDAS).map_err(map_err!(Table))?;
            existed = table.remove(id).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%id, existed, "function deleted");
        Ok(existed)
    }

    // ── Generic records ────────────────────────────────────────────

    /// Insert or update a record in a user-data collection.
    pub fn put_record(
        &self,
        collection: &str,
        id: &str,
        value: &serde_json::Value,
    ) -> StateResult<()> {
        let key = record_key(collection, id);
        let bytes = serde_json::to_vec(value).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(RECORDS).map_err(map_err!(Table))?;
            table
                .insert(key.as_str(), bytes.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Get a record from a user-data collection.
    pub fn get_record(&self, collection: &str, id: &str) -> StateResult<Option<serde_json::Value>> {
        let key = record_key(collection, id);
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = match txn.open_table(RECORDS) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(StateError::Table(e.to_string())),
        };
        match table.get(key.as_str()).map_err(map_err!(Read))? {
            Some(guard) => {
                let value: serde_json::Value =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// List all records in a user-data collection.
    pub fn list_records(&self, collection: &str) -> StateResult<Vec<serde_json::Value>> {
        let prefix = format!("{collection}:");
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = match txn.open_table(RECORDS) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(StateError::Table(e.to_string())),
        };
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if key.value().starts_with(&prefix) {
                let record: serde_json::Value =
                    serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
                results.push(record);
            }
        }
        Ok(results)
    }

    /// Delete a record from a user-data collection. Returns true if it existed.
    pub fn delete_record(&self, collection: &str, id: &str) -> StateResult<bool> {
        let key = record_key(collection, id);
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(RECORDS).map_err(map_err!(Table))?;
            existed = table.remove(key.as_str()).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(existed)
    }
}

/// Composite key for the generic records table.
fn record_key(collection: &str, id: &str) -> String {
    format!("{collection}:{id}")
}
