//! redb table definitions for the Basalt record store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized
//! records). The `LAMBDAS` table is keyed by record id; generic user
//! records live in `RECORDS` under composite `{collection}:{id}` keys.

use redb::TableDefinition;

/// Lambda function definitions keyed by record id.
pub const LAMBDAS: TableDefinition<&str, &[u8]> = TableDefinition::new("lambdas");

/// Generic user-data records keyed by `{collection}:{id}`.
pub const RECORDS: TableDefinition<&str, &[u8]> = TableDefinition::new("records");
