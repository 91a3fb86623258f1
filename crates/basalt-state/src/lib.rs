//! basalt-state: embedded record store for the Basalt host.
//!
//! Backed by [redb](https://docs.rs/redb). Holds the `lambdas` collection
//! (typed [`basalt_core::FunctionDef`] records) plus generic user-data
//! collections, and provides the record lifecycle hook bus that the
//! lambda control plane and the database dispatcher subscribe to.
//!
//! The `RecordStore` is `Clone + Send + Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks. Mutations that must be observed
//! by subscribers go through [`CollectionOps`], which persists first and
//! then awaits every hook before returning.

pub mod error;
pub mod hooks;
pub mod ops;
pub mod store;
pub mod tables;

pub use error::{StateError, StateResult};
pub use hooks::{HookFn, RecordEvent, RecordHooks};
pub use ops::CollectionOps;
pub use store::RecordStore;
