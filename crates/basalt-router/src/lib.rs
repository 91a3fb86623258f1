//! basalt-router: the host's dynamic HTTP router.
//!
//! Unlike a compiled-in route table, lambda routes come and go at
//! runtime as function records change, and the serving socket is
//! already live when most of them are registered. The router is
//! therefore a lock-protected `"METHOD:path"` map consulted on every
//! request, with a hyper HTTP/1.1 accept loop in front of it.
//!
//! ```text
//! HTTP client
//!   │
//!   ▼
//! hyper server (one task per connection)
//!   │
//!   ├── look up "METHOD:path" in the route table
//!   ├── found    → invoke the registered handler
//!   └── missing  → 404
//! ```

pub mod router;

pub use router::{BoxResponseFuture, HostRouter, RouteHandler};
