//! Library surface of the Basalt daemon: host wiring and the admin
//! REST API, shared between the `basaltd` binary and the end-to-end
//! tests.

pub mod admin_api;
pub mod host;

pub use host::{build_host, Host};
