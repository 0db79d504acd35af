//! Persistence layer for funnel sessions.
//!
//! Sessions persist their snapshot as one JSON value per key. The core only
//! sees the `SessionStore` trait; `LibSqlStore` backs the binary and
//! `MemoryStore` backs tests and ephemeral runs.

pub mod libsql_backend;
pub mod memory;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlStore;
pub use memory::MemoryStore;
pub use traits::{SessionStore, session_keys};
