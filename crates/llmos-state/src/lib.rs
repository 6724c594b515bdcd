//! Durable persistence for the LLMOS Bridge daemon.
//!
//! Two logical relations — `plans` and `actions` — hold the execution
//! state projection used for crash recovery and API reads; a third,
//! `permission_grants`, backs the permission manager. The SQLite backend
//! uses WAL mode, foreign keys, and `rusqlite_migration`-managed schema
//! versioning. An in-memory backend with identical semantics is a
//! first-class backend for tests and ephemeral sessions.

pub mod error;
pub mod memory;
pub mod schema;
pub mod sqlite;
pub mod traits;
pub mod types;

pub use error::StateError;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::StateStore;
pub use types::PlanSummary;
