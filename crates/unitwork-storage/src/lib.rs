//! unitwork-storage — transaction resources for UnitWork.
//!
//! Backends:
//! - [`memory`] — in-memory staged transactions (dev/testing, no persistence)
//! - `sqlite` — SQLite via `sqlx` (feature `sqlite`)
//! - `postgres` — PostgreSQL via `sqlx` (feature `postgres`)
//!
//! Every backend accepts [`Document`] as a work item, so a batch of JSON
//! documents can be flushed through any of them unchanged.

pub mod document;
pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use document::Document;
pub use memory::{MemoryStore, MemoryTx, StoreStats};
