//! unitwork-core — batch domain mutations and flush them as one transaction.
//!
//! # Architecture
//!
//! ```text
//! consumer.create/update/delete ──► UnitOfWork::mark_*
//!                                        │
//!                     ┌──────────────────┴──────────────────┐
//!              not in scope                           begin_work() scope
//!          (cycle runs immediately)             (items queue in PendingBatch)
//!                     │                                      │
//!                     └─────────────► commit cycle ◄─────────┘ commit_work()
//!
//! commit cycle:  begin ─► creates ─► updates ─► deletes ─► commit
//!                              (any failure) ──► rollback
//!                release ─► reset batch + scope flag
//! ```
//!
//! The engine owns the fixed algorithm; a [`TransactionResource`] supplies
//! the variable steps and each [`WorkItem`] performs its own mutation with
//! the transaction handle it is given.

pub mod batch;
pub mod config;
pub mod engine;
pub mod error;
pub mod item;
pub mod resource;

pub use batch::{BatchCounts, PendingBatch, Phase};
pub use config::UnitOfWorkConfig;
pub use engine::{SharedUnitOfWork, UnitOfWork, WorkScope};
pub use error::UnitOfWorkError;
pub use item::WorkItem;
pub use resource::TransactionResource;
