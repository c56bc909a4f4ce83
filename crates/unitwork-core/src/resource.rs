//! Transaction hooks supplied by the consumer.

use async_trait::async_trait;

use crate::error::UnitOfWorkError;

/// The transactional resource a unit of work flushes into.
///
/// The engine calls these hooks in a fixed order per cycle:
/// `begin` → (actions) → `commit` or `rollback` → `release`.
/// The handle is opaque to the engine; it is only threaded through to the
/// hooks and work items of the same cycle.
#[async_trait]
pub trait TransactionResource: Send + Sync {
    /// Transaction handle produced by [`begin`](Self::begin).
    type Tx: Send + Sync + 'static;

    /// Open a new transaction.
    async fn begin(&self) -> Result<Self::Tx, UnitOfWorkError>;

    /// Finalize a transaction after every action succeeded.
    async fn commit(&self, tx: &Self::Tx) -> Result<(), UnitOfWorkError>;

    /// Revert a transaction after an action or the commit failed.
    async fn rollback(&self, tx: &Self::Tx) -> Result<(), UnitOfWorkError>;

    /// Release resources tied to `tx` (e.g. return a connection to its pool).
    ///
    /// Called exactly once per cycle, after `commit` or `rollback`. The
    /// default simply drops the handle.
    async fn release(&self, tx: Self::Tx) -> Result<(), UnitOfWorkError> {
        drop(tx);
        Ok(())
    }
}
