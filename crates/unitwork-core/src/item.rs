//! The work-item capability — a domain object that persists its own changes.

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::batch::Phase;
use crate::error::UnitOfWorkError;

/// Trait for domain objects that can be queued in a unit of work.
///
/// Each method performs one mutation through the transaction handle `tx`
/// produced by the current cycle's `begin`. Implementations must not retain
/// `tx` beyond the call.
#[async_trait]
pub trait WorkItem<Tx: Send + Sync + 'static>: Send + Sync {
    async fn create_by_tx(&self, tx: &Tx) -> Result<(), UnitOfWorkError>;

    async fn update_by_tx(&self, tx: &Tx) -> Result<(), UnitOfWorkError>;

    async fn delete_by_tx(&self, tx: &Tx) -> Result<(), UnitOfWorkError>;
}

/// Invoke the `*_by_tx` method of `item` that corresponds to `phase`.
pub(crate) fn perform<'a, Tx: Send + Sync + 'static>(
    item: &'a dyn WorkItem<Tx>,
    phase: Phase,
    tx: &'a Tx,
) -> BoxFuture<'a, Result<(), UnitOfWorkError>> {
    match phase {
        Phase::Create => item.create_by_tx(tx),
        Phase::Update => item.update_by_tx(tx),
        Phase::Delete => item.delete_by_tx(tx),
    }
}
