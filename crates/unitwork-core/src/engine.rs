//! The unit-of-work engine and its commit cycle.
//!
//! # Commit cycle
//! 1. `begin` a transaction. A failure here returns immediately; the batch
//!    and scope flag are left as they were.
//! 2. Run every queued create, then every update, then every delete. Items of
//!    one phase run concurrently; a phase ends only when all of its items
//!    have settled.
//! 3. `commit`. If step 2 or 3 failed, `rollback` instead.
//! 4. `release` the handle, then clear the batch and leave the work scope.
//!
//! The caller sees the outcome of steps 2–3. Rollback and release failures
//! are logged and never replace it.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, warn};

use crate::batch::{PendingBatch, Phase};
use crate::config::UnitOfWorkConfig;
use crate::error::UnitOfWorkError;
use crate::item::{perform, WorkItem};
use crate::resource::TransactionResource;

/// An engine shared between tasks. The mutex serializes whole commit cycles.
pub type SharedUnitOfWork<R> = Arc<tokio::sync::Mutex<UnitOfWork<R>>>;

/// The public unit-of-work interface.
///
/// Implemented by [`UnitOfWork`] and by consumer repositories that wrap one.
#[async_trait]
pub trait WorkScope: Send {
    /// Enter a declared work scope: marks queue instead of executing.
    fn begin_work(&mut self);

    /// Flush everything queued so far as one transaction.
    async fn commit_work(&mut self) -> Result<(), UnitOfWorkError>;
}

/// Batches work items and flushes them through a [`TransactionResource`].
///
/// Consumers typically embed the engine in their own repository type and
/// forward their domain `create`/`update`/`delete` calls to the `mark_*`
/// methods.
///
/// Every state-changing method takes `&mut self`, so two cycles can never
/// overlap on one instance. Use [`SharedUnitOfWork`] to share an engine.
pub struct UnitOfWork<R: TransactionResource> {
    resource: R,
    config: UnitOfWorkConfig,
    pending: PendingBatch<R::Tx>,
    active: bool,
}

impl<R: TransactionResource> UnitOfWork<R> {
    pub fn new(resource: R) -> Self {
        Self::with_config(resource, UnitOfWorkConfig::default())
    }

    pub fn with_config(resource: R, config: UnitOfWorkConfig) -> Self {
        Self {
            resource,
            config,
            pending: PendingBatch::new(),
            active: false,
        }
    }

    /// Wrap the engine for use from several tasks.
    pub fn into_shared(self) -> SharedUnitOfWork<R> {
        Arc::new(tokio::sync::Mutex::new(self))
    }

    pub fn resource(&self) -> &R {
        &self.resource
    }

    pub fn config(&self) -> &UnitOfWorkConfig {
        &self.config
    }

    /// Whether a declared work scope is open.
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn pending(&self) -> &PendingBatch<R::Tx> {
        &self.pending
    }

    /// Enter a declared work scope. No transaction is opened yet.
    pub fn begin_work(&mut self) {
        self.active = true;
    }

    /// Run one commit cycle over everything pending, in or out of a scope.
    pub async fn commit_work(&mut self) -> Result<(), UnitOfWorkError> {
        self.run_cycle().await
    }

    /// Queue `item` for creation; outside a work scope, commit it right away.
    ///
    /// If `begin` fails, the item stays queued and runs in the next cycle,
    /// including one triggered by a later unscoped mark.
    pub async fn mark_create(
        &mut self,
        item: Arc<dyn WorkItem<R::Tx>>,
    ) -> Result<(), UnitOfWorkError> {
        self.mark(Phase::Create, item).await
    }

    /// Queue `item` for update; outside a work scope, commit it right away.
    /// A failed `begin` leaves it queued, as for [`mark_create`](Self::mark_create).
    pub async fn mark_update(
        &mut self,
        item: Arc<dyn WorkItem<R::Tx>>,
    ) -> Result<(), UnitOfWorkError> {
        self.mark(Phase::Update, item).await
    }

    /// Queue `item` for deletion; outside a work scope, commit it right away.
    /// A failed `begin` leaves it queued, as for [`mark_create`](Self::mark_create).
    pub async fn mark_delete(
        &mut self,
        item: Arc<dyn WorkItem<R::Tx>>,
    ) -> Result<(), UnitOfWorkError> {
        self.mark(Phase::Delete, item).await
    }

    async fn mark(
        &mut self,
        phase: Phase,
        item: Arc<dyn WorkItem<R::Tx>>,
    ) -> Result<(), UnitOfWorkError> {
        self.pending.push(phase, item);
        if self.active {
            return Ok(());
        }
        self.run_cycle().await
    }

    async fn run_cycle(&mut self) -> Result<(), UnitOfWorkError> {
        let label = self.config.label.as_str();
        let counts = self.pending.counts();
        debug!(
            label,
            creates = counts.creates,
            updates = counts.updates,
            deletes = counts.deletes,
            "Starting commit cycle"
        );

        let tx = match self.resource.begin().await {
            Ok(tx) => tx,
            Err(e) => {
                warn!(label, error = %e, "Begin failed, batch kept");
                return Err(e);
            }
        };

        let outcome = self.apply(&tx).await;

        match &outcome {
            Ok(()) => info!(label, items = counts.total(), "Unit of work committed"),
            Err(e) => {
                warn!(label, error = %e, "Unit of work failed, rolling back");
                if let Err(rb) = self.resource.rollback(&tx).await {
                    error!(label, error = %rb, "Rollback failed");
                }
            }
        }

        if let Err(e) = self.resource.release(tx).await {
            warn!(label, error = %e, "Release failed");
        }
        self.reset();

        outcome
    }

    async fn apply(&self, tx: &R::Tx) -> Result<(), UnitOfWorkError> {
        for phase in Phase::ORDER {
            self.run_phase(phase, tx).await?;
        }
        self.resource.commit(tx).await
    }

    /// Run every item queued for `phase` and wait for all of them to settle.
    /// The first failure to complete is the phase's error.
    async fn run_phase(&self, phase: Phase, tx: &R::Tx) -> Result<(), UnitOfWorkError> {
        let items = self.pending.items(phase);
        if items.is_empty() {
            return Ok(());
        }

        let fan_out = self.config.fan_out(items.len());
        let pending: Vec<_> = items.iter().map(|item| perform(&**item, phase, tx)).collect();
        let mut results = stream::iter(pending).buffer_unordered(fan_out);

        let mut first_error = None;
        while let Some(result) = results.next().await {
            if let Err(e) = result {
                first_error.get_or_insert(e);
            }
        }

        debug!(
            label = %self.config.label,
            %phase,
            items = items.len(),
            ok = first_error.is_none(),
            "Phase complete"
        );
        first_error.map_or(Ok(()), Err)
    }

    fn reset(&mut self) {
        self.pending.clear();
        self.active = false;
    }
}

#[async_trait]
impl<R: TransactionResource> WorkScope for UnitOfWork<R> {
    fn begin_work(&mut self) {
        UnitOfWork::begin_work(self);
    }

    async fn commit_work(&mut self) -> Result<(), UnitOfWorkError> {
        UnitOfWork::commit_work(self).await
    }
}
