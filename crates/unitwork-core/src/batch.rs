//! Pending batch — the mutations queued for the next commit cycle.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::item::WorkItem;

/// One of the three mutation phases of a commit cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Create,
    Update,
    Delete,
}

impl Phase {
    /// Execution order within a cycle. Later phases may depend on earlier ones.
    pub const ORDER: [Phase; 3] = [Phase::Create, Phase::Update, Phase::Delete];
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// Number of queued items per phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCounts {
    pub creates: usize,
    pub updates: usize,
    pub deletes: usize,
}

impl BatchCounts {
    pub fn total(&self) -> usize {
        self.creates + self.updates + self.deletes
    }
}

/// Three append-only queues of work items, one per [`Phase`].
///
/// Items are held by shared ownership only until the batch is cleared at the
/// end of a cycle. The same item may be queued any number of times; nothing
/// is deduplicated.
pub struct PendingBatch<Tx: Send + Sync + 'static> {
    creates: Vec<Arc<dyn WorkItem<Tx>>>,
    updates: Vec<Arc<dyn WorkItem<Tx>>>,
    deletes: Vec<Arc<dyn WorkItem<Tx>>>,
}

impl<Tx: Send + Sync + 'static> PendingBatch<Tx> {
    pub fn new() -> Self {
        Self {
            creates: vec![],
            updates: vec![],
            deletes: vec![],
        }
    }

    /// Append an item to the queue of `phase`.
    pub fn push(&mut self, phase: Phase, item: Arc<dyn WorkItem<Tx>>) {
        match phase {
            Phase::Create => self.creates.push(item),
            Phase::Update => self.updates.push(item),
            Phase::Delete => self.deletes.push(item),
        }
    }

    /// Items queued for `phase`, in insertion order.
    pub fn items(&self, phase: Phase) -> &[Arc<dyn WorkItem<Tx>>] {
        match phase {
            Phase::Create => &self.creates,
            Phase::Update => &self.updates,
            Phase::Delete => &self.deletes,
        }
    }

    pub fn counts(&self) -> BatchCounts {
        BatchCounts {
            creates: self.creates.len(),
            updates: self.updates.len(),
            deletes: self.deletes.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.counts().total()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every queued item.
    pub fn clear(&mut self) {
        self.creates.clear();
        self.updates.clear();
        self.deletes.clear();
    }
}

impl<Tx: Send + Sync + 'static> Default for PendingBatch<Tx> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Tx: Send + Sync + 'static> fmt::Debug for PendingBatch<Tx> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingBatch")
            .field("counts", &self.counts())
            .finish()
    }
}
