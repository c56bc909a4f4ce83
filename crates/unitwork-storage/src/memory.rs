//! In-memory transaction resource.
//!
//! Each transaction stages its writes in a private overlay. `commit` applies
//! the overlay to the shared document map in one step; `rollback` discards
//! it. Readers outside a transaction only ever see committed documents.
//! Concurrent transactions are not isolated from each other at commit time:
//! the last commit to touch a key wins.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use unitwork_core::{Phase, TransactionResource, UnitOfWorkError, WorkItem};

use crate::document::Document;

type Key = (String, String);

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct Shared {
    documents: Mutex<HashMap<Key, serde_json::Value>>,
    next_tx: AtomicU64,
    open: AtomicUsize,
    commits: AtomicU64,
    rollbacks: AtomicU64,
}

/// Counters describing a [`MemoryStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Transactions begun but not yet released.
    pub open_transactions: usize,
    pub commits: u64,
    pub rollbacks: u64,
    pub documents: usize,
}

/// In-memory document store. Cheap to clone; clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a document directly, bypassing any transaction.
    pub fn put(&self, doc: Document) {
        let key = doc.key();
        lock(&self.shared.documents).insert(key, doc.body);
    }

    /// Read a committed document.
    pub fn get(&self, collection: &str, id: &str) -> Option<Document> {
        lock(&self.shared.documents)
            .get(&(collection.to_string(), id.to_string()))
            .map(|body| Document::new(collection, id, body.clone()))
    }

    /// All committed documents in `collection`, ordered by id.
    pub fn collection(&self, collection: &str) -> Vec<Document> {
        let mut docs: Vec<Document> = lock(&self.shared.documents)
            .iter()
            .filter(|((c, _), _)| c == collection)
            .map(|((c, id), body)| Document::new(c.as_str(), id.as_str(), body.clone()))
            .collect();
        docs.sort_by(|a, b| a.id.cmp(&b.id));
        docs
    }

    pub fn len(&self) -> usize {
        lock(&self.shared.documents).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            open_transactions: self.shared.open.load(Ordering::SeqCst),
            commits: self.shared.commits.load(Ordering::SeqCst),
            rollbacks: self.shared.rollbacks.load(Ordering::SeqCst),
            documents: self.len(),
        }
    }
}

/// Transaction handle for [`MemoryStore`].
pub struct MemoryTx {
    id: u64,
    /// `Some(body)` = write, `None` = delete.
    staged: Mutex<HashMap<Key, Option<serde_json::Value>>>,
    shared: Arc<Shared>,
}

impl MemoryTx {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Number of keys written or deleted in this transaction so far.
    pub fn staged_len(&self) -> usize {
        lock(&self.staged).len()
    }

    /// Read a document as this transaction sees it.
    pub fn get(&self, collection: &str, id: &str) -> Option<serde_json::Value> {
        let key = (collection.to_string(), id.to_string());
        let staged = lock(&self.staged);
        Self::visible(&staged, &self.shared, &key)
    }

    /// Stage a new document. Fails if it is already visible.
    pub fn insert(&self, doc: &Document) -> Result<(), UnitOfWorkError> {
        if self.stage(doc, false, Some(doc.body.clone())) {
            return Ok(());
        }
        Err(UnitOfWorkError::action(
            Phase::Create,
            format!("{} already exists", doc.path()),
        ))
    }

    /// Stage a new body for an existing document.
    pub fn replace(&self, doc: &Document) -> Result<(), UnitOfWorkError> {
        if self.stage(doc, true, Some(doc.body.clone())) {
            return Ok(());
        }
        Err(UnitOfWorkError::action(
            Phase::Update,
            format!("{} not found", doc.path()),
        ))
    }

    /// Stage removal of an existing document.
    pub fn remove(&self, doc: &Document) -> Result<(), UnitOfWorkError> {
        if self.stage(doc, true, None) {
            return Ok(());
        }
        Err(UnitOfWorkError::action(
            Phase::Delete,
            format!("{} not found", doc.path()),
        ))
    }

    /// Stage `write` if the document's visibility matches `must_exist`.
    /// Check and write happen under one lock so concurrent items of a phase
    /// cannot both pass the check.
    fn stage(&self, doc: &Document, must_exist: bool, write: Option<serde_json::Value>) -> bool {
        let key = doc.key();
        let mut staged = lock(&self.staged);
        if Self::visible(&staged, &self.shared, &key).is_some() != must_exist {
            return false;
        }
        staged.insert(key, write);
        true
    }

    fn visible(
        staged: &HashMap<Key, Option<serde_json::Value>>,
        shared: &Shared,
        key: &Key,
    ) -> Option<serde_json::Value> {
        match staged.get(key) {
            Some(write) => write.clone(),
            None => lock(&shared.documents).get(key).cloned(),
        }
    }
}

#[async_trait]
impl TransactionResource for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, UnitOfWorkError> {
        let id = self.shared.next_tx.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.open.fetch_add(1, Ordering::SeqCst);
        debug!(tx = id, "memory transaction opened");
        Ok(MemoryTx {
            id,
            staged: Mutex::new(HashMap::new()),
            shared: self.shared.clone(),
        })
    }

    async fn commit(&self, tx: &MemoryTx) -> Result<(), UnitOfWorkError> {
        let writes: Vec<_> = lock(&tx.staged).drain().collect();
        let mut documents = lock(&self.shared.documents);
        for (key, write) in writes {
            match write {
                Some(body) => documents.insert(key, body),
                None => documents.remove(&key),
            };
        }
        self.shared.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&self, tx: &MemoryTx) -> Result<(), UnitOfWorkError> {
        lock(&tx.staged).clear();
        self.shared.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn release(&self, tx: MemoryTx) -> Result<(), UnitOfWorkError> {
        self.shared.open.fetch_sub(1, Ordering::SeqCst);
        debug!(tx = tx.id, "memory transaction released");
        Ok(())
    }
}

#[async_trait]
impl WorkItem<MemoryTx> for Document {
    async fn create_by_tx(&self, tx: &MemoryTx) -> Result<(), UnitOfWorkError> {
        tx.insert(self)
    }

    async fn update_by_tx(&self, tx: &MemoryTx) -> Result<(), UnitOfWorkError> {
        tx.replace(self)
    }

    async fn delete_by_tx(&self, tx: &MemoryTx) -> Result<(), UnitOfWorkError> {
        tx.remove(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, n: i64) -> Document {
        Document::new("users", id, json!({ "n": n }))
    }

    #[tokio::test]
    async fn staged_writes_invisible_until_commit() {
        let store = MemoryStore::new();
        let tx = store.begin().await.unwrap();

        tx.insert(&doc("1", 1)).unwrap();
        assert_eq!(tx.get("users", "1"), Some(json!({ "n": 1 })));
        assert!(store.get("users", "1").is_none());

        store.commit(&tx).await.unwrap();
        assert_eq!(store.get("users", "1").unwrap().body, json!({ "n": 1 }));
        store.release(tx).await.unwrap();
    }

    #[tokio::test]
    async fn rollback_discards_staged_writes() {
        let store = MemoryStore::new();
        store.put(doc("1", 1));

        let tx = store.begin().await.unwrap();
        tx.replace(&doc("1", 2)).unwrap();
        tx.insert(&doc("2", 2)).unwrap();
        assert_eq!(tx.staged_len(), 2);

        store.rollback(&tx).await.unwrap();
        store.release(tx).await.unwrap();

        assert_eq!(store.get("users", "1").unwrap().body, json!({ "n": 1 }));
        assert!(store.get("users", "2").is_none());
        assert_eq!(store.stats().rollbacks, 1);
    }

    #[tokio::test]
    async fn create_rejects_existing_and_update_rejects_missing() {
        let store = MemoryStore::new();
        store.put(doc("1", 1));
        let tx = store.begin().await.unwrap();

        let err = tx.insert(&doc("1", 5)).unwrap_err();
        assert_eq!(err, UnitOfWorkError::action(Phase::Create, "users/1 already exists"));

        let err = tx.replace(&doc("9", 5)).unwrap_err();
        assert_eq!(err.phase(), Some(Phase::Update));

        tx.remove(&doc("1", 0)).unwrap();
        assert!(tx.get("users", "1").is_none());
        let err = tx.remove(&doc("1", 0)).unwrap_err();
        assert_eq!(err.phase(), Some(Phase::Delete));
    }

    #[tokio::test]
    async fn release_closes_the_transaction() {
        let store = MemoryStore::new();
        let tx = store.begin().await.unwrap();
        assert_eq!(store.stats().open_transactions, 1);

        store.release(tx).await.unwrap();
        assert_eq!(store.stats().open_transactions, 0);
    }

    #[test]
    fn collection_is_sorted_and_filtered() {
        let store = MemoryStore::new();
        store.put(doc("b", 2));
        store.put(doc("a", 1));
        store.put(Document::new("orders", "x", json!(null)));

        let ids: Vec<String> = store.collection("users").into_iter().map(|d| d.id).collect();
        assert_eq!(ids, ["a", "b"]);
        assert_eq!(store.len(), 3);
    }
}
