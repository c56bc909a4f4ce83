//! End-to-end tests: a consumer repository backed by `MemoryStore`.

use std::sync::Arc;

use serde_json::json;
use unitwork_core::{Phase, UnitOfWork, UnitOfWorkConfig, UnitOfWorkError, WorkScope};
use unitwork_storage::{Document, MemoryStore};

// ─── Helpers ──────────────────────────────────────────────────────────────────

/// A domain repository exposing its own create/update/delete on top of the engine.
struct UserRepository {
    uow: UnitOfWork<MemoryStore>,
}

impl UserRepository {
    fn new(store: MemoryStore) -> Self {
        Self {
            uow: UnitOfWork::with_config(store, UnitOfWorkConfig::new("users")),
        }
    }

    async fn create(&mut self, id: &str, name: &str) -> Result<(), UnitOfWorkError> {
        self.uow.mark_create(user(id, name)).await
    }

    async fn rename(&mut self, id: &str, name: &str) -> Result<(), UnitOfWorkError> {
        self.uow.mark_update(user(id, name)).await
    }

    async fn remove(&mut self, id: &str) -> Result<(), UnitOfWorkError> {
        self.uow.mark_delete(user(id, "")).await
    }
}

#[async_trait::async_trait]
impl WorkScope for UserRepository {
    fn begin_work(&mut self) {
        self.uow.begin_work();
    }

    async fn commit_work(&mut self) -> Result<(), UnitOfWorkError> {
        self.uow.commit_work().await
    }
}

fn user(id: &str, name: &str) -> Arc<Document> {
    Arc::new(Document::new("users", id, json!({ "name": name })))
}

fn name_of(store: &MemoryStore, id: &str) -> Option<String> {
    store
        .get("users", id)
        .and_then(|d| d.body["name"].as_str().map(String::from))
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn immediate_mode_persists_each_call() {
    let store = MemoryStore::new();
    let mut repo = UserRepository::new(store.clone());

    repo.create("1", "ada").await.unwrap();
    assert_eq!(name_of(&store, "1").as_deref(), Some("ada"));

    repo.rename("1", "ada lovelace").await.unwrap();
    assert_eq!(name_of(&store, "1").as_deref(), Some("ada lovelace"));

    repo.remove("1").await.unwrap();
    assert!(store.is_empty());

    let stats = store.stats();
    assert_eq!(stats.commits, 3);
    assert_eq!(stats.open_transactions, 0);
}

#[tokio::test]
async fn scoped_batch_is_atomic() {
    let store = MemoryStore::new();
    let mut repo = UserRepository::new(store.clone());

    repo.begin_work();
    repo.create("1", "ada").await.unwrap();
    repo.create("2", "grace").await.unwrap();
    repo.rename("1", "countess").await.unwrap();
    repo.remove("2").await.unwrap();
    assert!(store.is_empty());

    repo.commit_work().await.unwrap();

    assert_eq!(name_of(&store, "1").as_deref(), Some("countess"));
    assert!(store.get("users", "2").is_none());
    assert_eq!(store.stats().commits, 1);
}

#[tokio::test]
async fn failing_batch_leaves_store_untouched() {
    let store = MemoryStore::new();
    store.put(Document::new("users", "1", json!({ "name": "ada" })));
    let mut repo = UserRepository::new(store.clone());

    repo.begin_work();
    repo.create("2", "grace").await.unwrap();
    repo.rename("1", "renamed").await.unwrap();
    repo.rename("missing", "nobody").await.unwrap();
    let err = repo.commit_work().await.unwrap_err();

    assert_eq!(err, UnitOfWorkError::action(Phase::Update, "users/missing not found"));
    assert_eq!(name_of(&store, "1").as_deref(), Some("ada"));
    assert!(store.get("users", "2").is_none());

    let stats = store.stats();
    assert_eq!(stats.rollbacks, 1);
    assert_eq!(stats.commits, 0);
    assert_eq!(stats.open_transactions, 0);
}

#[tokio::test]
async fn concurrent_duplicate_creates_admit_exactly_one() {
    let store = MemoryStore::new();
    let mut repo = UserRepository::new(store.clone());

    repo.begin_work();
    repo.create("1", "first").await.unwrap();
    repo.create("1", "second").await.unwrap();
    let err = repo.commit_work().await.unwrap_err();

    assert_eq!(err.phase(), Some(Phase::Create));
    assert!(store.is_empty());
}

#[tokio::test]
async fn next_cycle_starts_from_an_empty_batch() {
    let store = MemoryStore::new();
    let mut repo = UserRepository::new(store.clone());

    repo.begin_work();
    repo.create("1", "ada").await.unwrap();
    repo.create("1", "dup").await.unwrap();
    assert!(repo.commit_work().await.is_err());

    repo.begin_work();
    repo.create("1", "ada").await.unwrap();
    repo.commit_work().await.unwrap();

    assert_eq!(name_of(&store, "1").as_deref(), Some("ada"));
    assert_eq!(store.stats().commits, 1);
}
