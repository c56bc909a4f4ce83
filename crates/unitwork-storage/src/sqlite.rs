//! SQLite transaction resource for UnitWork.
//!
//! A cycle holds one pooled connection from `begin` to `release`:
//! `begin` acquires it and issues `BEGIN`, `commit`/`rollback` finish the
//! transaction, and `release` hands the connection back to the pool. A
//! connection whose transaction was never finished is closed instead of
//! being returned.
//!
//! # Usage
//! ```rust,no_run
//! use std::sync::Arc;
//! use unitwork_core::UnitOfWork;
//! use unitwork_storage::{sqlite::SqliteResource, Document};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let resource = SqliteResource::open("./documents.db").await?;
//! let mut uow = UnitOfWork::new(resource);
//!
//! uow.begin_work();
//! uow.mark_create(Arc::new(Document::new("users", "1", serde_json::json!({})))).await?;
//! uow.commit_work().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Connection, Row, Sqlite, SqlitePool};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use unitwork_core::{Phase, TransactionResource, UnitOfWorkError, WorkItem};

use crate::document::Document;

fn storage_err(e: sqlx::Error) -> UnitOfWorkError {
    UnitOfWorkError::Storage(e.to_string())
}

/// SQLite-backed transaction resource storing [`Document`]s.
pub struct SqliteResource {
    pool: SqlitePool,
}

impl SqliteResource {
    /// Open (or create) a SQLite database at `path`.
    ///
    /// The path may be a plain file path (`"./docs.db"`) or a full
    /// SQLite URL (`"sqlite:./docs.db?mode=rwc"`).
    pub async fn open(path: &str) -> Result<Self, UnitOfWorkError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let pool = SqlitePool::connect(&url).await.map_err(storage_err)?;

        // WAL mode — readers are not blocked by an open cycle
        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&pool)
            .await
            .map_err(storage_err)?;

        Self::from_pool(pool).await
    }

    /// Open an in-memory SQLite database.
    ///
    /// The pool is pinned to a single connection that never expires, since
    /// each SQLite in-memory connection is its own database.
    pub async fn in_memory() -> Result<Self, UnitOfWorkError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(storage_err)?;

        Self::from_pool(pool).await
    }

    /// Use an existing pool. The `documents` table is created if missing.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, UnitOfWorkError> {
        let resource = Self { pool };
        resource.init_schema().await?;
        Ok(resource)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn init_schema(&self) -> Result<(), UnitOfWorkError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                id         TEXT NOT NULL,
                body       TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(())
    }

    /// Read a committed document.
    pub async fn get(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, UnitOfWorkError> {
        let row = sqlx::query("SELECT body FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        row.map(|r| {
            let body: String = r.get("body");
            serde_json::from_str(&body)
                .map(|body| Document::new(collection, id, body))
                .map_err(|e| UnitOfWorkError::Storage(e.to_string()))
        })
        .transpose()
    }

    /// Number of committed documents in `collection`.
    pub async fn count(&self, collection: &str) -> Result<u64, UnitOfWorkError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM documents WHERE collection = ?")
            .bind(collection)
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;

        let cnt: i64 = row.get("cnt");
        Ok(cnt as u64)
    }
}

/// Transaction handle for [`SqliteResource`]: one pooled connection with an
/// open `BEGIN`.
pub struct SqliteTx {
    conn: Mutex<PoolConnection<Sqlite>>,
    finished: AtomicBool,
}

impl SqliteTx {
    /// Lock the transaction's connection for a statement.
    ///
    /// Work items of one phase run concurrently and take turns on the
    /// connection through this lock.
    pub async fn connection(&self) -> MutexGuard<'_, PoolConnection<Sqlite>> {
        self.conn.lock().await
    }

    async fn finish(&self, statement: &'static str) -> Result<(), sqlx::Error> {
        let mut conn = self.conn.lock().await;
        sqlx::query(statement).execute(&mut **conn).await?;
        self.finished.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl TransactionResource for SqliteResource {
    type Tx = SqliteTx;

    async fn begin(&self) -> Result<SqliteTx, UnitOfWorkError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| UnitOfWorkError::Begin(e.to_string()))?;

        sqlx::query("BEGIN")
            .execute(&mut *conn)
            .await
            .map_err(|e| UnitOfWorkError::Begin(e.to_string()))?;

        debug!("sqlite transaction opened");
        Ok(SqliteTx {
            conn: Mutex::new(conn),
            finished: AtomicBool::new(false),
        })
    }

    async fn commit(&self, tx: &SqliteTx) -> Result<(), UnitOfWorkError> {
        tx.finish("COMMIT")
            .await
            .map_err(|e| UnitOfWorkError::Commit(e.to_string()))
    }

    async fn rollback(&self, tx: &SqliteTx) -> Result<(), UnitOfWorkError> {
        tx.finish("ROLLBACK")
            .await
            .map_err(|e| UnitOfWorkError::Rollback(e.to_string()))
    }

    async fn release(&self, tx: SqliteTx) -> Result<(), UnitOfWorkError> {
        let finished = tx.finished.load(Ordering::SeqCst);
        let conn = tx.conn.into_inner();
        if finished {
            drop(conn);
            debug!("sqlite connection returned to pool");
            return Ok(());
        }

        warn!("sqlite transaction left open, closing connection");
        conn.detach()
            .close()
            .await
            .map_err(|e| UnitOfWorkError::Release(e.to_string()))
    }
}

#[async_trait]
impl WorkItem<SqliteTx> for Document {
    async fn create_by_tx(&self, tx: &SqliteTx) -> Result<(), UnitOfWorkError> {
        let body = serde_json::to_string(&self.body)
            .map_err(|e| UnitOfWorkError::action(Phase::Create, e.to_string()))?;

        let mut conn = tx.connection().await;
        sqlx::query("INSERT INTO documents (collection, id, body) VALUES (?, ?, ?)")
            .bind(&self.collection)
            .bind(&self.id)
            .bind(&body)
            .execute(&mut **conn)
            .await
            .map_err(|e| UnitOfWorkError::action(Phase::Create, format!("{}: {e}", self.path())))?;

        debug!(document = %self.path(), "document inserted");
        Ok(())
    }

    async fn update_by_tx(&self, tx: &SqliteTx) -> Result<(), UnitOfWorkError> {
        let body = serde_json::to_string(&self.body)
            .map_err(|e| UnitOfWorkError::action(Phase::Update, e.to_string()))?;

        let mut conn = tx.connection().await;
        let result = sqlx::query("UPDATE documents SET body = ? WHERE collection = ? AND id = ?")
            .bind(&body)
            .bind(&self.collection)
            .bind(&self.id)
            .execute(&mut **conn)
            .await
            .map_err(|e| UnitOfWorkError::action(Phase::Update, format!("{}: {e}", self.path())))?;

        if result.rows_affected() == 0 {
            return Err(UnitOfWorkError::action(
                Phase::Update,
                format!("{} not found", self.path()),
            ));
        }
        Ok(())
    }

    async fn delete_by_tx(&self, tx: &SqliteTx) -> Result<(), UnitOfWorkError> {
        let mut conn = tx.connection().await;
        let result = sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
            .bind(&self.collection)
            .bind(&self.id)
            .execute(&mut **conn)
            .await
            .map_err(|e| UnitOfWorkError::action(Phase::Delete, format!("{}: {e}", self.path())))?;

        if result.rows_affected() == 0 {
            return Err(UnitOfWorkError::action(
                Phase::Delete,
                format!("{} not found", self.path()),
            ));
        }
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
