//! Work plans: a JSON list of document mutations applied as one unit of work.
//!
//! ```json
//! {
//!   "config": { "label": "import", "phase_concurrency": 8 },
//!   "operations": [
//!     { "op": "create", "collection": "users", "id": "1", "body": { "name": "ada" } },
//!     { "op": "delete", "collection": "users", "id": "7" }
//!   ]
//! }
//! ```

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use unitwork_core::{BatchCounts, Phase, TransactionResource, UnitOfWork, UnitOfWorkConfig, WorkItem};
use unitwork_storage::Document;

#[derive(Debug, Clone, Deserialize)]
pub struct WorkPlan {
    #[serde(default)]
    pub config: UnitOfWorkConfig,
    pub operations: Vec<PlannedOp>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlannedOp {
    pub op: Phase,
    #[serde(flatten)]
    pub document: Document,
}

/// What an applied plan did.
#[derive(Debug, Serialize)]
pub struct ApplySummary {
    pub label: String,
    pub backend: &'static str,
    #[serde(flatten)]
    pub counts: BatchCounts,
}

impl WorkPlan {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read plan {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("invalid plan JSON in {}", path.display()))
    }

    /// Mark every operation inside one declared scope, then commit once.
    pub async fn apply<R>(&self, resource: R, backend: &'static str) -> Result<ApplySummary>
    where
        R: TransactionResource,
        Document: WorkItem<R::Tx>,
    {
        let mut uow = UnitOfWork::with_config(resource, self.config.clone());
        uow.begin_work();

        for planned in &self.operations {
            let doc = Arc::new(planned.document.clone());
            match planned.op {
                Phase::Create => uow.mark_create(doc).await?,
                Phase::Update => uow.mark_update(doc).await?,
                Phase::Delete => uow.mark_delete(doc).await?,
            }
        }

        let counts = uow.pending().counts();
        uow.commit_work()
            .await
            .with_context(|| format!("unit of work '{}' rolled back", self.config.label))?;

        Ok(ApplySummary {
            label: self.config.label.clone(),
            backend,
            counts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unitwork_storage::MemoryStore;

    const PLAN: &str = r#"{
        "config": { "label": "seed" },
        "operations": [
            { "op": "create", "collection": "users", "id": "1", "body": { "name": "ada" } },
            { "op": "create", "collection": "users", "id": "2", "body": { "name": "grace" } },
            { "op": "update", "collection": "users", "id": "1", "body": { "name": "countess" } },
            { "op": "delete", "collection": "users", "id": "2" }
        ]
    }"#;

    #[test]
    fn parse_plan() {
        let plan: WorkPlan = serde_json::from_str(PLAN).unwrap();
        assert_eq!(plan.config.label, "seed");
        assert_eq!(plan.operations.len(), 4);
        assert_eq!(plan.operations[3].op, Phase::Delete);
        assert_eq!(plan.operations[3].document.body, serde_json::Value::Null);
    }

    #[tokio::test]
    async fn apply_to_memory_store() {
        let plan: WorkPlan = serde_json::from_str(PLAN).unwrap();
        let store = MemoryStore::new();

        let summary = plan.apply(store.clone(), "memory").await.unwrap();

        assert_eq!(summary.counts.total(), 4);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("users", "1").unwrap().body["name"], "countess");
    }

    #[tokio::test]
    async fn failed_plan_reports_label() {
        let plan: WorkPlan = serde_json::from_str(
            r#"{ "operations": [ { "op": "delete", "collection": "users", "id": "9" } ] }"#,
        )
        .unwrap();

        let err = plan.apply(MemoryStore::new(), "memory").await.unwrap_err();
        assert!(err.to_string().contains("'unit-of-work' rolled back"));
    }
}
