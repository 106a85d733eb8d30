//! Durable persistence of suspended workflow state.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::db::{checkpoint_repo, Database};
use crate::error::WorkflowError;

/// Full state of one suspended instance: which step is waiting and the
/// serialized state record to rehydrate on resume.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    pub instance_id: String,
    pub step: String,
    pub state: Value,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn save(&self, namespace: &str, checkpoint: Checkpoint) -> Result<(), WorkflowError>;
    async fn load(
        &self,
        namespace: &str,
        instance_id: &str,
    ) -> Result<Option<Checkpoint>, WorkflowError>;
    async fn delete(&self, namespace: &str, instance_id: &str) -> Result<(), WorkflowError>;
}

/// In-memory store for tests and throwaway wiring. Does not survive the
/// process.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    checkpoints: RwLock<HashMap<(String, String), Checkpoint>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn save(&self, namespace: &str, checkpoint: Checkpoint) -> Result<(), WorkflowError> {
        let key = (namespace.to_string(), checkpoint.instance_id.clone());
        self.checkpoints
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, checkpoint);
        Ok(())
    }

    async fn load(
        &self,
        namespace: &str,
        instance_id: &str,
    ) -> Result<Option<Checkpoint>, WorkflowError> {
        let key = (namespace.to_string(), instance_id.to_string());
        Ok(self
            .checkpoints
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
            .cloned())
    }

    async fn delete(&self, namespace: &str, instance_id: &str) -> Result<(), WorkflowError> {
        let key = (namespace.to_string(), instance_id.to_string());
        self.checkpoints
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&key);
        Ok(())
    }
}

/// SQLite-backed store: the state survives process restarts, so instances
/// can stay suspended for days. Row operations are small enough to run
/// inline on the async callers.
#[derive(Clone)]
pub struct SqliteCheckpointStore {
    db: Database,
}

impl SqliteCheckpointStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn save(&self, namespace: &str, checkpoint: Checkpoint) -> Result<(), WorkflowError> {
        let row = checkpoint_repo::CheckpointRow {
            namespace: namespace.to_string(),
            instance_id: checkpoint.instance_id.clone(),
            step: checkpoint.step.clone(),
            state: serde_json::to_string(&checkpoint.state)?,
            updated_at: checkpoint.updated_at.to_rfc3339(),
        };
        checkpoint_repo::upsert(&self.db, &row)?;
        Ok(())
    }

    async fn load(
        &self,
        namespace: &str,
        instance_id: &str,
    ) -> Result<Option<Checkpoint>, WorkflowError> {
        let Some(row) = checkpoint_repo::find(&self.db, namespace, instance_id)? else {
            return Ok(None);
        };
        let state: Value = serde_json::from_str(&row.state)?;
        let updated_at = DateTime::parse_from_rfc3339(&row.updated_at)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());
        Ok(Some(Checkpoint {
            instance_id: row.instance_id,
            step: row.step,
            state,
            updated_at,
        }))
    }

    async fn delete(&self, namespace: &str, instance_id: &str) -> Result<(), WorkflowError> {
        checkpoint_repo::delete(&self.db, namespace, instance_id)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(instance_id: &str) -> Checkpoint {
        Checkpoint {
            instance_id: instance_id.to_string(),
            step: "await_zone_approval".to_string(),
            state: json!({"page_id": instance_id, "outcome": null}),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryCheckpointStore::new();
        store.save("segmentation", sample("page-1")).await.unwrap();

        let loaded = store
            .load("segmentation", "page-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.step, "await_zone_approval");
        assert_eq!(loaded.state["page_id"], "page-1");

        store.delete("segmentation", "page-1").await.unwrap();
        assert!(store
            .load("segmentation", "page-1")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_sqlite_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoints.db");

        {
            let store = SqliteCheckpointStore::new(Database::open(&path).unwrap());
            store.save("classification", sample("rec-9")).await.unwrap();
        }

        // A fresh handle on the same file still sees the suspended state.
        let store = SqliteCheckpointStore::new(Database::open(&path).unwrap());
        let loaded = store
            .load("classification", "rec-9")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.instance_id, "rec-9");
        assert_eq!(loaded.state["outcome"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn test_missing_checkpoint_is_none() {
        let store = MemoryCheckpointStore::new();
        assert!(store.load("classification", "nope").await.unwrap().is_none());
    }
}
