//! Checkpoint repository — CRUD for the `workflow_checkpoints` table.
//!
//! One row per (namespace, instance id); saving overwrites the previous
//! suspend point, which is exactly the semantics the engine wants.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DatabaseError};

/// A raw checkpoint row from the database.
#[derive(Debug, Clone)]
pub struct CheckpointRow {
    pub namespace: String,
    pub instance_id: String,
    pub step: String,
    pub state: String,
    pub updated_at: String,
}

impl CheckpointRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            namespace: row.get("namespace")?,
            instance_id: row.get("instance_id")?,
            step: row.get("step")?,
            state: row.get("state")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Inserts or replaces the checkpoint for an instance.
pub fn upsert(db: &Database, row: &CheckpointRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO workflow_checkpoints (namespace, instance_id, step, state, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (namespace, instance_id)
             DO UPDATE SET step = ?3, state = ?4, updated_at = ?5",
            params![
                row.namespace,
                row.instance_id,
                row.step,
                row.state,
                row.updated_at,
            ],
        )?;
        Ok(())
    })
}

/// Finds the checkpoint for an instance, if any.
pub fn find(
    db: &Database,
    namespace: &str,
    instance_id: &str,
) -> Result<Option<CheckpointRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM workflow_checkpoints WHERE namespace = ?1 AND instance_id = ?2",
                params![namespace, instance_id],
                CheckpointRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Deletes the checkpoint for an instance. Missing rows are fine.
pub fn delete(db: &Database, namespace: &str, instance_id: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "DELETE FROM workflow_checkpoints WHERE namespace = ?1 AND instance_id = ?2",
            params![namespace, instance_id],
        )?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    fn sample_row(instance_id: &str) -> CheckpointRow {
        CheckpointRow {
            namespace: "classification".to_string(),
            instance_id: instance_id.to_string(),
            step: "check_grouping".to_string(),
            state: r#"{"record_id":"rec-1"}"#.to_string(),
            updated_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_upsert_and_find() {
        let db = test_db();
        upsert(&db, &sample_row("rec-1")).unwrap();

        let found = find(&db, "classification", "rec-1").unwrap().unwrap();
        assert_eq!(found.step, "check_grouping");

        // Saving again replaces the suspend point.
        let mut row = sample_row("rec-1");
        row.step = "interrupt_taxonomy".to_string();
        upsert(&db, &row).unwrap();

        let found = find(&db, "classification", "rec-1").unwrap().unwrap();
        assert_eq!(found.step, "interrupt_taxonomy");
    }

    #[test]
    fn test_namespaces_are_isolated() {
        let db = test_db();
        upsert(&db, &sample_row("shared-id")).unwrap();

        assert!(find(&db, "segmentation", "shared-id").unwrap().is_none());
        assert!(find(&db, "classification", "shared-id").unwrap().is_some());
    }

    #[test]
    fn test_delete() {
        let db = test_db();
        upsert(&db, &sample_row("rec-2")).unwrap();
        delete(&db, "classification", "rec-2").unwrap();
        assert!(find(&db, "classification", "rec-2").unwrap().is_none());

        // Deleting a missing row is not an error.
        delete(&db, "classification", "rec-2").unwrap();
    }
}
