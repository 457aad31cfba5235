//! Processing result repository: one JSON document per file id.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use super::{format_timestamp, Database, DatabaseError};

/// Inserts or replaces the result document for a file.
pub fn upsert(
    db: &Database,
    file_id: &str,
    result_json: &str,
    created_at: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO processing_results (file_id, result_json, created_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(file_id) DO UPDATE SET
               result_json = excluded.result_json,
               created_at = excluded.created_at",
            params![file_id, result_json, format_timestamp(created_at)],
        )?;
        Ok(())
    })
}

pub fn find_json(db: &Database, file_id: &str) -> Result<Option<String>, DatabaseError> {
    db.with_conn(|conn| {
        let json = conn
            .query_row(
                "SELECT result_json FROM processing_results WHERE file_id = ?1",
                params![file_id],
                |r| r.get(0),
            )
            .optional()?;
        Ok(json)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_replaces_existing() {
        let db = Database::open_in_memory().unwrap();
        upsert(&db, "f1", r#"{"v":1}"#, Utc::now()).unwrap();
        upsert(&db, "f1", r#"{"v":2}"#, Utc::now()).unwrap();

        assert_eq!(find_json(&db, "f1").unwrap().as_deref(), Some(r#"{"v":2}"#));
        let count: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM processing_results", [], |r| {
                    r.get(0)
                })?)
            })
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_find_missing() {
        let db = Database::open_in_memory().unwrap();
        assert!(find_json(&db, "nope").unwrap().is_none());
    }
}
