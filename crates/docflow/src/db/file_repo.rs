//! File record repository: operations on the `file_records` table.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use super::{format_timestamp, parse_timestamp, Database, DatabaseError};
use crate::status::{FileKey, FileRecord, ProcessingStatus, Transition};

/// A raw record row from the database.
#[derive(Debug, Clone)]
struct FileRow {
    file_id: String,
    upload_timestamp: String,
    filename: Option<String>,
    processing_status: String,
    batch_job_id: Option<String>,
    processing_started_at: Option<String>,
    processing_completed_at: Option<String>,
    failed_at: Option<String>,
    last_updated: String,
    error_message: Option<String>,
    processing_duration_ms: Option<i64>,
}

impl FileRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            file_id: row.get("file_id")?,
            upload_timestamp: row.get("upload_timestamp")?,
            filename: row.get("filename")?,
            processing_status: row.get("processing_status")?,
            batch_job_id: row.get("batch_job_id")?,
            processing_started_at: row.get("processing_started_at")?,
            processing_completed_at: row.get("processing_completed_at")?,
            failed_at: row.get("failed_at")?,
            last_updated: row.get("last_updated")?,
            error_message: row.get("error_message")?,
            processing_duration_ms: row.get("processing_duration_ms")?,
        })
    }

    fn into_record(self) -> Result<FileRecord, DatabaseError> {
        let processing_status = self.processing_status.parse::<ProcessingStatus>().map_err(
            |_| DatabaseError::CorruptValue {
                column: "processing_status",
                value: self.processing_status.clone(),
            },
        )?;

        let optional = |column: &'static str, value: Option<String>| {
            value.map(|v| parse_timestamp(column, &v)).transpose()
        };

        Ok(FileRecord {
            key: FileKey::new(self.file_id, self.upload_timestamp),
            filename: self.filename,
            processing_status,
            batch_job_id: self.batch_job_id,
            processing_started_at: optional("processing_started_at", self.processing_started_at)?,
            processing_completed_at: optional(
                "processing_completed_at",
                self.processing_completed_at,
            )?,
            failed_at: optional("failed_at", self.failed_at)?,
            last_updated: parse_timestamp("last_updated", &self.last_updated)?,
            error_message: self.error_message,
            processing_duration_ms: self.processing_duration_ms,
        })
    }
}

fn query_records(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::types::ToSql],
) -> Result<Vec<FileRecord>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, FileRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(FileRow::into_record).collect()
}

/// Inserts a new record.
pub fn insert(db: &Database, record: &FileRecord) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO file_records (file_id, upload_timestamp, filename, processing_status,
             batch_job_id, processing_started_at, processing_completed_at, failed_at,
             last_updated, error_message, processing_duration_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                record.key.file_id,
                record.key.upload_timestamp,
                record.filename,
                record.processing_status.as_str(),
                record.batch_job_id,
                record.processing_started_at.map(format_timestamp),
                record.processing_completed_at.map(format_timestamp),
                record.failed_at.map(format_timestamp),
                format_timestamp(record.last_updated),
                record.error_message,
                record.processing_duration_ms,
            ],
        )?;
        Ok(())
    })
}

/// Finds a record by its composite key.
pub fn find_by_key(db: &Database, key: &FileKey) -> Result<Option<FileRecord>, DatabaseError> {
    db.with_conn(|conn| {
        let mut records = query_records(
            conn,
            "SELECT * FROM file_records WHERE file_id = ?1 AND upload_timestamp = ?2",
            &[&key.file_id, &key.upload_timestamp],
        )?;
        Ok(records.pop())
    })
}

/// All records for a file id, newest upload first.
pub fn find_by_file_id(db: &Database, file_id: &str) -> Result<Vec<FileRecord>, DatabaseError> {
    db.with_conn(|conn| {
        query_records(
            conn,
            "SELECT * FROM file_records WHERE file_id = ?1 ORDER BY upload_timestamp DESC",
            &[&file_id],
        )
    })
}

/// Finds the record associated with an external analysis job.
pub fn find_by_job_id(db: &Database, job_id: &str) -> Result<Option<FileRecord>, DatabaseError> {
    db.with_conn(|conn| {
        let mut records = query_records(
            conn,
            "SELECT * FROM file_records WHERE batch_job_id = ?1
             ORDER BY upload_timestamp DESC LIMIT 1",
            &[&job_id],
        )?;
        Ok(records.pop())
    })
}

/// Applies `transition` only if the record's status equals `expected`.
/// Returns whether a row was changed.
pub fn conditional_transition(
    db: &Database,
    key: &FileKey,
    expected: ProcessingStatus,
    transition: &Transition,
) -> Result<bool, DatabaseError> {
    let now = format_timestamp(transition.at());
    let target = transition.target().as_str();

    db.with_conn(|conn| {
        let changed = match transition {
            Transition::Start { .. } => conn.execute(
                "UPDATE file_records SET processing_status = ?4, processing_started_at = ?5,
                 last_updated = ?5, batch_job_id = NULL, processing_completed_at = NULL,
                 failed_at = NULL, error_message = NULL, processing_duration_ms = NULL
                 WHERE file_id = ?1 AND upload_timestamp = ?2 AND processing_status = ?3",
                params![
                    key.file_id,
                    key.upload_timestamp,
                    expected.as_str(),
                    target,
                    now
                ],
            )?,
            Transition::Complete { duration_ms, .. } => conn.execute(
                "UPDATE file_records SET processing_status = ?4, processing_completed_at = ?5,
                 last_updated = ?5, processing_duration_ms = ?6
                 WHERE file_id = ?1 AND upload_timestamp = ?2 AND processing_status = ?3",
                params![
                    key.file_id,
                    key.upload_timestamp,
                    expected.as_str(),
                    target,
                    now,
                    duration_ms
                ],
            )?,
            Transition::Fail { reason, .. } => conn.execute(
                "UPDATE file_records SET processing_status = ?4, failed_at = ?5,
                 last_updated = ?5, error_message = ?6
                 WHERE file_id = ?1 AND upload_timestamp = ?2 AND processing_status = ?3",
                params![
                    key.file_id,
                    key.upload_timestamp,
                    expected.as_str(),
                    target,
                    now,
                    reason
                ],
            )?,
        };
        Ok(changed == 1)
    })
}

/// Stores the external job id on a record that is still processing.
pub fn attach_job_id(
    db: &Database,
    key: &FileKey,
    job_id: &str,
    at: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE file_records SET batch_job_id = ?3, last_updated = ?4
             WHERE file_id = ?1 AND upload_timestamp = ?2 AND processing_status = 'processing'",
            params![key.file_id, key.upload_timestamp, job_id, format_timestamp(at)],
        )?;
        Ok(changed == 1)
    })
}

/// Records still processing that started before `cutoff`, oldest first.
pub fn find_stale_processing(
    db: &Database,
    cutoff: DateTime<Utc>,
) -> Result<Vec<FileRecord>, DatabaseError> {
    let cutoff = format_timestamp(cutoff);
    db.with_conn(|conn| {
        query_records(
            conn,
            "SELECT * FROM file_records
             WHERE processing_status = 'processing'
               AND processing_started_at IS NOT NULL
               AND processing_started_at < ?1
             ORDER BY processing_started_at ASC",
            &[&cutoff],
        )
    })
}

/// Counts records with the given status.
pub fn count_by_status(db: &Database, status: ProcessingStatus) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM file_records WHERE processing_status = ?1",
            params![status.as_str()],
            |r| r.get(0),
        )?;
        Ok(count.max(0) as u64)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    fn sample_record(file_id: &str, upload_timestamp: &str) -> FileRecord {
        FileRecord::uploaded(
            FileKey::new(file_id, upload_timestamp),
            Some("scan.pdf".to_string()),
            Utc::now(),
        )
    }

    #[test]
    fn test_insert_and_find() {
        let db = test_db();
        let record = sample_record("f1", "2026-01-01T00:00:00.000Z");
        insert(&db, &record).unwrap();

        let found = find_by_key(&db, &record.key).unwrap().unwrap();
        assert_eq!(found.filename.as_deref(), Some("scan.pdf"));
        assert_eq!(found.processing_status, ProcessingStatus::Uploaded);
        assert!(found.processing_started_at.is_none());
    }

    #[test]
    fn test_find_nonexistent() {
        let db = test_db();
        assert!(find_by_key(&db, &FileKey::new("x", "y")).unwrap().is_none());
        assert!(find_by_file_id(&db, "x").unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let db = test_db();
        let record = sample_record("f1", "2026-01-01T00:00:00.000Z");
        insert(&db, &record).unwrap();
        assert!(insert(&db, &record).is_err());
    }

    #[test]
    fn test_find_by_file_id_newest_first() {
        let db = test_db();
        insert(&db, &sample_record("f1", "2026-01-01T00:00:00.000Z")).unwrap();
        insert(&db, &sample_record("f1", "2026-03-01T00:00:00.000Z")).unwrap();
        insert(&db, &sample_record("f2", "2026-02-01T00:00:00.000Z")).unwrap();

        let records = find_by_file_id(&db, "f1").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].key.upload_timestamp, "2026-03-01T00:00:00.000Z");
    }

    #[test]
    fn test_start_clears_previous_failure() {
        let db = test_db();
        let mut record = sample_record("f1", "t1");
        record.processing_status = ProcessingStatus::Failed;
        record.error_message = Some("boom".to_string());
        record.failed_at = Some(Utc::now());
        insert(&db, &record).unwrap();

        let changed = conditional_transition(
            &db,
            &record.key,
            ProcessingStatus::Failed,
            &Transition::Start {
                started_at: Utc::now(),
            },
        )
        .unwrap();
        assert!(changed);

        let found = find_by_key(&db, &record.key).unwrap().unwrap();
        assert_eq!(found.processing_status, ProcessingStatus::Processing);
        assert!(found.error_message.is_none());
        assert!(found.failed_at.is_none());
        assert!(found.processing_started_at.is_some());
    }

    #[test]
    fn test_conditional_transition_guard() {
        let db = test_db();
        let record = sample_record("f1", "t1");
        insert(&db, &record).unwrap();

        // Still uploaded, so a processing -> failed write must not land.
        let changed = conditional_transition(
            &db,
            &record.key,
            ProcessingStatus::Processing,
            &Transition::Fail {
                failed_at: Utc::now(),
                reason: "x".to_string(),
            },
        )
        .unwrap();
        assert!(!changed);
        assert_eq!(
            find_by_key(&db, &record.key).unwrap().unwrap().processing_status,
            ProcessingStatus::Uploaded
        );
    }

    #[test]
    fn test_find_by_job_id() {
        let db = test_db();
        let mut record = sample_record("f1", "t1");
        record.processing_status = ProcessingStatus::Processing;
        record.processing_started_at = Some(Utc::now());
        insert(&db, &record).unwrap();
        attach_job_id(&db, &record.key, "job-9", Utc::now()).unwrap();

        let found = find_by_job_id(&db, "job-9").unwrap().unwrap();
        assert_eq!(found.key, record.key);
        assert!(find_by_job_id(&db, "job-0").unwrap().is_none());
    }

    #[test]
    fn test_find_stale_ignores_other_states() {
        let db = test_db();
        let old = Utc::now() - Duration::hours(3);

        let mut stuck = sample_record("stuck", "t1");
        stuck.processing_status = ProcessingStatus::Processing;
        stuck.processing_started_at = Some(old);
        insert(&db, &stuck).unwrap();

        let mut fresh = sample_record("fresh", "t1");
        fresh.processing_status = ProcessingStatus::Processing;
        fresh.processing_started_at = Some(Utc::now());
        insert(&db, &fresh).unwrap();

        let mut done = sample_record("done", "t1");
        done.processing_status = ProcessingStatus::Processed;
        done.processing_started_at = Some(old);
        insert(&db, &done).unwrap();

        let stale = find_stale_processing(&db, Utc::now() - Duration::hours(2)).unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].key.file_id, "stuck");
    }

    #[test]
    fn test_count_by_status() {
        let db = test_db();
        insert(&db, &sample_record("c1", "t")).unwrap();
        insert(&db, &sample_record("c2", "t")).unwrap();
        let mut failed = sample_record("c3", "t");
        failed.processing_status = ProcessingStatus::Failed;
        insert(&db, &failed).unwrap();

        assert_eq!(count_by_status(&db, ProcessingStatus::Uploaded).unwrap(), 2);
        assert_eq!(count_by_status(&db, ProcessingStatus::Failed).unwrap(), 1);
        assert_eq!(count_by_status(&db, ProcessingStatus::Processed).unwrap(), 0);
    }

    #[test]
    fn test_corrupt_status_surfaces_error() {
        let db = test_db();
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO file_records (file_id, upload_timestamp, processing_status, last_updated)
                 VALUES ('bad', 't', 'exploded', '2026-01-01T00:00:00.000Z')",
                [],
            )?;
            Ok(())
        })
        .unwrap();

        let err = find_by_key(&db, &FileKey::new("bad", "t")).unwrap_err();
        assert!(matches!(err, DatabaseError::CorruptValue { .. }));
    }
}
