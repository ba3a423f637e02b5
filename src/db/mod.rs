//! Database layer for chapter-dl
//!
//! Handles SQLite persistence for the outstanding download queue.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] — Database lifecycle, schema migrations
//! - [`records`] — Key-value queue record CRUD

use sqlx::sqlite::SqlitePool;

mod migrations;
mod records;

/// SQLite-backed durable key-value store.
///
/// One table, `queue_records`, holds one row per outstanding chapter
/// download, keyed by the chapter id with a JSON-encoded value. Each write
/// is an independent durable operation — there is no multi-key transaction
/// guarantee, and downstream dedupe tolerates duplicate or stale rows left
/// behind by a crash.
#[derive(Debug)]
pub struct Database {
    pub(crate) pool: SqlitePool,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    async fn open_temp_db() -> (Database, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let db = Database::new(&tmp.path().join("queue.db")).await.unwrap();
        (db, tmp)
    }

    #[tokio::test]
    async fn put_then_all_returns_the_value() {
        let (db, _tmp) = open_temp_db().await;

        db.put_record("12", r#"{"a":1}"#).await.unwrap();
        let values = db.all_records().await.unwrap();
        assert_eq!(values, vec![r#"{"a":1}"#.to_string()]);
    }

    #[tokio::test]
    async fn put_with_same_key_replaces_the_value() {
        let (db, _tmp) = open_temp_db().await;

        db.put_record("12", "old").await.unwrap();
        db.put_record("12", "new").await.unwrap();

        let values = db.all_records().await.unwrap();
        assert_eq!(values, vec!["new".to_string()], "one row per key");
    }

    #[tokio::test]
    async fn delete_removes_only_the_named_key() {
        let (db, _tmp) = open_temp_db().await;

        db.put_record("1", "a").await.unwrap();
        db.put_record("2", "b").await.unwrap();
        db.delete_record("1").await.unwrap();

        let values = db.all_records().await.unwrap();
        assert_eq!(values, vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn delete_of_missing_key_is_a_no_op() {
        let (db, _tmp) = open_temp_db().await;
        db.delete_record("missing").await.unwrap();
        assert!(db.all_records().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn clear_empties_the_table() {
        let (db, _tmp) = open_temp_db().await;

        db.put_record("1", "a").await.unwrap();
        db.put_record("2", "b").await.unwrap();
        db.clear_records().await.unwrap();

        assert!(db.all_records().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn database_survives_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("queue.db");

        {
            let db = Database::new(&path).await.unwrap();
            db.put_record("7", "persisted").await.unwrap();
            db.pool.close().await;
        }

        let db = Database::new(&path).await.unwrap();
        assert_eq!(db.all_records().await.unwrap(), vec!["persisted".to_string()]);
    }
}
