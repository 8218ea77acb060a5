//! SQLite driver built on rusqlite.
//!
//! The target's `service_name` is the database file path. The file must
//! already exist. It is opened read-only, so no caller query can write to it.

use super::{canonical_timestamp, parse_db_time, Connection, DbError, Driver, RowSet, ScalarValue};
use crate::targets::TargetConfig;

use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::OpenFlags;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub struct SqliteDriver;

#[async_trait]
impl Driver for SqliteDriver {
    async fn connect(&self, target: &TargetConfig) -> Result<Box<dyn Connection>, DbError> {
        let path = target.service_name.clone();
        let busy_timeout = Duration::from_millis(target.connect_timeout_ms);

        let conn = tokio::task::spawn_blocking(move || {
            let conn = rusqlite::Connection::open_with_flags(
                &path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            conn.busy_timeout(busy_timeout)?;
            Ok::<_, rusqlite::Error>(conn)
        })
        .await
        .map_err(|e| DbError::Connection(e.to_string()))?
        .map_err(|e| DbError::Connection(e.to_string()))?;

        Ok(Box::new(SqliteConnection {
            conn: Arc::new(Mutex::new(conn)),
        }))
    }
}

struct SqliteConnection {
    conn: Arc<Mutex<rusqlite::Connection>>,
}

#[async_trait]
impl Connection for SqliteConnection {
    async fn query(&mut self, sql: &str) -> Result<RowSet, DbError> {
        let conn = self.conn.clone();
        let sql = sql.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| DbError::Query("connection lock poisoned".into()))?;
            read_rows(&conn, &sql).map_err(|e| DbError::Query(e.to_string()))
        })
        .await
        .map_err(|e| DbError::Query(e.to_string()))?
    }

    async fn close(self: Box<Self>) -> Result<(), DbError> {
        let conn = self.conn;
        tokio::task::spawn_blocking(move || match Arc::try_unwrap(conn) {
            Ok(mutex) => {
                let conn = mutex
                    .into_inner()
                    .map_err(|_| DbError::Query("connection lock poisoned".into()))?;
                conn.close().map_err(|(_, e)| DbError::Query(e.to_string()))
            }
            // A query task still holds it; the last owner closes on drop.
            Err(_) => Ok(()),
        })
        .await
        .map_err(|e| DbError::Query(e.to_string()))?
    }
}

fn read_rows(conn: &rusqlite::Connection, sql: &str) -> rusqlite::Result<RowSet> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
    let width = columns.len();
    let mut result = RowSet::new(columns);

    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(width);
        for i in 0..width {
            values.push(to_scalar(row.get_ref(i)?));
        }
        result.rows.push(values);
    }

    Ok(result)
}

/// SQLite stores timestamps as text; recognizable ones are canonicalized.
fn to_scalar(value: ValueRef<'_>) -> ScalarValue {
    match value {
        ValueRef::Null => ScalarValue::Null,
        ValueRef::Integer(i) => ScalarValue::Int(i),
        ValueRef::Real(f) => ScalarValue::Float(f),
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes);
            match parse_db_time(&text) {
                Some(dt) => ScalarValue::Text(canonical_timestamp(&dt)),
                None => ScalarValue::Text(text.into_owned()),
            }
        }
        ValueRef::Blob(bytes) => {
            ScalarValue::Text(bytes.iter().map(|b| format!("{:02x}", b)).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ConnectionFactory;
    use crate::targets::DriverKind;
    use tempfile::NamedTempFile;

    fn fixture() -> NamedTempFile {
        let tmp = NamedTempFile::new().unwrap();
        let conn = rusqlite::Connection::open(tmp.path()).unwrap();
        conn.execute_batch(
            "CREATE TABLE events (id INTEGER, label TEXT, seen_at TEXT, score REAL, raw BLOB);
             INSERT INTO events VALUES (2, 'b', '2024-05-01 10:00:00', 1.5, x'0aff');
             INSERT INTO events VALUES (1, 'a', NULL, NULL, NULL);",
        )
        .unwrap();
        tmp
    }

    fn target_for(tmp: &NamedTempFile) -> TargetConfig {
        let mut target = TargetConfig::new("local", tmp.path().to_str().unwrap());
        target.driver = DriverKind::Sqlite;
        target
    }

    #[tokio::test]
    async fn test_query_materializes_rows() {
        let tmp = fixture();
        let factory = ConnectionFactory::new();
        let mut conn = factory.open(&target_for(&tmp)).await.unwrap();

        let rows = conn
            .execute("SELECT id, label, seen_at, score, raw FROM events ORDER BY id DESC")
            .await
            .unwrap();
        conn.release().await;

        assert_eq!(rows.columns, ["id", "label", "seen_at", "score", "raw"]);
        assert_eq!(rows.row_count(), 2);
        assert_eq!(
            rows.rows[0],
            vec![
                ScalarValue::Int(2),
                ScalarValue::from("b"),
                ScalarValue::from("2024-05-01T10:00:00"),
                ScalarValue::Float(1.5),
                ScalarValue::from("0aff"),
            ]
        );
        assert_eq!(rows.rows[1][2], ScalarValue::Null);
    }

    #[tokio::test]
    async fn test_bad_sql_is_query_error() {
        let tmp = fixture();
        let factory = ConnectionFactory::new();
        let mut conn = factory.open(&target_for(&tmp)).await.unwrap();

        let err = conn.execute("SELECT * FROM nowhere").await.unwrap_err();
        assert!(matches!(err, DbError::Query(_)));
        conn.release().await;
    }

    #[tokio::test]
    async fn test_connection_is_read_only() {
        let tmp = fixture();
        let factory = ConnectionFactory::new();
        let mut conn = factory.open(&target_for(&tmp)).await.unwrap();

        let err = conn.execute("DELETE FROM events").await.unwrap_err();
        assert!(matches!(err, DbError::Query(_)), "{:?}", err);
        let count = conn.execute("SELECT COUNT(*) FROM events").await.unwrap();
        assert_eq!(count.rows[0][0], ScalarValue::Int(2));
        conn.release().await;
    }

    #[tokio::test]
    async fn test_uri_path_does_not_create_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("new.db");
        let uri = format!("file:{}?mode=rwc", path.display());
        let mut target = TargetConfig::new("local", &uri);
        target.driver = DriverKind::Sqlite;

        let err = ConnectionFactory::new().open(&target).await.err().unwrap();
        assert!(matches!(err, DbError::Connection(_)), "{:?}", err);
        assert!(!path.exists());
    }
}
