//! Database access for dbmonitor.
//!
//! Every operation opens one brand-new connection through the
//! [`ConnectionFactory`] and gives it back before returning. There is no
//! pooling.

mod dialect;
mod models;
#[cfg(feature = "oracle")]
mod oracle_db;
mod sqlite_db;
#[cfg(test)]
pub mod testing;

pub use dialect::*;
pub use models::*;

use crate::targets::{DriverKind, TargetConfig};

use async_trait::async_trait;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use thiserror::Error;

/// Database error types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DbError {
    #[error("invalid configuration: {0}")]
    Configuration(String),
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("query failed: {0}")]
    Query(String),
}

/// A driver knows how to establish a live connection for one engine family.
#[async_trait]
pub trait Driver: Send + Sync {
    async fn connect(&self, target: &TargetConfig) -> Result<Box<dyn Connection>, DbError>;
}

/// A live connection. Dropping it closes the underlying session.
#[async_trait]
pub trait Connection: Send {
    async fn query(&mut self, sql: &str) -> Result<RowSet, DbError>;

    async fn close(self: Box<Self>) -> Result<(), DbError>;
}

/// Builds one ephemeral connection per call.
#[derive(Clone)]
pub struct ConnectionFactory {
    drivers: HashMap<DriverKind, Arc<dyn Driver>>,
}

impl ConnectionFactory {
    /// A factory with every driver compiled into this build.
    pub fn new() -> Self {
        let mut drivers: HashMap<DriverKind, Arc<dyn Driver>> = HashMap::new();
        drivers.insert(DriverKind::Sqlite, Arc::new(sqlite_db::SqliteDriver));
        #[cfg(feature = "oracle")]
        drivers.insert(DriverKind::Oracle, Arc::new(oracle_db::OracleDriver));
        Self { drivers }
    }

    /// Open a connection to `target`, bounded by its connect timeout.
    pub async fn open(&self, target: &TargetConfig) -> Result<ConnectionHandle, DbError> {
        validate_target(target)?;

        let driver = self.drivers.get(&target.driver).ok_or_else(|| {
            DbError::Configuration(format!("{} driver is not available in this build", target.driver))
        })?;

        let timeout = Duration::from_millis(target.connect_timeout_ms);
        let conn = match tokio::time::timeout(timeout, driver.connect(target)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(DbError::Connection(format!(
                    "timed out after {}ms",
                    target.connect_timeout_ms
                )))
            }
        };

        tracing::debug!("Opened connection to {}", target.name);
        Ok(ConnectionHandle {
            target: target.name.clone(),
            conn: Some(conn),
        })
    }
}

impl Default for ConnectionFactory {
    fn default() -> Self {
        Self::new()
    }
}

fn host_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("valid regex"))
}

/// Reject parameters no driver could ever connect with.
fn validate_target(target: &TargetConfig) -> Result<(), DbError> {
    if target.connect_timeout_ms == 0 {
        return Err(DbError::Configuration("connect timeout must be positive".into()));
    }
    if target.service_name.trim().is_empty() {
        return Err(DbError::Configuration("service name is empty".into()));
    }

    if target.driver == DriverKind::Oracle {
        if !host_pattern().is_match(&target.host) {
            return Err(DbError::Configuration(format!("invalid host: {:?}", target.host)));
        }
        if target.port == 0 {
            return Err(DbError::Configuration("port must be non-zero".into()));
        }
        if target.user.is_empty() {
            return Err(DbError::Configuration("user is empty".into()));
        }
    }

    Ok(())
}

/// Owns one open connection for the duration of a single operation.
///
/// Call [`ConnectionHandle::release`] on the normal path. Any other exit
/// (early return, panic, or the request future being dropped) closes the
/// connection through `Drop`.
pub struct ConnectionHandle {
    target: String,
    conn: Option<Box<dyn Connection>>,
}

impl ConnectionHandle {
    pub async fn execute(&mut self, sql: &str) -> Result<RowSet, DbError> {
        match self.conn.as_mut() {
            Some(conn) => conn.query(sql).await,
            None => Err(DbError::Query("connection already released".into())),
        }
    }

    pub async fn release(mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err(e) = conn.close().await {
                tracing::warn!("Closing connection to {} failed: {}", self.target, e);
            }
        }
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        tracing::debug!("Connection to {} dropped without explicit release", self.target);

        // Closing a session can block on a network round-trip.
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || drop(conn));
            }
            Err(_) => drop(conn),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedDriver;
    use super::*;

    fn sqlite_target(path: &str) -> TargetConfig {
        let mut target = TargetConfig::new("local", path);
        target.driver = DriverKind::Sqlite;
        target
    }

    #[tokio::test]
    async fn test_every_open_is_a_new_connection() {
        let driver = ScriptedDriver::new();
        let factory = driver.factory();
        let target = TargetConfig::new("dev", "ORCLPDB1");

        let a = factory.open(&target).await.unwrap();
        let b = factory.open(&target).await.unwrap();
        assert_eq!(driver.opened(), 2);

        a.release().await;
        drop(b);
        driver.wait_for_closed(2).await;
    }

    #[tokio::test]
    async fn test_dropped_handle_closes_off_the_runtime_thread() {
        let driver = ScriptedDriver::new();
        let factory = driver.factory();

        let conn = factory.open(&TargetConfig::new("dev", "ORCLPDB1")).await.unwrap();
        drop(conn);
        driver.wait_for_closed(1).await;

        let threads = driver.close_threads();
        assert_eq!(threads.len(), 1);
        assert_ne!(threads[0], std::thread::current().id());
    }

    #[test]
    fn test_dropped_handle_without_runtime_closes_inline() {
        let driver = ScriptedDriver::new();
        let factory = driver.factory();
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let conn = rt
            .block_on(factory.open(&TargetConfig::new("dev", "ORCLPDB1")))
            .unwrap();
        drop(rt);
        drop(conn);

        assert_eq!(driver.closed(), 1);
        assert_eq!(driver.close_threads(), vec![std::thread::current().id()]);
    }

    #[tokio::test]
    async fn test_malformed_target_is_configuration_error() {
        let driver = ScriptedDriver::new();
        let factory = driver.factory();

        let mut bad_host = TargetConfig::new("dev", "ORCLPDB1");
        bad_host.host = "db host;".to_string();
        let mut bad_port = TargetConfig::new("dev", "ORCLPDB1");
        bad_port.port = 0;
        let no_service = TargetConfig::new("dev", " ");

        for target in [bad_host, bad_port, no_service] {
            let err = factory.open(&target).await.err().unwrap();
            assert!(matches!(err, DbError::Configuration(_)), "{:?}", err);
        }
        assert_eq!(driver.opened(), 0);
    }

    #[tokio::test]
    async fn test_connect_timeout() {
        let driver = ScriptedDriver::new().with_connect_delay(Duration::from_millis(500));
        let factory = driver.factory();
        let mut target = TargetConfig::new("dev", "ORCLPDB1");
        target.connect_timeout_ms = 20;

        let err = factory.open(&target).await.err().unwrap();
        assert_eq!(err, DbError::Connection("timed out after 20ms".into()));
        assert_eq!(driver.opened(), 0);
    }

    #[tokio::test]
    async fn test_execute_after_failure_still_releases() {
        let driver = ScriptedDriver::new().respond(|_| Err(DbError::Query("ORA-00942".into())));
        let factory = driver.factory();
        let target = TargetConfig::new("dev", "ORCLPDB1");

        for _ in 0..5 {
            let mut conn = factory.open(&target).await.unwrap();
            assert!(conn.execute("SELECT * FROM missing").await.is_err());
            conn.release().await;
        }
        assert_eq!(driver.opened(), 5);
        assert_eq!(driver.closed(), 5);
    }

    #[tokio::test]
    async fn test_sqlite_missing_file_is_connection_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.db");
        let factory = ConnectionFactory::new();

        let err = factory
            .open(&sqlite_target(path.to_str().unwrap()))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, DbError::Connection(_)), "{:?}", err);
        assert!(!path.exists());
    }
}
