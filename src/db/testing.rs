//! Scripted in-memory driver for exercising operations without a database.

use super::{Connection, ConnectionFactory, DbError, Driver, RowSet, ScalarValue};
use crate::targets::{DriverKind, TargetConfig};

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::ThreadId;
use std::time::Duration;

type Responder = dyn Fn(&str) -> Result<RowSet, DbError> + Send + Sync;

/// Answers every query through a closure and counts opens and closes.
#[derive(Clone)]
pub struct ScriptedDriver {
    responder: Arc<Responder>,
    connect_error: Option<DbError>,
    connect_delay: Option<Duration>,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
    close_threads: Arc<Mutex<Vec<ThreadId>>>,
    executed: Arc<Mutex<Vec<String>>>,
}

impl ScriptedDriver {
    /// A driver whose every query returns a single `1`.
    pub fn new() -> Self {
        Self {
            responder: Arc::new(|_| Ok(rows(&["1"], vec![vec![ScalarValue::Int(1)]]))),
            connect_error: None,
            connect_delay: None,
            opened: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicUsize::new(0)),
            close_threads: Arc::new(Mutex::new(Vec::new())),
            executed: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn respond<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> Result<RowSet, DbError> + Send + Sync + 'static,
    {
        self.responder = Arc::new(f);
        self
    }

    pub fn with_connect_error(mut self, err: DbError) -> Self {
        self.connect_error = Some(err);
        self
    }

    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = Some(delay);
        self
    }

    /// A factory that serves every driver kind with this driver.
    pub fn factory(&self) -> ConnectionFactory {
        let driver: Arc<dyn Driver> = Arc::new(self.clone());
        ConnectionFactory {
            drivers: [DriverKind::Oracle, DriverKind::Sqlite]
                .into_iter()
                .map(|kind| (kind, driver.clone()))
                .collect(),
        }
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Threads each connection was closed on, in close order.
    pub fn close_threads(&self) -> Vec<ThreadId> {
        self.close_threads.lock().unwrap().clone()
    }

    /// Wait until `n` connections have closed. Drop-path closes run on the
    /// blocking pool and land shortly after the handle goes away.
    pub async fn wait_for_closed(&self, n: usize) {
        for _ in 0..200 {
            if self.closed() >= n {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(self.closed(), n);
    }

    /// Statements executed so far, in order.
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Driver for ScriptedDriver {
    async fn connect(&self, _target: &TargetConfig) -> Result<Box<dyn Connection>, DbError> {
        if let Some(delay) = self.connect_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = &self.connect_error {
            return Err(err.clone());
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedConnection {
            driver: self.clone(),
        }))
    }
}

struct ScriptedConnection {
    driver: ScriptedDriver,
}

#[async_trait]
impl Connection for ScriptedConnection {
    async fn query(&mut self, sql: &str) -> Result<RowSet, DbError> {
        self.driver.executed.lock().unwrap().push(sql.to_string());
        (self.driver.responder)(sql)
    }

    async fn close(self: Box<Self>) -> Result<(), DbError> {
        Ok(())
    }
}

impl Drop for ScriptedConnection {
    fn drop(&mut self) {
        self.driver
            .close_threads
            .lock()
            .unwrap()
            .push(std::thread::current().id());
        self.driver.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Build a row set from column names and rows.
pub fn rows(columns: &[&str], rows: Vec<Vec<ScalarValue>>) -> RowSet {
    RowSet {
        columns: columns.iter().map(|c| c.to_string()).collect(),
        rows,
    }
}
