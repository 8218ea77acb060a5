//! Probe and diagnostics engine.
//!
//! Each operation resolves one target, opens a dedicated connection, runs
//! its fixed statements and folds every failure into its result value.

mod gateway;
mod health;
mod metrics;
mod report;

pub use gateway::*;
pub use health::*;
pub use metrics::*;
pub use report::*;

use crate::db::{ConnectionFactory, DbError};
use crate::targets::{RegistryError, TargetConfig, TargetRegistry};

use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Validation failures for caller-supplied queries.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("no query provided")]
    Empty,
    #[error("only read-only queries are allowed")]
    NotReadOnly,
}

/// Any failure an operation can report.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MonitorError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Coarse failure category carried in every error result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Connection,
    Query,
    Validation,
    UnknownTarget,
}

impl MonitorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MonitorError::Db(DbError::Configuration(_)) => ErrorKind::Configuration,
            MonitorError::Db(DbError::Connection(_)) => ErrorKind::Connection,
            MonitorError::Db(DbError::Query(_)) => ErrorKind::Query,
            MonitorError::Registry(RegistryError::UnknownTarget(_)) => ErrorKind::UnknownTarget,
            MonitorError::Registry(_) => ErrorKind::Configuration,
            MonitorError::Validation(_) => ErrorKind::Validation,
        }
    }
}

/// Outcome of a diagnostic operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OpStatus {
    Success,
    Error,
}

/// Milliseconds elapsed since `start`.
pub(crate) fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Entry point used by the web layer: the registry plus a connection factory.
#[derive(Clone)]
pub struct Monitor {
    registry: Arc<TargetRegistry>,
    factory: Arc<ConnectionFactory>,
}

impl Monitor {
    pub fn new(registry: Arc<TargetRegistry>, factory: Arc<ConnectionFactory>) -> Self {
        Self { registry, factory }
    }

    pub fn registry(&self) -> &TargetRegistry {
        &self.registry
    }

    /// Resolve `name`, or the default target when no name is given.
    pub fn resolve(&self, name: Option<&str>) -> Result<&TargetConfig, RegistryError> {
        match name {
            Some(name) => self.registry.lookup(name),
            None => self
                .registry
                .default_target()
                .ok_or_else(|| RegistryError::UnknownTarget("default".to_string())),
        }
    }

    pub async fn health(&self, target: &TargetConfig) -> ProbeResult {
        run_health_probe(&self.factory, target).await
    }

    pub async fn metrics(&self, target: &TargetConfig) -> MetricsResult {
        collect_metrics(&self.factory, target).await
    }

    pub async fn tablespaces(&self, target: &TargetConfig) -> TabularReport {
        tablespace_report(&self.factory, target).await
    }

    pub async fn sessions(&self, target: &TargetConfig) -> TabularReport {
        session_report(&self.factory, target).await
    }

    pub async fn custom_query(
        &self,
        target: &TargetConfig,
        query: Option<&str>,
    ) -> Result<QueryResult, ValidationError> {
        run_custom_query(&self.factory, target, query).await
    }
}
