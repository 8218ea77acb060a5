//! Single-shot liveness probe.

use super::{elapsed_ms, ErrorKind, MonitorError};
use crate::db::{ConnectionFactory, DbError, Dialect, RowSet};
use crate::targets::TargetConfig;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Instant;

/// Liveness classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProbeStatus {
    Up,
    Down,
}

/// Result of one health probe. `error` is present iff the target is down.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeResult {
    #[serde(rename = "database_name")]
    pub target_name: String,
    pub status: ProbeStatus,
    pub database: String,
    pub response_time_ms: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl ProbeResult {
    pub fn is_up(&self) -> bool {
        self.status == ProbeStatus::Up
    }
}

/// Probe `target`: connect, run the liveness query, classify, release.
///
/// The timer covers connection, query and release, on every path.
pub async fn run_health_probe(factory: &ConnectionFactory, target: &TargetConfig) -> ProbeResult {
    let start = Instant::now();
    let outcome = check(factory, target).await;
    let response_time_ms = elapsed_ms(start);

    let (status, error, error_kind) = match outcome {
        Ok(()) => {
            tracing::debug!("Probe {}: UP in {}ms", target.name, response_time_ms);
            (ProbeStatus::Up, None, None)
        }
        Err(e) => {
            tracing::warn!("Probe {}: DOWN in {}ms: {}", target.name, response_time_ms, e);
            (ProbeStatus::Down, Some(e.to_string()), Some(e.kind()))
        }
    };

    ProbeResult {
        target_name: target.name.clone(),
        status,
        database: target.database_identifier(),
        response_time_ms,
        timestamp: Utc::now(),
        error,
        error_kind,
    }
}

async fn check(factory: &ConnectionFactory, target: &TargetConfig) -> Result<(), MonitorError> {
    let dialect = Dialect::for_driver(target.driver);
    let mut conn = factory.open(target).await?;
    let result = conn.execute(dialect.liveness).await;
    conn.release().await;
    verify_liveness(&result?)?;
    Ok(())
}

/// Exactly one row holding exactly the value `1`.
fn verify_liveness(rows: &RowSet) -> Result<(), DbError> {
    match rows.rows.as_slice() {
        [row] if row.len() == 1 && row[0].as_i64() == Some(1) => Ok(()),
        _ => Err(DbError::Query(format!(
            "unexpected liveness result: {} row(s)",
            rows.row_count()
        ))),
    }
}
