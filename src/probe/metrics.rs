//! Instance-level diagnostics.

use super::{elapsed_ms, ErrorKind, MonitorError, OpStatus};
use crate::db::{ConnectionFactory, ConnectionHandle, Dialect, RowSet, ScalarValue};
use crate::targets::TargetConfig;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Instant;

/// Values gathered by the metrics battery.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InstanceMetrics {
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_status: Option<String>,
    /// Canonical ISO-8601 startup time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub startup_time: Option<String>,
}

/// Result of the metrics battery. `metrics` is all-or-nothing.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsResult {
    #[serde(rename = "database_name")]
    pub target_name: String,
    pub status: OpStatus,
    pub database: String,
    pub response_time_ms: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<InstanceMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

/// Run version, instance and startup queries on one connection.
///
/// The first failing query aborts the battery; no partial map is returned.
pub async fn collect_metrics(factory: &ConnectionFactory, target: &TargetConfig) -> MetricsResult {
    let start = Instant::now();
    let outcome = gather(factory, target).await;
    let response_time_ms = elapsed_ms(start);

    let (status, metrics, error, error_kind) = match outcome {
        Ok(metrics) => (OpStatus::Success, Some(metrics), None, None),
        Err(e) => {
            tracing::warn!("Metrics {}: {}", target.name, e);
            (OpStatus::Error, None, Some(e.to_string()), Some(e.kind()))
        }
    };

    MetricsResult {
        target_name: target.name.clone(),
        status,
        database: target.database_identifier(),
        response_time_ms,
        timestamp: Utc::now(),
        metrics,
        error,
        error_kind,
    }
}

async fn gather(factory: &ConnectionFactory, target: &TargetConfig) -> Result<InstanceMetrics, MonitorError> {
    let dialect = Dialect::for_driver(target.driver);
    let mut conn = factory.open(target).await?;
    let result = run_battery(&mut conn, dialect).await;
    conn.release().await;
    result
}

async fn run_battery(conn: &mut ConnectionHandle, dialect: &Dialect) -> Result<InstanceMetrics, MonitorError> {
    let mut metrics = InstanceMetrics::default();

    let version = conn.execute(dialect.version).await?;
    metrics.version = cell(&version, 0).unwrap_or_else(|| "Unknown".to_string());

    let instance = conn.execute(dialect.instance).await?;
    metrics.instance_name = cell(&instance, 0);
    metrics.instance_status = cell(&instance, 1);
    metrics.database_status = cell(&instance, 2);

    if let Some(sql) = dialect.startup_time {
        let startup = conn.execute(sql).await?;
        metrics.startup_time = cell(&startup, 0);
    }

    Ok(metrics)
}

/// Column `i` of the first row, if any.
fn cell(rows: &RowSet, i: usize) -> Option<String> {
    rows.first_row()
        .and_then(|row| row.get(i))
        .and_then(ScalarValue::to_display_string)
}
