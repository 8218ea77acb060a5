//! Tabular reports built from fixed queries.

use super::{elapsed_ms, ErrorKind, MonitorError, OpStatus};
use crate::db::{ConnectionFactory, DbError, Dialect, RowSet, ScalarValue};
use crate::targets::TargetConfig;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Instant;

/// Columns and rows of a successful report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportData {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<ScalarValue>>,
    pub row_count: usize,
}

impl From<RowSet> for ReportData {
    fn from(set: RowSet) -> Self {
        Self {
            row_count: set.row_count(),
            columns: set.columns,
            rows: set.rows,
        }
    }
}

/// Shared shape of the tablespace, session and custom query results.
#[derive(Debug, Clone, Serialize)]
pub struct TabularReport {
    #[serde(rename = "database_name")]
    pub target_name: String,
    pub status: OpStatus,
    pub database: String,
    pub response_time_ms: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub data: Option<ReportData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl TabularReport {
    pub fn is_success(&self) -> bool {
        self.status == OpStatus::Success
    }
}

/// Tablespace usage, one row per tablespace ordered by name.
pub async fn tablespace_report(factory: &ConnectionFactory, target: &TargetConfig) -> TabularReport {
    let dialect = Dialect::for_driver(target.driver);
    run_report(factory, target, Some(dialect.tablespace), "tablespace").await
}

/// User sessions ordered by status, then longest idle first.
pub async fn session_report(factory: &ConnectionFactory, target: &TargetConfig) -> TabularReport {
    let dialect = Dialect::for_driver(target.driver);
    run_report(factory, target, dialect.sessions, "session").await
}

/// Open, run one statement, release, and wrap the rows.
pub(crate) async fn run_report(
    factory: &ConnectionFactory,
    target: &TargetConfig,
    sql: Option<&str>,
    label: &str,
) -> TabularReport {
    let start = Instant::now();
    let outcome = match sql {
        Some(sql) => fetch(factory, target, sql).await,
        None => Err(DbError::Query(format!(
            "{} report is not supported by the {} driver",
            label, target.driver
        ))
        .into()),
    };
    let response_time_ms = elapsed_ms(start);

    let (status, data, error, error_kind) = match outcome {
        Ok(rows) => {
            tracing::debug!("{} report {}: {} rows in {}ms", label, target.name, rows.row_count(), response_time_ms);
            (OpStatus::Success, Some(ReportData::from(rows)), None, None)
        }
        Err(e) => {
            tracing::warn!("{} report {}: {}", label, target.name, e);
            (OpStatus::Error, None, Some(e.to_string()), Some(e.kind()))
        }
    };

    TabularReport {
        target_name: target.name.clone(),
        status,
        database: target.database_identifier(),
        response_time_ms,
        timestamp: Utc::now(),
        data,
        error,
        error_kind,
    }
}

async fn fetch(factory: &ConnectionFactory, target: &TargetConfig, sql: &str) -> Result<RowSet, MonitorError> {
    let mut conn = factory.open(target).await?;
    let result = conn.execute(sql).await;
    conn.release().await;
    Ok(result?)
}
