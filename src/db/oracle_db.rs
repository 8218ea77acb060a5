//! Oracle driver built on the `oracle` crate (ODPI-C).
//!
//! Every call into the client library blocks, so it runs on tokio's
//! blocking pool. The connect timeout is also handed to the client in the
//! descriptor, so a connect to an unreachable host ends on its own instead
//! of pinning a blocking thread until the OS gives up.

use super::{canonical_timestamp, canonical_timestamp_tz, Connection, DbError, Driver, RowSet, ScalarValue};
use crate::targets::TargetConfig;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime};
use oracle::sql_type::OracleType;
use std::sync::Arc;

pub struct OracleDriver;

/// Easy Connect Plus descriptor for a target:
/// `//host:port/service_name?connect_timeout=N&transport_connect_timeout=N`.
///
/// Both bounds are in whole seconds, rounded up from the target's
/// millisecond timeout.
pub fn connect_string(target: &TargetConfig) -> String {
    let secs = target.connect_timeout_ms.div_ceil(1000).max(1);
    format!(
        "//{}:{}/{}?connect_timeout={}&transport_connect_timeout={}",
        target.host, target.port, target.service_name, secs, secs
    )
}

#[async_trait]
impl Driver for OracleDriver {
    async fn connect(&self, target: &TargetConfig) -> Result<Box<dyn Connection>, DbError> {
        let user = target.user.clone();
        let password = target.password.clone();
        let dsn = connect_string(target);

        let conn = tokio::task::spawn_blocking(move || {
            oracle::Connector::new(user, password, dsn).connect()
        })
        .await
        .map_err(|e| DbError::Connection(e.to_string()))?
        .map_err(|e| DbError::Connection(e.to_string()))?;

        Ok(Box::new(OracleConnection {
            conn: Arc::new(conn),
        }))
    }
}

struct OracleConnection {
    conn: Arc<oracle::Connection>,
}

#[async_trait]
impl Connection for OracleConnection {
    async fn query(&mut self, sql: &str) -> Result<RowSet, DbError> {
        let conn = self.conn.clone();
        let sql = sql.to_string();

        tokio::task::spawn_blocking(move || {
            read_rows(&conn, &sql).map_err(|e| DbError::Query(e.to_string()))
        })
        .await
        .map_err(|e| DbError::Query(e.to_string()))?
    }

    async fn close(self: Box<Self>) -> Result<(), DbError> {
        let conn = self.conn;
        tokio::task::spawn_blocking(move || conn.close())
            .await
            .map_err(|e| DbError::Query(e.to_string()))?
            .map_err(|e| DbError::Query(e.to_string()))
    }
}

fn read_rows(conn: &oracle::Connection, sql: &str) -> oracle::Result<RowSet> {
    let rows = conn.query(sql, &[])?;
    let types: Vec<OracleType> = rows
        .column_info()
        .iter()
        .map(|c| c.oracle_type().clone())
        .collect();
    let mut result = RowSet::new(rows.column_info().iter().map(|c| c.name().to_string()).collect());

    for row in rows {
        let row = row?;
        let mut values = Vec::with_capacity(types.len());
        for (value, oracle_type) in row.sql_values().iter().zip(&types) {
            if value.is_null()? {
                values.push(ScalarValue::Null);
                continue;
            }
            let scalar = match oracle_type {
                OracleType::Date | OracleType::Timestamp(_) => {
                    ScalarValue::Text(canonical_timestamp(&value.get::<NaiveDateTime>()?))
                }
                OracleType::TimestampTZ(_) | OracleType::TimestampLTZ(_) => {
                    ScalarValue::Text(canonical_timestamp_tz(&value.get::<DateTime<FixedOffset>>()?))
                }
                OracleType::Number(..)
                | OracleType::Float(_)
                | OracleType::BinaryFloat
                | OracleType::BinaryDouble
                | OracleType::Int64
                | OracleType::UInt64 => ScalarValue::from_decimal(&value.get::<String>()?),
                OracleType::Boolean => ScalarValue::Bool(value.get::<bool>()?),
                _ => ScalarValue::Text(value.get::<String>()?),
            };
            values.push(scalar);
        }
        result.rows.push(values);
    }

    Ok(result)
}
