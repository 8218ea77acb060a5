//! Caller-supplied read-only queries.
//!
//! The read-only gate is a keyword substring scan, not a parser. It can
//! reject harmless queries (a string literal containing "DROP") and it is
//! not a security boundary; grant the monitoring account read-only
//! privileges regardless.

use super::{report::run_report, TabularReport, ValidationError};
use crate::db::ConnectionFactory;
use crate::targets::TargetConfig;

/// A custom query result has the same shape as a fixed report.
pub type QueryResult = TabularReport;

/// Statements that can change data, schema or privileges.
pub const DENIED_KEYWORDS: [&str; 9] = [
    "INSERT", "UPDATE", "DELETE", "DROP", "CREATE", "ALTER", "TRUNCATE", "GRANT", "REVOKE",
];

/// Check a caller query before any connection is made.
pub fn validate_query(query: Option<&str>) -> Result<&str, ValidationError> {
    let query = match query {
        Some(q) if !q.trim().is_empty() => q,
        _ => return Err(ValidationError::Empty),
    };

    let upper = query.to_uppercase();
    if DENIED_KEYWORDS.iter().any(|kw| upper.contains(kw)) {
        return Err(ValidationError::NotReadOnly);
    }

    Ok(query)
}

/// Validate, then execute `query` and return every row it produces.
///
/// Validation failures come back as `Err` without touching the database;
/// execution failures are folded into the returned report.
pub async fn run_custom_query(
    factory: &ConnectionFactory,
    target: &TargetConfig,
    query: Option<&str>,
) -> Result<QueryResult, ValidationError> {
    let query = validate_query(query).map_err(|e| {
        tracing::info!("Rejected custom query for {}: {}", target.name, e);
        e
    })?;
    Ok(run_report(factory, target, Some(query), "custom query").await)
}
