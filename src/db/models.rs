//! Result-set model types shared by every driver.

use chrono::{DateTime, NaiveDateTime, TimeZone};
use serde::Serialize;

/// A single cell value, independent of the driver that produced it.
///
/// Temporal values never appear here directly: drivers render them with
/// [`canonical_timestamp`] before building a row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ScalarValue {
    /// Parse a decimal rendering into the narrowest numeric variant.
    pub fn from_decimal(s: &str) -> Self {
        if let Ok(i) = s.parse::<i64>() {
            ScalarValue::Int(i)
        } else if let Ok(f) = s.parse::<f64>() {
            ScalarValue::Float(f)
        } else {
            ScalarValue::Text(s.to_string())
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ScalarValue::Int(i) => Some(*i),
            ScalarValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            ScalarValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Display form used when a value is folded into a metrics map.
    pub fn to_display_string(&self) -> Option<String> {
        match self {
            ScalarValue::Null => None,
            ScalarValue::Bool(b) => Some(b.to_string()),
            ScalarValue::Int(i) => Some(i.to_string()),
            ScalarValue::Float(f) => Some(f.to_string()),
            ScalarValue::Text(s) => Some(s.clone()),
        }
    }
}

impl From<&str> for ScalarValue {
    fn from(s: &str) -> Self {
        ScalarValue::Text(s.to_string())
    }
}

impl From<i64> for ScalarValue {
    fn from(i: i64) -> Self {
        ScalarValue::Int(i)
    }
}

impl From<f64> for ScalarValue {
    fn from(f: f64) -> Self {
        ScalarValue::Float(f)
    }
}

/// A fully materialized query result.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RowSet {
    /// Column names in projection order.
    pub columns: Vec<String>,
    /// Rows in the order the engine returned them.
    pub rows: Vec<Vec<ScalarValue>>,
}

impl RowSet {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn first_row(&self) -> Option<&[ScalarValue]> {
        self.rows.first().map(Vec::as_slice)
    }
}

/// Render a timezone-less timestamp as ISO-8601.
///
/// Fractional seconds are printed only when non-zero.
pub fn canonical_timestamp(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
}

/// Render a zoned timestamp as ISO-8601 with its UTC offset.
pub fn canonical_timestamp_tz<Tz: TimeZone>(dt: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    dt.format("%Y-%m-%dT%H:%M:%S%.f%:z").to_string()
}

/// Recognize the textual timestamp layouts databases commonly emit.
pub fn parse_db_time(s: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
    ];

    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}
