use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::{Value, ValueRef};

use crate::db::models::ReadingValue;

/// SQLite `LIMIT` value; anything past the INTEGER range means "no limit".
pub fn limit_to_i64(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_optional_datetime(
    value: Option<String>,
    field: &str,
) -> Result<Option<DateTime<Utc>>> {
    match value {
        Some(raw) => parse_datetime(&raw, field).map(Some),
        None => Ok(None),
    }
}

/// Numbers are stored as REAL and composites as TEXT in the same untyped
/// column, so the variant survives a round trip.
pub fn reading_value_to_sql(value: &ReadingValue) -> Value {
    match value {
        ReadingValue::Number(number) => Value::Real(*number),
        ReadingValue::Composite(raw) => Value::Text(raw.clone()),
    }
}

pub fn reading_value_from_sql(value: ValueRef<'_>, field: &str) -> Result<ReadingValue> {
    match value {
        ValueRef::Real(number) => Ok(ReadingValue::Number(number)),
        ValueRef::Integer(number) => Ok(ReadingValue::Number(number as f64)),
        ValueRef::Text(bytes) => std::str::from_utf8(bytes)
            .map(|raw| ReadingValue::Composite(raw.to_string()))
            .with_context(|| format!("{field} is not valid UTF-8")),
        ValueRef::Null => Err(anyhow!("{field} is NULL")),
        ValueRef::Blob(_) => Err(anyhow!("{field} holds an unexpected BLOB")),
    }
}
