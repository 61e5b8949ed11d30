//! Persistence layer modules.

pub mod db;
pub mod log_repo;
pub mod member_repo;
pub mod post_repo;
pub mod retention;
pub mod schema;
pub mod state_repo;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

use crate::{AppError, Result};

/// Re-export the database pool type for convenience.
pub use sqlx::SqlitePool;

/// Fixed-width UTC timestamp so stored values compare lexicographically.
pub(crate) fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(field: &str, raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| AppError::Db(format!("invalid {field}: {e}")))
}

pub(crate) fn parse_day(field: &str, raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| AppError::Db(format!("invalid {field}: {e}")))
}
