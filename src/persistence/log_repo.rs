//! Operator log repository for `SQLite` persistence.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::models::log_entry::LogEntry;
use crate::{AppError, Result};

use super::db::Database;
use super::{fmt_ts, parse_ts};

/// Repository wrapper around `SQLite` for append-only log entries.
#[derive(Clone)]
pub struct LogRepo {
    db: Arc<Database>,
}

#[derive(sqlx::FromRow)]
struct LogRow {
    id: String,
    module: String,
    message: String,
    context: Option<String>,
    created_at: String,
}

impl LogRow {
    fn into_entry(self) -> Result<LogEntry> {
        let context = self
            .context
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| AppError::Db(format!("invalid log context: {e}")))?;
        Ok(LogEntry {
            id: self.id,
            module: self.module,
            message: self.message,
            context,
            created_at: parse_ts("created_at", &self.created_at)?,
        })
    }
}

impl LogRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Append an entry.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails.
    pub async fn append(&self, entry: &LogEntry) -> Result<()> {
        let context = entry.context.as_ref().map(ToString::to_string);
        sqlx::query(
            "INSERT INTO log_entry (id, module, message, context, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&entry.id)
        .bind(&entry.module)
        .bind(&entry.message)
        .bind(&context)
        .bind(fmt_ts(entry.created_at))
        .execute(self.db.as_ref())
        .await?;
        Ok(())
    }

    /// Newest entries first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_recent(&self, limit: u32) -> Result<Vec<LogEntry>> {
        let rows: Vec<LogRow> =
            sqlx::query_as("SELECT * FROM log_entry ORDER BY created_at DESC LIMIT ?1")
                .bind(i64::from(limit))
                .fetch_all(self.db.as_ref())
                .await?;
        rows.into_iter().map(LogRow::into_entry).collect()
    }

    /// Number of entries recorded since `since`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn count_since(&self, since: DateTime<Utc>) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM log_entry WHERE created_at >= ?1")
            .bind(fmt_ts(since))
            .fetch_one(self.db.as_ref())
            .await?;
        Ok(count)
    }

    /// Delete entries older than `cutoff`, returning the number removed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the delete fails.
    pub async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM log_entry WHERE created_at < ?1")
            .bind(fmt_ts(cutoff))
            .execute(self.db.as_ref())
            .await?;
        Ok(result.rows_affected())
    }
}
