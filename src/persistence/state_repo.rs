//! Scheduler state repository: one row, replaced as a unit.

use std::sync::Arc;

use crate::models::scheduler_state::SchedulerState;
use crate::Result;

use super::db::Database;
use super::{fmt_ts, parse_day, parse_ts};

/// Repository for the singleton [`SchedulerState`] record.
#[derive(Clone)]
pub struct StateRepo {
    db: Arc<Database>,
}

#[derive(sqlx::FromRow)]
struct StateRow {
    cursor: i64,
    last_report_day: Option<String>,
    last_digest_day: Option<String>,
    last_birthday_day: Option<String>,
    poll_failure_count: i64,
    last_poll_success_at: Option<String>,
    version: i64,
}

impl StateRow {
    fn into_state(self) -> Result<SchedulerState> {
        let day = |field: &str, raw: Option<String>| {
            raw.as_deref().map(|raw| parse_day(field, raw)).transpose()
        };
        Ok(SchedulerState {
            cursor: self.cursor,
            last_report_day: day("last_report_day", self.last_report_day)?,
            last_digest_day: day("last_digest_day", self.last_digest_day)?,
            last_birthday_day: day("last_birthday_day", self.last_birthday_day)?,
            poll_failure_count: u32::try_from(self.poll_failure_count).unwrap_or(u32::MAX),
            last_poll_success_at: self
                .last_poll_success_at
                .as_deref()
                .map(|raw| parse_ts("last_poll_success_at", raw))
                .transpose()?,
            version: self.version,
        })
    }
}

impl StateRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Load the persisted state, or the zero state on a fresh database.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails or a stored value is malformed.
    pub async fn load(&self) -> Result<SchedulerState> {
        let row: Option<StateRow> = sqlx::query_as(
            "SELECT cursor, last_report_day, last_digest_day, last_birthday_day,
             poll_failure_count, last_poll_success_at, version
             FROM scheduler_state WHERE id = 1",
        )
        .fetch_optional(self.db.as_ref())
        .await?;

        row.map_or_else(|| Ok(SchedulerState::default()), StateRow::into_state)
    }

    /// Persist `state` in a single statement and bump its version.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the write fails; `state.version` is left
    /// unchanged in that case.
    pub async fn save(&self, state: &mut SchedulerState) -> Result<()> {
        let next_version = state.version + 1;
        sqlx::query(
            "INSERT INTO scheduler_state (id, cursor, last_report_day, last_digest_day,
             last_birthday_day, poll_failure_count, last_poll_success_at, version)
             VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                cursor = excluded.cursor,
                last_report_day = excluded.last_report_day,
                last_digest_day = excluded.last_digest_day,
                last_birthday_day = excluded.last_birthday_day,
                poll_failure_count = excluded.poll_failure_count,
                last_poll_success_at = excluded.last_poll_success_at,
                version = excluded.version",
        )
        .bind(state.cursor)
        .bind(state.last_report_day.map(|d| d.to_string()))
        .bind(state.last_digest_day.map(|d| d.to_string()))
        .bind(state.last_birthday_day.map(|d| d.to_string()))
        .bind(i64::from(state.poll_failure_count))
        .bind(state.last_poll_success_at.map(fmt_ts))
        .bind(next_version)
        .execute(self.db.as_ref())
        .await?;

        state.version = next_version;
        Ok(())
    }
}
