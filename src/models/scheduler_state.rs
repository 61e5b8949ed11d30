//! Durable cursor, day-gate markers and poll health of the relay actor.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// The periodic jobs gated on a local calendar day.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DailyJob {
    /// Metrics report to the source channel.
    StatusReport,
    /// Thread of today's events.
    DigestThread,
    /// Birthday congratulations.
    BirthdayCheck,
}

impl DailyJob {
    /// All jobs in execution order.
    pub const ALL: [Self; 3] = [Self::StatusReport, Self::DigestThread, Self::BirthdayCheck];

    /// Name used in logs and the operator log table.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StatusReport => "status_report",
            Self::DigestThread => "digest_thread",
            Self::BirthdayCheck => "birthday_check",
        }
    }
}

/// Single versioned record holding all crash-recoverable actor state.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchedulerState {
    /// Last processed source update cursor.
    pub cursor: i64,
    /// Local day the status report last completed.
    pub last_report_day: Option<NaiveDate>,
    /// Local day the digest thread last completed.
    pub last_digest_day: Option<NaiveDate>,
    /// Local day the birthday check last completed.
    pub last_birthday_day: Option<NaiveDate>,
    /// Consecutive failed poll cycles.
    pub poll_failure_count: u32,
    /// Time of the last successful poll cycle.
    pub last_poll_success_at: Option<DateTime<Utc>>,
    /// Incremented on every save.
    pub version: i64,
}

impl SchedulerState {
    /// Day marker of `job`.
    #[must_use]
    pub fn marker(&self, job: DailyJob) -> Option<NaiveDate> {
        match job {
            DailyJob::StatusReport => self.last_report_day,
            DailyJob::DigestThread => self.last_digest_day,
            DailyJob::BirthdayCheck => self.last_birthday_day,
        }
    }

    /// Advance the day marker of `job`.
    pub fn set_marker(&mut self, job: DailyJob, day: NaiveDate) {
        let slot = match job {
            DailyJob::StatusReport => &mut self.last_report_day,
            DailyJob::DigestThread => &mut self.last_digest_day,
            DailyJob::BirthdayCheck => &mut self.last_birthday_day,
        };
        *slot = Some(day);
    }
}
