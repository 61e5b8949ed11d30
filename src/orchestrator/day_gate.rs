//! Local-day arithmetic for the once-per-day jobs.

use chrono::{DateTime, FixedOffset, NaiveDate, Timelike, Utc};

use crate::config::ScheduleConfig;
use crate::models::scheduler_state::{DailyJob, SchedulerState};

/// Local calendar date and hour of `now` in `tz`.
#[must_use]
pub fn local_day_hour(now: DateTime<Utc>, tz: FixedOffset) -> (NaiveDate, u32) {
    let local = now.with_timezone(&tz);
    (local.date_naive(), local.hour())
}

/// Configured trigger hour of `job`.
#[must_use]
pub fn trigger_hour(schedule: &ScheduleConfig, job: DailyJob) -> u32 {
    match job {
        DailyJob::StatusReport => schedule.report_hour,
        DailyJob::DigestThread => schedule.digest_hour,
        DailyJob::BirthdayCheck => schedule.birthday_hour,
    }
}

/// A job is due when the local hour is its trigger hour and it has not
/// completed today.
#[must_use]
pub fn is_due(
    state: &SchedulerState,
    job: DailyJob,
    today: NaiveDate,
    hour: u32,
    trigger_hour: u32,
) -> bool {
    hour == trigger_hour && state.marker(job) != Some(today)
}
