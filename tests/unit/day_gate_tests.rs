//! Unit tests for local-day gating of the daily jobs.

use chrono::{FixedOffset, NaiveDate, TimeZone, Utc};

use event_herald::config::ScheduleConfig;
use event_herald::models::scheduler_state::{DailyJob, SchedulerState};
use event_herald::orchestrator::day_gate::{is_due, local_day_hour, trigger_hour};

fn utc3() -> FixedOffset {
    FixedOffset::east_opt(3 * 3600).expect("offset")
}

#[test]
fn local_day_rolls_over_before_utc_midnight() {
    let now = Utc.with_ymd_and_hms(2026, 3, 12, 21, 30, 0).unwrap();
    let (day, hour) = local_day_hour(now, utc3());
    assert_eq!(day, NaiveDate::from_ymd_opt(2026, 3, 13).unwrap());
    assert_eq!(hour, 0);
}

#[test]
fn default_trigger_hours() {
    let schedule = ScheduleConfig::default();
    assert_eq!(trigger_hour(&schedule, DailyJob::StatusReport), 0);
    assert_eq!(trigger_hour(&schedule, DailyJob::DigestThread), 6);
    assert_eq!(trigger_hour(&schedule, DailyJob::BirthdayCheck), 8);
}

#[test]
fn job_is_due_once_per_day_at_its_hour() {
    let today = NaiveDate::from_ymd_opt(2026, 3, 13).unwrap();
    let mut state = SchedulerState::default();

    assert!(is_due(&state, DailyJob::DigestThread, today, 6, 6));
    assert!(!is_due(&state, DailyJob::DigestThread, today, 7, 6));

    state.set_marker(DailyJob::DigestThread, today);
    assert!(!is_due(&state, DailyJob::DigestThread, today, 6, 6));
    assert!(is_due(&state, DailyJob::StatusReport, today, 6, 6));

    let tomorrow = today.succ_opt().unwrap();
    assert!(is_due(&state, DailyJob::DigestThread, tomorrow, 6, 6));
}

#[test]
fn markers_are_tracked_per_job() {
    let day = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
    let mut state = SchedulerState::default();
    state.set_marker(DailyJob::BirthdayCheck, day);

    assert_eq!(state.marker(DailyJob::BirthdayCheck), Some(day));
    assert_eq!(state.last_birthday_day, Some(day));
    assert_eq!(state.marker(DailyJob::StatusReport), None);
}
