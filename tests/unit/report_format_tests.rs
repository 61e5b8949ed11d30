//! Unit tests for report, thread and retry formatting helpers.

use chrono::{Duration, NaiveDate, Utc};

use event_herald::models::analysis::{CalendarEvent, CalendarFacts};
use event_herald::models::post::Post;
use event_herald::orchestrator::jobs::{fallback_congratulation, format_report};
use event_herald::orchestrator::relay::retry_due;
use event_herald::orchestrator::threads::{
    calendar_entry, calendar_header, digest_header, fit_post, MAX_POST_CHARS,
};
use event_herald::persistence::post_repo::DailyMetrics;

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 13).unwrap()
}

#[test]
fn empty_report_says_nothing_was_published() {
    let report = format_report(day(), &DailyMetrics::default());

    assert!(report.starts_with("📊 *Event Herald Daily Report*\n📅 Date: 2026-03-13\n"));
    assert!(report.contains("- Messages Ingested: 0"));
    assert!(report.contains("- Success Rate: 0.0%"));
    assert!(report.ends_with("📭 No posts published in the last 24h."));
}

#[test]
fn report_lists_published_texts_and_truncates_long_ones() {
    let long = "x".repeat(150);
    let metrics = DailyMetrics {
        ingested: 4,
        published: 2,
        errors: 1,
        posted_texts: vec!["Short post".into(), long],
    };
    let report = format_report(day(), &metrics);

    assert!(report.contains("- Posts Published: 2"));
    assert!(report.contains("- System Errors: 1"));
    assert!(report.contains("- Success Rate: 50.0%"));
    assert!(report.contains("🐦 *Posts Published:*"));
    assert!(report.contains("1. Short post\n"));
    assert!(report.contains(&format!("2. {}...\n", "x".repeat(97))));
}

#[test]
fn report_layout_is_exact() {
    let metrics = DailyMetrics {
        ingested: 3,
        published: 1,
        errors: 0,
        posted_texts: vec!["Blood drive".into()],
    };

    assert_eq!(
        format_report(day(), &metrics),
        "📊 *Event Herald Daily Report*\n\
         📅 Date: 2026-03-13\n\n\
         📈 *System Metrics (Last 24h):*\n\
         - Messages Ingested: 3\n\
         - Posts Published: 1\n\
         - System Errors: 0\n\
         - Success Rate: 33.3%\n\n\
         🐦 *Posts Published:*\n\
         1. Blood drive\n"
    );
}

#[test]
fn fit_post_keeps_short_text() {
    assert_eq!(fit_post("  Join us Friday!  "), "Join us Friday!");
    let exact = "y".repeat(MAX_POST_CHARS);
    assert_eq!(fit_post(&exact), exact);
}

#[test]
fn fit_post_truncates_with_an_ellipsis() {
    let fitted = fit_post(&"é".repeat(400));
    assert_eq!(fitted.chars().count(), MAX_POST_CHARS);
    assert!(fitted.ends_with('…'));

    let spaced = format!("{} {}", "a".repeat(278), "b".repeat(10));
    let fitted = fit_post(&spaced);
    assert_eq!(fitted, format!("{}…", "a".repeat(278)));
}

#[test]
fn calendar_texts() {
    let facts = CalendarFacts {
        club_name: Some("Rotaract".into()),
        month: Some("March 2026".into()),
        ..CalendarFacts::default()
    };
    assert!(calendar_header(&facts).starts_with("📅 Rotaract events for March 2026: "));
    assert!(calendar_header(&CalendarFacts::default()).starts_with("📅 Club events for this month: "));

    let full = CalendarEvent {
        date: Some("2026-03-05".into()),
        title: "Blood drive".into(),
        venue: Some("City Hall".into()),
        time: Some("10:00".into()),
    };
    assert_eq!(calendar_entry(&full), "2026-03-05: Blood drive at City Hall, 10:00");

    let bare = CalendarEvent {
        title: "Career talk".into(),
        venue: Some(" ".into()),
        ..CalendarEvent::default()
    };
    assert_eq!(calendar_entry(&bare), "Career talk");
}

#[test]
fn digest_header_names_the_local_day() {
    assert!(digest_header(day()).starts_with("📅 Events for March 13, 2026: "));
}

#[test]
fn fallback_congratulation_names_the_member() {
    assert!(fallback_congratulation("Ada").starts_with("🎉 Happy birthday, Ada!"));
}

#[test]
fn retry_backoff_doubles_per_attempt() {
    let failed_at = Utc::now();
    let mut post = Post::new("1".into(), "u".into(), "text".into(), None);
    assert!(!retry_due(&post, failed_at + Duration::hours(1)));

    post.mark_failed("boom", failed_at).expect("fail");
    assert!(!retry_due(&post, failed_at + Duration::minutes(4)));
    assert!(retry_due(&post, failed_at + Duration::minutes(5)));

    post.mark_failed("boom", failed_at).expect("fail");
    assert!(!retry_due(&post, failed_at + Duration::minutes(9)));
    assert!(retry_due(&post, failed_at + Duration::minutes(10)));

    post.mark_failed("boom", failed_at).expect("fail");
    assert!(!retry_due(&post, failed_at + Duration::days(1)));
}
