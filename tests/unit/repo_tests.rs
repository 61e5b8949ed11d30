//! Unit tests for the `SQLite` repositories.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, TimeZone, Utc};

use event_herald::models::analysis::Analysis;
use event_herald::models::log_entry::LogEntry;
use event_herald::models::post::{MediaRef, Post, PostStatus};
use event_herald::persistence::db::{self, Database};
use event_herald::persistence::{
    log_repo::LogRepo, member_repo::MemberRepo, post_repo::PostRepo, state_repo::StateRepo,
};

async fn memory_db() -> Arc<Database> {
    Arc::new(db::connect_memory().await.expect("db"))
}

fn post(id: &str) -> Post {
    Post::new(id.into(), format!("https://t.me/c/1/{id}"), format!("text {id}"), None)
}

#[tokio::test]
async fn post_round_trips_through_the_store() {
    let repo = PostRepo::new(memory_db().await);
    let mut original = Post::new(
        "10".into(),
        "https://t.me/c/1/10".into(),
        "Poster caption".into(),
        Some(MediaRef {
            file_id: "file-10".into(),
            mime_type: "image/png".into(),
        }),
    );
    original.set_analysis(Analysis::parse(
        r#"{"type": "single", "summary": "Talk", "date": "2026-03-20", "dressCode": "formal"}"#,
    ));
    original.generated_text = Some("Join us!".into());
    repo.save(&original).await.expect("save");

    let loaded = repo.get("10").await.expect("get").expect("stored");
    assert_eq!(loaded.image_ref, original.image_ref);
    assert_eq!(loaded.analysis, original.analysis);
    assert_eq!(loaded.event_date, NaiveDate::from_ymd_opt(2026, 3, 20));
    assert_eq!(loaded.generated_text.as_deref(), Some("Join us!"));
    assert_eq!(loaded.status, PostStatus::Pending);

    assert!(repo.exists("10").await.expect("exists"));
    assert!(!repo.exists("11").await.expect("exists"));
    assert!(repo.get("11").await.expect("get").is_none());
}

#[tokio::test]
async fn save_updates_status_in_place() {
    let repo = PostRepo::new(memory_db().await);
    let mut stored = post("20");
    repo.save(&stored).await.expect("insert");

    stored
        .mark_failed("rate limited", Utc::now())
        .expect("pending -> failed");
    repo.save(&stored).await.expect("update");

    let loaded = repo.get("20").await.expect("get").expect("stored");
    assert_eq!(loaded.status, PostStatus::Failed);
    assert_eq!(loaded.publish_attempts, 1);
    assert_eq!(loaded.last_error.as_deref(), Some("rate limited"));
    assert_eq!(repo.list_recent(10).await.expect("list").len(), 1);
}

#[tokio::test]
async fn retryable_posts_are_failed_with_attempts_left() {
    let repo = PostRepo::new(memory_db().await);
    let now = Utc::now();

    let mut once = post("1");
    once.mark_failed("x", now).expect("fail");
    let mut exhausted = post("2");
    for _ in 0..3 {
        exhausted.mark_failed("x", now).expect("fail");
    }
    let pending = post("3");
    for p in [&once, &exhausted, &pending] {
        repo.save(p).await.expect("save");
    }

    let retryable = repo.list_retryable(3).await.expect("list");
    let ids: Vec<&str> = retryable.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, ["1"]);
}

#[tokio::test]
async fn event_date_listing_matches_the_day_only() {
    let repo = PostRepo::new(memory_db().await);
    for (id, date) in [("1", "2026-03-13"), ("2", "2026-03-14"), ("3", "2026-03-13T19:00:00")] {
        let mut p = post(id);
        p.set_analysis(Analysis::parse(&format!(
            r#"{{"type": "single", "summary": "s", "date": "{date}"}}"#
        )));
        repo.save(&p).await.expect("save");
    }

    let day = NaiveDate::from_ymd_opt(2026, 3, 13).unwrap();
    let listed = repo.list_by_event_date(day).await.expect("list");
    let mut ids: Vec<&str> = listed.iter().map(|p| p.id.as_str()).collect();
    ids.sort_unstable();
    assert_eq!(ids, ["1", "3"]);
}

#[tokio::test]
async fn publishable_posts_need_generated_text_and_a_matching_status() {
    let repo = PostRepo::new(memory_db().await);
    let mut rendered = post("1");
    rendered.generated_text = Some("ready".into());
    let raw_only = post("2");
    let mut done = post("3");
    done.generated_text = Some("done".into());
    done.mark_posted(Some("tw-1".into()), Utc::now()).expect("post");
    for p in [&rendered, &raw_only, &done] {
        repo.save(p).await.expect("save");
    }

    let listed = repo
        .list_publishable(&[PostStatus::Pending])
        .await
        .expect("list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, "1");
}

#[tokio::test]
async fn daily_metrics_count_the_window() {
    let db = memory_db().await;
    let posts = PostRepo::new(Arc::clone(&db));
    let logs = LogRepo::new(Arc::clone(&db));
    let now = Utc::now();

    let mut published = post("1");
    published.generated_text = Some("Published text".into());
    published.mark_posted(Some("tw-1".into()), now).expect("post");
    let mut suppressed = post("2");
    suppressed.mark_posted(None, now).expect("post");
    let mut old = post("3");
    old.created_at = now - Duration::days(2);
    for p in [&published, &suppressed, &old] {
        posts.save(p).await.expect("save");
    }
    logs.append(&LogEntry::new("poll", "timeout", None))
        .await
        .expect("append");

    let metrics = posts
        .daily_metrics(now - Duration::hours(24))
        .await
        .expect("metrics");
    assert_eq!(metrics.ingested, 2);
    assert_eq!(metrics.published, 1);
    assert_eq!(metrics.errors, 1);
    assert_eq!(metrics.posted_texts, ["Published text"]);
}

#[tokio::test]
async fn state_starts_at_zero_and_versions_each_save() {
    let states = StateRepo::new(memory_db().await);
    let mut state = states.load().await.expect("load");
    assert_eq!(state.cursor, 0);
    assert_eq!(state.version, 0);

    state.cursor = 17;
    state.poll_failure_count = 2;
    state.last_digest_day = NaiveDate::from_ymd_opt(2026, 3, 13);
    state.last_poll_success_at = Some(Utc.with_ymd_and_hms(2026, 3, 13, 9, 0, 0).unwrap());
    states.save(&mut state).await.expect("save");
    assert_eq!(state.version, 1);
    states.save(&mut state).await.expect("save");
    assert_eq!(state.version, 2);

    let reloaded = states.load().await.expect("load");
    assert_eq!(reloaded, state);
}

#[tokio::test]
async fn birthday_upsert_keeps_the_celebration_year() {
    let members = MemberRepo::new(memory_db().await);
    let ada = members.upsert_birthday("Ada", "12-10").await.expect("insert");
    members.mark_celebrated(&ada.id, 2025).await.expect("mark");

    let moved = members.upsert_birthday("Ada", "12-11").await.expect("update");
    assert_eq!(moved.id, ada.id);
    assert_eq!(moved.birthday, "12-11");
    assert_eq!(moved.last_celebrated_year, 2025);

    members.upsert_birthday("Bob", "01-02").await.expect("insert");
    let all = members.list().await.expect("list");
    let names: Vec<&str> = all.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, ["Bob", "Ada"]);

    assert!(members.list_birthdays_on("12-10").await.expect("on").is_empty());
    assert_eq!(members.list_birthdays_on("12-11").await.expect("on").len(), 1);
}

#[tokio::test]
async fn log_entries_are_listed_newest_first() {
    let logs = LogRepo::new(memory_db().await);
    let mut first = LogEntry::new("poll", "first", None);
    first.created_at = Utc::now() - Duration::minutes(5);
    logs.append(&first).await.expect("append");
    logs.append(&LogEntry::new("publish", "second", Some(serde_json::json!({"error": "x"}))))
        .await
        .expect("append");

    let listed = logs.list_recent(10).await.expect("list");
    assert_eq!(listed[0].message, "second");
    assert_eq!(listed[0].context, Some(serde_json::json!({"error": "x"})));
    assert_eq!(
        logs.count_since(Utc::now() - Duration::minutes(1))
            .await
            .expect("count"),
        1
    );
}
