//! Integration tests for the log retention purge.

use std::sync::Arc;

use chrono::{Duration, Utc};

use event_herald::models::log_entry::LogEntry;
use event_herald::persistence::{db, log_repo::LogRepo, retention};

#[tokio::test]
async fn purge_removes_only_expired_log_entries() {
    let db = Arc::new(db::connect_memory().await.expect("db"));
    let repo = LogRepo::new(Arc::clone(&db));

    let mut old = LogEntry::new("poll", "ancient failure", None);
    old.created_at = Utc::now() - Duration::days(31);
    repo.append(&old).await.expect("append old");

    let recent = LogEntry::new("poll", "recent failure", None);
    repo.append(&recent).await.expect("append recent");

    let removed = retention::purge(&db, 30).await.expect("purge");
    assert_eq!(removed, 1);

    let remaining = repo.list_recent(10).await.expect("list");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].message, "recent failure");
}

#[tokio::test]
async fn purge_on_empty_table_is_a_no_op() {
    let db = Arc::new(db::connect_memory().await.expect("db"));
    assert_eq!(retention::purge(&db, 30).await.expect("purge"), 0);
}
