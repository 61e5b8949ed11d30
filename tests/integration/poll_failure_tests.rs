//! Integration tests for poll failure counting and escalation.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use event_herald::persistence::state_repo::StateRepo;

use super::test_helpers::{harness, local, text_item, CHANNEL};

#[tokio::test]
async fn failures_count_up_and_alert_exactly_once() {
    let mut h = harness().await;
    h.collector.failing_polls.store(6, Ordering::SeqCst);

    for attempt in 1..=6_u32 {
        let report = h
            .relay
            .poll_once_at(local(2026, 3, 14, 10, attempt * 5))
            .await
            .expect("failure is absorbed");
        assert!(report.error.is_some());
        assert_eq!(h.relay.state().poll_failure_count, attempt);
    }

    let sent = h.collector.sent();
    assert_eq!(sent.len(), 1, "alert fires once, at the threshold");
    assert_eq!(sent[0].0, CHANNEL);
    assert!(sent[0].1.contains("5 times"));

    let persisted = StateRepo::new(Arc::clone(&h.db)).load().await.expect("load");
    assert_eq!(persisted.poll_failure_count, 6);
}

#[tokio::test]
async fn success_resets_the_counter() {
    let mut h = harness().await;
    h.collector.failing_polls.store(2, Ordering::SeqCst);
    h.collector.push(text_item(1, 501, "hello"));

    h.relay
        .poll_once_at(local(2026, 3, 14, 10, 0))
        .await
        .expect("poll");
    h.relay
        .poll_once_at(local(2026, 3, 14, 10, 5))
        .await
        .expect("poll");
    assert_eq!(h.relay.state().poll_failure_count, 2);
    assert_eq!(h.relay.state().cursor, 0, "failed polls do not move the cursor");

    let now = local(2026, 3, 14, 10, 10);
    let report = h.relay.poll_once_at(now).await.expect("poll");
    assert!(report.error.is_none());
    assert_eq!(report.processed, 1);

    let state = StateRepo::new(Arc::clone(&h.db)).load().await.expect("load");
    assert_eq!(state.poll_failure_count, 0);
    assert_eq!(state.last_poll_success_at, Some(now));
    assert_eq!(state.cursor, 1);
    assert!(h.collector.sent().is_empty());
}

#[tokio::test]
async fn health_degrades_at_threshold_and_when_stale() {
    let mut h = harness().await;
    let start = local(2026, 3, 14, 10, 0);

    let health = h.relay.health_at(start);
    assert!(!health.healthy, "no successful poll yet");

    h.relay.poll_once_at(start).await.expect("poll");
    assert!(h.relay.health_at(start).healthy);
    assert!(h.relay.health_at(local(2026, 3, 14, 10, 15)).healthy);

    let stale = h.relay.health_at(local(2026, 3, 14, 10, 16));
    assert!(!stale.healthy);
    assert!(stale.reason.expect("reason").contains("last successful poll"));

    h.collector.failing_polls.store(5, Ordering::SeqCst);
    for minute in 1..=4 {
        h.relay
            .poll_once_at(local(2026, 3, 14, 10, minute))
            .await
            .expect("poll");
    }
    assert!(h.relay.health_at(local(2026, 3, 14, 10, 5)).healthy);

    h.relay
        .poll_once_at(local(2026, 3, 14, 10, 5))
        .await
        .expect("poll");
    let degraded = h.relay.health_at(local(2026, 3, 14, 10, 5));
    assert!(!degraded.healthy);
    assert_eq!(degraded.poll_failure_count, 5);
}
