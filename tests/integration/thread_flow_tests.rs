//! Integration tests for calendar and recap threads.

use std::sync::Arc;

use event_herald::models::post::PostStatus;
use event_herald::persistence::post_repo::PostRepo;

use super::test_helpers::{calendar_json, harness, local, photo_item};

#[tokio::test]
async fn calendar_with_two_entries_makes_four_chained_calls() {
    let mut h = harness().await;
    h.analyzer.set_image(Some(calendar_json()));
    h.collector.push(photo_item(1, 401, "", "poster-1"));

    h.relay
        .poll_once_at(local(2026, 3, 1, 9, 0))
        .await
        .expect("poll");

    let calls = h.publisher.calls();
    assert_eq!(calls.len(), 4, "root + 2 entries + call to action");

    assert!(calls[0].text.contains("Rotaract events for March 2026"));
    assert_eq!(calls[0].media.as_deref(), Some("bytes-of-poster-1"));
    assert_eq!(calls[0].reply_to, None);

    assert_eq!(calls[1].text, "2026-03-05: Blood drive at City Hall, 10:00");
    assert_eq!(calls[1].reply_to.as_deref(), Some("tw-1"));
    assert_eq!(calls[2].text, "2026-03-19: Career talk");
    assert_eq!(calls[2].reply_to.as_deref(), Some("tw-2"));
    assert_eq!(calls[3].reply_to.as_deref(), Some("tw-3"));
    assert!(calls[1..].iter().all(|c| c.media.is_none()));

    // Calendar headers are built locally, not rendered.
    assert!(!h.analyzer.calls().contains(&"render_post_text"));

    let post = PostRepo::new(Arc::clone(&h.db))
        .get("401")
        .await
        .expect("get")
        .expect("stored");
    assert_eq!(post.status, PostStatus::Posted);
    assert_eq!(post.external_id.as_deref(), Some("tw-1"));
}

#[tokio::test]
async fn failed_reply_keeps_the_same_parent() {
    let mut h = harness().await;
    h.analyzer.set_image(Some(calendar_json()));
    h.publisher.fail_call(1);
    h.collector.push(photo_item(1, 402, "", "poster-2"));

    h.relay
        .poll_once_at(local(2026, 3, 1, 9, 0))
        .await
        .expect("poll");

    let calls = h.publisher.calls();
    assert_eq!(calls.len(), 4);
    assert_eq!(calls[1].reply_to.as_deref(), Some("tw-1"));
    // The first entry failed, so the second replies to the root again.
    assert_eq!(calls[2].reply_to.as_deref(), Some("tw-1"));
    assert_eq!(calls[3].reply_to.as_deref(), Some("tw-3"));

    let post = PostRepo::new(Arc::clone(&h.db))
        .get("402")
        .await
        .expect("get")
        .expect("stored");
    assert_eq!(post.status, PostStatus::Posted);
    assert_eq!(post.external_id.as_deref(), Some("tw-1"));
}

#[tokio::test]
async fn root_failure_fails_the_thread() {
    let mut h = harness().await;
    h.analyzer.set_image(Some(calendar_json()));
    h.publisher.fail_call(0);
    h.collector.push(photo_item(1, 403, "", "poster-3"));

    h.relay
        .poll_once_at(local(2026, 3, 1, 9, 0))
        .await
        .expect("poll");

    assert_eq!(h.publisher.calls().len(), 1, "no replies without a root");
    let post = PostRepo::new(Arc::clone(&h.db))
        .get("403")
        .await
        .expect("get")
        .expect("stored");
    assert_eq!(post.status, PostStatus::Failed);
    assert_eq!(post.publish_attempts, 1);
    assert!(post.external_id.is_none());
}

#[tokio::test]
async fn recap_thread_posts_highlights_then_summary() {
    let mut h = harness().await;
    h.analyzer.set_image(Some(
        r#"{"type":"recap","clubName":"Rotaract","title":"Tree planting",
            "summary":"Thanks to all 40 volunteers!",
            "highlights":["120 trees planted","New partnership with the city"]}"#
            .into(),
    ));
    h.analyzer
        .set_render(Some("What a day at the tree planting 🌳".into()));
    h.collector.push(photo_item(1, 404, "", "recap-1"));

    h.relay
        .poll_once_at(local(2026, 3, 1, 9, 0))
        .await
        .expect("poll");

    let texts: Vec<String> = h.publisher.calls().into_iter().map(|c| c.text).collect();
    assert_eq!(
        texts,
        vec![
            "What a day at the tree planting 🌳".to_owned(),
            "120 trees planted".to_owned(),
            "New partnership with the city".to_owned(),
            "Thanks to all 40 volunteers!".to_owned(),
        ]
    );

    let post = PostRepo::new(Arc::clone(&h.db))
        .get("404")
        .await
        .expect("get")
        .expect("stored");
    assert_eq!(post.status, PostStatus::Posted);
    assert_eq!(post.external_id.as_deref(), Some("tw-1"));
}
