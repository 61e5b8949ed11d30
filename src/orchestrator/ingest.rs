//! Poll cycle: source updates to stored, and possibly published, posts.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, info_span, warn, Instrument};

use super::relay::Relay;
use super::POLL_FAILURE_ALERT_THRESHOLD;
use crate::collector::SourceItem;
use crate::models::analysis::Analysis;
use crate::models::post::Post;
use crate::publisher::Media;
use crate::{AppError, Result};

/// Outcome of one poll cycle.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct PollReport {
    /// New source items ingested.
    pub processed: usize,
    /// Items skipped as duplicates or foreign chats.
    pub skipped: usize,
    /// Collector error that failed the cycle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Relay {
    /// Poll the source once and ingest every new item in cursor order.
    ///
    /// A failed cycle increments the persisted failure counter and alerts
    /// the operator once, when the counter reaches the threshold. A
    /// successful cycle resets it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` only if the failure counter itself cannot be
    /// persisted.
    pub async fn poll_once_at(&mut self, now: DateTime<Utc>) -> Result<PollReport> {
        let span = info_span!("poll_cycle", since = self.state.cursor);
        async move {
            match self.poll_cycle(now).await {
                Ok(mut report) => {
                    self.state.poll_failure_count = 0;
                    self.state.last_poll_success_at = Some(now);
                    self.states.save(&mut self.state).await?;
                    report.error = None;
                    debug!(
                        processed = report.processed,
                        skipped = report.skipped,
                        cursor = self.state.cursor,
                        "poll cycle complete"
                    );
                    Ok(report)
                }
                Err(err) => {
                    self.record_poll_failure(&err).await?;
                    Ok(PollReport {
                        error: Some(err.to_string()),
                        ..PollReport::default()
                    })
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn poll_cycle(&mut self, now: DateTime<Utc>) -> Result<PollReport> {
        let mut items = self.collector.poll_updates(self.state.cursor).await?;
        items.sort_by_key(|item| item.cursor);

        let mut report = PollReport::default();
        for item in items {
            if item.cursor <= self.state.cursor {
                continue;
            }

            if item.chat_id == self.config.source_channel_id {
                if self.ingest_item(&item, now).await? {
                    report.processed += 1;
                } else {
                    report.skipped += 1;
                }
            } else {
                debug!(chat_id = %item.chat_id, cursor = item.cursor, "skipping foreign update");
                report.skipped += 1;
            }

            self.state.cursor = item.cursor;
            self.states.save(&mut self.state).await?;
        }

        Ok(report)
    }

    async fn record_poll_failure(&mut self, err: &AppError) -> Result<()> {
        self.state.poll_failure_count += 1;
        let count = self.state.poll_failure_count;
        self.ops
            .error("poll", &format!("poll cycle failed ({count} in a row)"), err)
            .await;
        self.states.save(&mut self.state).await?;

        if count == POLL_FAILURE_ALERT_THRESHOLD {
            let alert = format!(
                "⚠️ Event Herald: polling has failed {count} times in a row. Last error: {err}"
            );
            match self
                .collector
                .send_message(&self.config.source_channel_id, &alert)
                .await
            {
                Ok(_) => warn!(count, "poll failure alert sent"),
                Err(alert_err) => {
                    self.ops
                        .error("poll", "failed to send poll failure alert", &alert_err)
                        .await;
                }
            }
        }

        Ok(())
    }

    /// Ingest one source item. Returns `false` when it was already seen.
    ///
    /// Collaborator failures are logged and absorbed; only store errors
    /// propagate.
    async fn ingest_item(&mut self, item: &SourceItem, now: DateTime<Utc>) -> Result<bool> {
        let id = item.message_id.to_string();
        if !self.dedupe.is_new(&id).await? {
            debug!(post_id = %id, "already ingested");
            return Ok(false);
        }

        let media = self.fetch_media(item.media.as_ref()).await;
        let enrichment = self.pipeline.run(&item.text, media.as_ref()).await;

        let mut post = Post::new(
            id,
            self.config.source_url(item.message_id),
            item.text.clone(),
            item.media.clone(),
        );
        post.created_at = now;
        post.updated_at = now;
        post.set_analysis(enrichment.analysis);
        post.generated_text = enrichment.generated_text;

        self.posts.save(&post).await?;
        self.dedupe.remember(&post.id);
        info!(post_id = %post.id, kind = ?post.kind(), "post ingested");

        self.dispatch(&mut post, media.as_ref(), now).await?;
        Ok(true)
    }

    /// Decide what happens to a freshly stored post.
    async fn dispatch(
        &self,
        post: &mut Post,
        media: Option<&Media>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let is_thread = matches!(
            post.analysis,
            Some(Analysis::Calendar(_) | Analysis::Recap(_))
        );
        let is_single = matches!(post.analysis, Some(Analysis::Single(_)));
        let is_past = post.analysis.as_ref().is_some_and(Analysis::is_past);

        if is_single && is_past {
            info!(post_id = %post.id, "past event; marking posted without publishing");
            post.mark_posted(None, now)?;
            return self.posts.save(post).await;
        }

        if !is_thread && !(is_single && post.generated_text.is_some()) {
            debug!(post_id = %post.id, "left pending for the digest");
            return Ok(());
        }

        if let Some(result) = self.publish_stored(post, media).await {
            self.settle(post, result, now).await?;
        }
        Ok(())
    }
}
