//! Single posts and reply-chained threads.
//!
//! A thread is a root post followed by strictly sequential replies, each
//! replying to the current tail of the chain. Only the root can fail the
//! thread; a failed reply is logged and the tail stays where it was.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, info_span, Instrument};

use super::ops_log::OpsLog;
use crate::models::analysis::{CalendarEvent, CalendarFacts, RecapFacts};
use crate::publisher::{Media, Publisher};
use crate::Result;

/// Character limit of one published post.
pub const MAX_POST_CHARS: usize = 280;

/// Closing reply of calendar and digest threads.
pub const CALL_TO_ACTION: &str =
    "Follow us for daily updates on club events, and tag a friend who should be there! 🙌";

/// Position of a thread under construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyChain {
    /// Id of the root post; identifies the whole thread.
    pub root: String,
    /// Id of the most recent successful post; the next reply targets it.
    pub tail: String,
}

impl ReplyChain {
    fn new(root: String) -> Self {
        Self {
            tail: root.clone(),
            root,
        }
    }
}

/// Truncate `text` to the post limit, marking the cut with an ellipsis.
#[must_use]
pub fn fit_post(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() <= MAX_POST_CHARS {
        return text.to_owned();
    }
    let mut cut: String = text.chars().take(MAX_POST_CHARS - 1).collect();
    cut.truncate(cut.trim_end().len());
    cut.push('…');
    cut
}

/// Header of a calendar thread.
#[must_use]
pub fn calendar_header(facts: &CalendarFacts) -> String {
    let club = facts.club_name.as_deref().unwrap_or("Club");
    let period = facts.month.as_deref().unwrap_or("this month");
    format!(
        "📅 {club} events for {period}: If you are interested in networking, professional \
         development or community service here are some events you should attend."
    )
}

/// Reply text of one calendar entry.
#[must_use]
pub fn calendar_entry(event: &CalendarEvent) -> String {
    let mut line = match event.date.as_deref() {
        Some(date) => format!("{date}: {}", event.title.trim()),
        None => event.title.trim().to_owned(),
    };
    if let Some(venue) = event.venue.as_deref().filter(|v| !v.trim().is_empty()) {
        line.push_str(" at ");
        line.push_str(venue.trim());
    }
    if let Some(time) = event.time.as_deref().filter(|t| !t.trim().is_empty()) {
        line.push_str(", ");
        line.push_str(time.trim());
    }
    line
}

/// Header of the daily digest thread.
#[must_use]
pub fn digest_header(today: NaiveDate) -> String {
    format!(
        "📅 Events for {}: If you are interested in networking, professional development or \
         community service here are some events you should attend.",
        today.format("%B %-d, %Y")
    )
}

/// Publishes posts and threads through a [`Publisher`].
#[derive(Clone)]
pub struct ThreadPublisher {
    publisher: Arc<dyn Publisher>,
    ops: OpsLog,
}

impl ThreadPublisher {
    /// Create a thread publisher.
    #[must_use]
    pub fn new(publisher: Arc<dyn Publisher>, ops: OpsLog) -> Self {
        Self { publisher, ops }
    }

    /// Publish one post, returning its id.
    ///
    /// # Errors
    ///
    /// Returns the publisher error unchanged.
    pub async fn publish_single(&self, text: &str, media: Option<&Media>) -> Result<String> {
        let id = self.publisher.publish(&fit_post(text), media, None).await?;
        info!(external_id = %id, "single post published");
        Ok(id)
    }

    /// Publish a root post and open a chain on it.
    ///
    /// # Errors
    ///
    /// Returns the publisher error; the thread is then not started.
    pub async fn start(&self, text: &str, media: Option<&Media>) -> Result<ReplyChain> {
        let root = self.publisher.publish(&fit_post(text), media, None).await?;
        debug!(root = %root, "thread root published");
        Ok(ReplyChain::new(root))
    }

    /// Reply to the tail of `chain`.
    ///
    /// On success the tail advances and the reply id is returned. A failure
    /// is logged and leaves the chain unchanged.
    pub async fn reply(
        &self,
        chain: &mut ReplyChain,
        text: &str,
        media: Option<&Media>,
    ) -> Option<String> {
        match self
            .publisher
            .publish(&fit_post(text), media, Some(&chain.tail))
            .await
        {
            Ok(id) => {
                debug!(parent = %chain.tail, reply = %id, "thread reply published");
                chain.tail.clone_from(&id);
                Some(id)
            }
            Err(err) => {
                self.ops
                    .error("threads", &format!("reply to {} failed", chain.tail), &err)
                    .await;
                None
            }
        }
    }

    /// Publish a calendar poster as a thread: header with the poster, one
    /// reply per entry, then the call to action. Returns the root id.
    ///
    /// # Errors
    ///
    /// Returns the publisher error if the root post fails.
    pub async fn publish_calendar(
        &self,
        facts: &CalendarFacts,
        media: Option<&Media>,
    ) -> Result<String> {
        let span = info_span!("calendar_thread", entries = facts.events.len());
        async move {
            let mut chain = self.start(&calendar_header(facts), media).await?;
            for event in &facts.events {
                self.reply(&mut chain, &calendar_entry(event), None).await;
            }
            self.reply(&mut chain, CALL_TO_ACTION, None).await;
            info!(root = %chain.root, "calendar thread published");
            Ok(chain.root)
        }
        .instrument(span)
        .await
    }

    /// Publish a recap as a thread: header with the image, one reply per
    /// highlight, then the closing summary. Returns the root id.
    ///
    /// # Errors
    ///
    /// Returns the publisher error if the root post fails.
    pub async fn publish_recap(
        &self,
        facts: &RecapFacts,
        header: Option<&str>,
        media: Option<&Media>,
    ) -> Result<String> {
        let span = info_span!("recap_thread", highlights = facts.highlights.len());
        async move {
            let header = header
                .map(str::to_owned)
                .unwrap_or_else(|| recap_fallback_header(facts));
            let mut chain = self.start(&header, media).await?;
            for highlight in &facts.highlights {
                self.reply(&mut chain, highlight, None).await;
            }
            let closing = facts
                .summary
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or("Thank you to everyone who joined us! See you at the next one.");
            self.reply(&mut chain, closing, None).await;
            info!(root = %chain.root, "recap thread published");
            Ok(chain.root)
        }
        .instrument(span)
        .await
    }
}

fn recap_fallback_header(facts: &RecapFacts) -> String {
    let title = facts.title.as_deref().unwrap_or("our latest event");
    match facts.club_name.as_deref() {
        Some(club) => format!("Highlights from {title} by {club} 🧵"),
        None => format!("Highlights from {title} 🧵"),
    }
}
