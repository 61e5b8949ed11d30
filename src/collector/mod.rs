//! Source channel abstraction.
//!
//! The [`Collector`] trait decouples the relay core from the message
//! source. [`telegram::TelegramCollector`] implements it over the Telegram
//! Bot API.

pub mod telegram;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::post::MediaRef;
use crate::BoxFuture;

/// One update delivered by the source, in cursor order.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SourceItem {
    /// Monotonic delivery cursor of the update.
    pub cursor: i64,
    /// Chat the message belongs to; empty for non-message updates.
    pub chat_id: String,
    /// Message id within the chat.
    pub message_id: i64,
    /// Message text or media caption.
    pub text: String,
    /// Attached media, if any.
    pub media: Option<MediaRef>,
    /// Message timestamp.
    pub date: Option<DateTime<Utc>>,
}

/// Identifier of a message sent through the collector.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct SentMessage {
    /// Message id within the chat.
    pub id: i64,
}

/// Interface to the monitored source channel.
pub trait Collector: Send + Sync {
    /// Fetch all updates with a cursor strictly greater than `since_cursor`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Collector`](crate::AppError::Collector) if the source is unreachable.
    fn poll_updates(&self, since_cursor: i64) -> BoxFuture<'_, Vec<SourceItem>>;

    /// Fetch up to `limit` past messages of `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Collector`](crate::AppError::Collector) on API failure.
    fn fetch_history(&self, channel: &str, limit: u32) -> BoxFuture<'_, Vec<SourceItem>>;

    /// Download the media behind `media`; `None` when the source has no file.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Collector`](crate::AppError::Collector) on download failure.
    fn download_media(&self, media: &MediaRef) -> BoxFuture<'_, Option<Bytes>>;

    /// Send a text message to `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Collector`](crate::AppError::Collector) on API failure.
    fn send_message(&self, channel: &str, text: &str) -> BoxFuture<'_, SentMessage>;

    /// Pin message `id` in `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Collector`](crate::AppError::Collector) on API failure.
    fn pin_message(&self, channel: &str, id: i64) -> BoxFuture<'_, ()>;
}
