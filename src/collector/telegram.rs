//! Telegram Bot API collector.

use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::{Collector, SentMessage, SourceItem};
use crate::models::post::MediaRef;
use crate::{AppError, BoxFuture, Result};

const API_BASE: &str = "https://api.telegram.org";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
    channel_post: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct PhotoSize {
    file_id: String,
}

#[derive(Debug, Deserialize)]
struct Document {
    file_id: String,
    mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Message {
    message_id: i64,
    chat: Chat,
    date: Option<i64>,
    text: Option<String>,
    caption: Option<String>,
    photo: Option<Vec<PhotoSize>>,
    document: Option<Document>,
}

#[derive(Debug, Deserialize)]
struct File {
    file_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SentRaw {
    message_id: i64,
}

impl Message {
    fn into_item(self, cursor: i64) -> SourceItem {
        // Telegram lists photo sizes smallest first.
        let media = self
            .photo
            .and_then(|sizes| sizes.into_iter().last())
            .map(|p| MediaRef {
                file_id: p.file_id,
                mime_type: "image/jpeg".into(),
            })
            .or_else(|| {
                self.document.map(|d| MediaRef {
                    file_id: d.file_id,
                    mime_type: d.mime_type.unwrap_or_else(|| "application/octet-stream".into()),
                })
            });

        SourceItem {
            cursor,
            chat_id: self.chat.id.to_string(),
            message_id: self.message_id,
            text: self.text.or(self.caption).unwrap_or_default(),
            media,
            date: self.date.and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0)),
        }
    }
}

/// Bot API client bound to one bot token.
pub struct TelegramCollector {
    http: reqwest::Client,
    token: String,
}

impl TelegramCollector {
    /// Build a collector for `bot_token`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Collector` if the HTTP client cannot be built.
    pub fn new(bot_token: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| AppError::Collector(format!("failed to build http client: {err}")))?;
        Ok(Self {
            http,
            token: bot_token.into(),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: serde_json::Value) -> Result<T> {
        let url = format!("{API_BASE}/bot{}/{method}", self.token);
        let response: ApiResponse<T> = self
            .http
            .post(url)
            .json(&params)
            .send()
            .await
            .map_err(|err| AppError::Collector(format!("{method} request failed: {err}")))?
            .json()
            .await
            .map_err(|err| AppError::Collector(format!("{method} response invalid: {err}")))?;

        if !response.ok {
            return Err(AppError::Collector(format!(
                "{method}: {}",
                response.description.unwrap_or_else(|| "unknown error".into())
            )));
        }
        response
            .result
            .ok_or_else(|| AppError::Collector(format!("{method}: empty result")))
    }

    async fn get_updates(&self, since_cursor: i64) -> Result<Vec<SourceItem>> {
        let updates: Vec<Update> = self
            .call(
                "getUpdates",
                json!({
                    "offset": since_cursor + 1,
                    "timeout": 0,
                    "allowed_updates": ["message", "channel_post"],
                }),
            )
            .await?;

        let mut items: Vec<SourceItem> = updates
            .into_iter()
            .filter(|u| u.update_id > since_cursor)
            .map(|u| match u.channel_post.or(u.message) {
                Some(message) => message.into_item(u.update_id),
                None => SourceItem {
                    cursor: u.update_id,
                    chat_id: String::new(),
                    message_id: 0,
                    text: String::new(),
                    media: None,
                    date: None,
                },
            })
            .collect();
        items.sort_by_key(|item| item.cursor);
        debug!(count = items.len(), since_cursor, "telegram updates fetched");
        Ok(items)
    }

    async fn download(&self, media: &MediaRef) -> Result<Option<Bytes>> {
        let file: File = self
            .call("getFile", json!({ "file_id": media.file_id }))
            .await?;
        let Some(path) = file.file_path else {
            return Ok(None);
        };

        let url = format!("{API_BASE}/file/bot{}/{path}", self.token);
        let response = self
            .http
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|err| AppError::Collector(format!("media download failed: {err}")))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|err| AppError::Collector(format!("media body read failed: {err}")))?;
        Ok(Some(bytes))
    }
}

impl Collector for TelegramCollector {
    fn poll_updates(&self, since_cursor: i64) -> BoxFuture<'_, Vec<SourceItem>> {
        Box::pin(self.get_updates(since_cursor))
    }

    fn fetch_history(&self, channel: &str, limit: u32) -> BoxFuture<'_, Vec<SourceItem>> {
        // The Bot API has no history endpoint; only updates are delivered.
        warn!(channel, limit, "history is not available through the bot api");
        Box::pin(async { Ok(Vec::new()) })
    }

    fn download_media(&self, media: &MediaRef) -> BoxFuture<'_, Option<Bytes>> {
        let media = media.clone();
        Box::pin(async move { self.download(&media).await })
    }

    fn send_message(&self, channel: &str, text: &str) -> BoxFuture<'_, SentMessage> {
        let params = json!({ "chat_id": channel, "text": text });
        Box::pin(async move {
            let sent: SentRaw = self.call("sendMessage", params).await?;
            Ok(SentMessage {
                id: sent.message_id,
            })
        })
    }

    fn pin_message(&self, channel: &str, id: i64) -> BoxFuture<'_, ()> {
        let params = json!({ "chat_id": channel, "message_id": id });
        Box::pin(async move {
            let _: bool = self.call("pinChatMessage", params).await?;
            Ok(())
        })
    }
}
