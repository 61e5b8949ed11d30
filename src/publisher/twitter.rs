//! X (Twitter) API v2 publisher using an OAuth 2.0 user-context token.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use super::{Media, Mention, Publisher};
use crate::config::PublisherConfig;
use crate::{AppError, BoxFuture, Result};

const API_BASE: &str = "https://api.x.com/2";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("event-herald/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct IdOnly {
    id: String,
}

#[derive(Debug, Deserialize)]
struct MentionRaw {
    id: String,
    text: String,
    author_id: Option<String>,
}

/// X API v2 client.
pub struct TwitterPublisher {
    http: reqwest::Client,
    access_token: String,
}

impl TwitterPublisher {
    /// Build a publisher from configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Publisher` if the HTTP client cannot be built.
    pub fn new(config: &PublisherConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|err| AppError::Publisher(format!("failed to build http client: {err}")))?;
        Ok(Self {
            http,
            access_token: config.access_token.clone(),
        })
    }

    async fn read<T: for<'de> Deserialize<'de>>(
        what: &str,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(what.to_owned()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Publisher(format!("{what}: HTTP {status} {body}")));
        }
        let envelope: DataEnvelope<T> = response
            .json()
            .await
            .map_err(|err| AppError::Publisher(format!("{what}: invalid response: {err}")))?;
        envelope
            .data
            .ok_or_else(|| AppError::NotFound(format!("{what}: empty data")))
    }

    async fn upload_media(&self, media: &Media) -> Result<String> {
        let part = Part::bytes(media.bytes.to_vec())
            .file_name("media")
            .mime_str(&media.mime_type)
            .map_err(|err| AppError::Publisher(format!("invalid media type: {err}")))?;
        let form = Form::new()
            .part("media", part)
            .text("media_category", "tweet_image")
            .text("media_type", media.mime_type.clone());

        let response = self
            .http
            .post(format!("{API_BASE}/media/upload"))
            .bearer_auth(&self.access_token)
            .multipart(form)
            .send()
            .await
            .map_err(|err| AppError::Publisher(format!("media upload failed: {err}")))?;
        let uploaded: IdOnly = Self::read("media upload", response).await?;
        debug!(media_id = %uploaded.id, bytes = media.bytes.len(), "media uploaded");
        Ok(uploaded.id)
    }

    async fn create_post(
        &self,
        text: &str,
        media: Option<&Media>,
        reply_to: Option<&str>,
    ) -> Result<String> {
        if text.trim().is_empty() {
            return Err(AppError::Publisher("no text available to publish".into()));
        }

        let mut body = json!({ "text": text });
        if let Some(parent) = reply_to {
            body["reply"] = json!({ "in_reply_to_tweet_id": parent });
        }
        if let Some(media) = media {
            let media_id = self.upload_media(media).await?;
            body["media"] = json!({ "media_ids": [media_id] });
        }

        let response = self
            .http
            .post(format!("{API_BASE}/tweets"))
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|err| AppError::Publisher(format!("create post failed: {err}")))?;
        let created: IdOnly = Self::read("create post", response).await?;
        info!(post_id = %created.id, ?reply_to, "post published");
        Ok(created.id)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, what: &str, url: String) -> Result<T> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|err| AppError::Publisher(format!("{what} failed: {err}")))?;
        Self::read(what, response).await
    }
}

impl Publisher for TwitterPublisher {
    fn post_text(&self, text: &str, reply_to: Option<&str>) -> BoxFuture<'_, String> {
        let text = text.to_owned();
        let reply_to = reply_to.map(str::to_owned);
        Box::pin(async move { self.create_post(&text, None, reply_to.as_deref()).await })
    }

    fn publish(
        &self,
        text: &str,
        media: Option<&Media>,
        reply_to: Option<&str>,
    ) -> BoxFuture<'_, String> {
        let text = text.to_owned();
        let media = media.cloned();
        let reply_to = reply_to.map(str::to_owned);
        Box::pin(async move {
            self.create_post(&text, media.as_ref(), reply_to.as_deref())
                .await
        })
    }

    fn lookup_user(&self, username: &str) -> BoxFuture<'_, String> {
        let url = format!(
            "{API_BASE}/users/by/username/{}",
            username.trim_start_matches('@')
        );
        Box::pin(async move {
            let user: IdOnly = self.get_json("user lookup", url).await?;
            Ok(user.id)
        })
    }

    fn list_mentions(&self, user_id: &str) -> BoxFuture<'_, Vec<Mention>> {
        let url =
            format!("{API_BASE}/users/{user_id}/mentions?max_results=10&tweet.fields=author_id");
        Box::pin(async move {
            let raw = match self.get_json::<Vec<MentionRaw>>("mentions", url).await {
                Ok(list) => Some(list),
                // An account without mentions gets no `data` field.
                Err(AppError::NotFound(_)) => None,
                Err(err) => return Err(err),
            };
            Ok(raw
                .unwrap_or_default()
                .into_iter()
                .map(|m| Mention {
                    id: m.id,
                    text: m.text,
                    author_id: m.author_id,
                })
                .collect())
        })
    }
}
