//! Post model: one ingested source message and its publication lifecycle.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::analysis::{Analysis, AnalysisKind};
use crate::{AppError, Result};

/// Publication status of a post.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    /// Persisted, not yet published.
    Pending,
    /// Published (or deliberately suppressed as stale).
    Posted,
    /// The last publication attempt failed.
    Failed,
}

impl PostStatus {
    /// Storage representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Posted => "posted",
            Self::Failed => "failed",
        }
    }

    /// Parse the storage representation.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` for an unknown value.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "posted" => Ok(Self::Posted),
            "failed" => Ok(Self::Failed),
            other => Err(AppError::Db(format!("invalid post status: {other}"))),
        }
    }
}

/// Locator of a media file in the source channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MediaRef {
    /// Source-side file identifier.
    pub file_id: String,
    /// MIME type reported by the source, if any.
    pub mime_type: String,
}

/// An ingested source item and its publication state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Post {
    /// Source message id; unique per source channel and immutable.
    pub id: String,
    /// Link back to the source message.
    pub source_url: String,
    /// Raw message text or caption.
    pub raw_text: String,
    /// Source media, when the message carried one.
    pub image_ref: Option<MediaRef>,
    /// Validated analysis, absent when the analyzer failed or returned garbage.
    pub analysis: Option<Analysis>,
    /// Ready-to-post text.
    pub generated_text: Option<String>,
    /// Current lifecycle status.
    pub status: PostStatus,
    /// Ingestion timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
    /// Publication timestamp; set whenever `status` is `Posted`.
    pub published_at: Option<DateTime<Utc>>,
    /// Publisher-assigned id of the post (the root id for threads).
    pub external_id: Option<String>,
    /// Normalized event date used by the digest.
    pub event_date: Option<NaiveDate>,
    /// Fingerprint of text and media reference.
    pub content_hash: Option<String>,
    /// Number of failed publication attempts.
    pub publish_attempts: u32,
    /// Error text of the last failed attempt.
    pub last_error: Option<String>,
}

impl Post {
    /// Construct a new pending post.
    #[must_use]
    pub fn new(
        id: String,
        source_url: String,
        raw_text: String,
        image_ref: Option<MediaRef>,
    ) -> Self {
        let now = Utc::now();
        let content_hash = Some(content_hash(&raw_text, image_ref.as_ref()));
        Self {
            id,
            source_url,
            raw_text,
            image_ref,
            analysis: None,
            generated_text: None,
            status: PostStatus::Pending,
            created_at: now,
            updated_at: now,
            published_at: None,
            external_id: None,
            event_date: None,
            content_hash,
            publish_attempts: 0,
            last_error: None,
        }
    }

    /// Attach the analysis and derive the event date from it.
    pub fn set_analysis(&mut self, analysis: Option<Analysis>) {
        self.event_date = analysis.as_ref().and_then(Analysis::event_date);
        self.analysis = analysis;
    }

    /// Kind of the attached analysis, if any.
    #[must_use]
    pub fn kind(&self) -> Option<AnalysisKind> {
        self.analysis.as_ref().map(Analysis::kind)
    }

    /// Text to publish: generated text first, raw text otherwise.
    #[must_use]
    pub fn publish_text(&self) -> Option<&str> {
        self.generated_text
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| Some(self.raw_text.as_str()).filter(|t| !t.trim().is_empty()))
    }

    /// Determine whether a lifecycle transition is permitted.
    #[must_use]
    pub fn can_transition_to(&self, next: PostStatus) -> bool {
        matches!(
            (self.status, next),
            (
                PostStatus::Pending | PostStatus::Failed,
                PostStatus::Posted | PostStatus::Failed
            )
        )
    }

    /// Mark the post as published at `at`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidTransition` if the post is already posted.
    pub fn mark_posted(&mut self, external_id: Option<String>, at: DateTime<Utc>) -> Result<()> {
        self.transition(PostStatus::Posted)?;
        self.published_at = Some(at);
        self.updated_at = at;
        if external_id.is_some() {
            self.external_id = external_id;
        }
        self.last_error = None;
        Ok(())
    }

    /// Record a failed publication attempt.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidTransition` if the post is already posted.
    pub fn mark_failed(&mut self, error: impl Into<String>, at: DateTime<Utc>) -> Result<()> {
        self.transition(PostStatus::Failed)?;
        self.publish_attempts += 1;
        self.last_error = Some(error.into());
        self.updated_at = at;
        Ok(())
    }

    fn transition(&mut self, next: PostStatus) -> Result<()> {
        if !self.can_transition_to(next) {
            return Err(AppError::InvalidTransition(format!(
                "post {}: {} -> {}",
                self.id,
                self.status.as_str(),
                next.as_str()
            )));
        }
        self.status = next;
        Ok(())
    }
}

/// SHA-256 over the trimmed text and the media file id.
#[must_use]
pub fn content_hash(text: &str, media: Option<&MediaRef>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.trim().as_bytes());
    if let Some(media) = media {
        hasher.update(b"\0");
        hasher.update(media.file_id.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}
