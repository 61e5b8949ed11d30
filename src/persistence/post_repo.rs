//! Post repository for `SQLite` persistence.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::models::analysis::Analysis;
use crate::models::post::{MediaRef, Post, PostStatus};
use crate::{AppError, Result};

use super::db::Database;
use super::{fmt_ts, parse_day, parse_ts};

/// Activity counters for the status report.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct DailyMetrics {
    /// Posts ingested in the window.
    pub ingested: i64,
    /// Posts published to the social account in the window.
    pub published: i64,
    /// Log entries recorded in the window.
    pub errors: i64,
    /// Texts of the published posts, oldest first.
    pub posted_texts: Vec<String>,
}

/// Repository wrapper around `SQLite` for post records.
#[derive(Clone)]
pub struct PostRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct PostRow {
    id: String,
    source_url: String,
    raw_text: String,
    image_ref: Option<String>,
    analysis: Option<String>,
    generated_text: Option<String>,
    status: String,
    created_at: String,
    updated_at: String,
    published_at: Option<String>,
    external_id: Option<String>,
    event_date: Option<String>,
    content_hash: Option<String>,
    publish_attempts: i64,
    last_error: Option<String>,
}

impl PostRow {
    /// Convert a database row into the domain model.
    fn into_post(self) -> Result<Post> {
        let image_ref: Option<MediaRef> = self
            .image_ref
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| AppError::Db(format!("invalid image_ref: {e}")))?;
        // Stored analyses are re-validated; a row that no longer parses reads as absent.
        let analysis = self
            .analysis
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
            .and_then(Analysis::from_value);

        Ok(Post {
            id: self.id,
            source_url: self.source_url,
            raw_text: self.raw_text,
            image_ref,
            analysis,
            generated_text: self.generated_text,
            status: PostStatus::parse(&self.status)?,
            created_at: parse_ts("created_at", &self.created_at)?,
            updated_at: parse_ts("updated_at", &self.updated_at)?,
            published_at: self
                .published_at
                .as_deref()
                .map(|raw| parse_ts("published_at", raw))
                .transpose()?,
            external_id: self.external_id,
            event_date: self
                .event_date
                .as_deref()
                .map(|raw| parse_day("event_date", raw))
                .transpose()?,
            content_hash: self.content_hash,
            publish_attempts: u32::try_from(self.publish_attempts).unwrap_or(0),
            last_error: self.last_error,
        })
    }
}

impl PostRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert or update a post, keyed by its immutable id.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if serialization or the upsert fails.
    pub async fn save(&self, post: &Post) -> Result<()> {
        let image_ref = post
            .image_ref
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| AppError::Db(format!("serialize image_ref: {e}")))?;
        let analysis = post
            .analysis
            .as_ref()
            .map(|a| a.to_value().to_string());

        sqlx::query(
            "INSERT INTO post (id, source_url, raw_text, image_ref, analysis, generated_text,
             status, created_at, updated_at, published_at, external_id, event_date,
             content_hash, publish_attempts, last_error)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
             ON CONFLICT(id) DO UPDATE SET
                source_url = excluded.source_url,
                raw_text = excluded.raw_text,
                image_ref = excluded.image_ref,
                analysis = excluded.analysis,
                generated_text = excluded.generated_text,
                status = excluded.status,
                updated_at = excluded.updated_at,
                published_at = excluded.published_at,
                external_id = excluded.external_id,
                event_date = excluded.event_date,
                content_hash = excluded.content_hash,
                publish_attempts = excluded.publish_attempts,
                last_error = excluded.last_error",
        )
        .bind(&post.id)
        .bind(&post.source_url)
        .bind(&post.raw_text)
        .bind(&image_ref)
        .bind(&analysis)
        .bind(&post.generated_text)
        .bind(post.status.as_str())
        .bind(fmt_ts(post.created_at))
        .bind(fmt_ts(post.updated_at))
        .bind(post.published_at.map(fmt_ts))
        .bind(&post.external_id)
        .bind(post.event_date.map(|d| d.to_string()))
        .bind(&post.content_hash)
        .bind(i64::from(post.publish_attempts))
        .bind(&post.last_error)
        .execute(self.db.as_ref())
        .await?;

        Ok(())
    }

    /// Retrieve a post by id.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get(&self, id: &str) -> Result<Option<Post>> {
        let row: Option<PostRow> = sqlx::query_as("SELECT * FROM post WHERE id = ?1")
            .bind(id)
            .fetch_optional(self.db.as_ref())
            .await?;

        row.map(PostRow::into_post).transpose()
    }

    /// Whether a post with this id has been stored.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn exists(&self, id: &str) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM post WHERE id = ?1")
            .bind(id)
            .fetch_optional(self.db.as_ref())
            .await?;
        Ok(found.is_some())
    }

    /// Most recently ingested posts, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_recent(&self, limit: u32) -> Result<Vec<Post>> {
        let rows: Vec<PostRow> =
            sqlx::query_as("SELECT * FROM post ORDER BY created_at DESC LIMIT ?1")
                .bind(i64::from(limit))
                .fetch_all(self.db.as_ref())
                .await?;

        rows.into_iter().map(PostRow::into_post).collect()
    }

    /// Posts whose event falls on `date`, in ingestion order.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_by_event_date(&self, date: NaiveDate) -> Result<Vec<Post>> {
        let rows: Vec<PostRow> =
            sqlx::query_as("SELECT * FROM post WHERE event_date = ?1 ORDER BY created_at ASC")
                .bind(date.to_string())
                .fetch_all(self.db.as_ref())
                .await?;

        rows.into_iter().map(PostRow::into_post).collect()
    }

    /// Posts in `statuses` that carry generated text, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_publishable(&self, statuses: &[PostStatus]) -> Result<Vec<Post>> {
        let rows: Vec<PostRow> = sqlx::query_as(
            "SELECT * FROM post WHERE generated_text IS NOT NULL AND generated_text <> '' \
             ORDER BY created_at ASC",
        )
        .fetch_all(self.db.as_ref())
        .await?;

        let posts = rows
            .into_iter()
            .map(PostRow::into_post)
            .collect::<Result<Vec<_>>>()?;
        Ok(posts
            .into_iter()
            .filter(|p| statuses.contains(&p.status))
            .collect())
    }

    /// Failed posts with fewer than `max_attempts` attempts, least recently touched first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_retryable(&self, max_attempts: u32) -> Result<Vec<Post>> {
        let rows: Vec<PostRow> = sqlx::query_as(
            "SELECT * FROM post WHERE status = 'failed' AND publish_attempts < ?1 \
             ORDER BY updated_at ASC",
        )
        .bind(i64::from(max_attempts))
        .fetch_all(self.db.as_ref())
        .await?;

        rows.into_iter().map(PostRow::into_post).collect()
    }

    /// Activity counters since `since`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if any query fails.
    pub async fn daily_metrics(&self, since: DateTime<Utc>) -> Result<DailyMetrics> {
        let since = fmt_ts(since);

        let ingested: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM post WHERE created_at >= ?1")
            .bind(&since)
            .fetch_one(self.db.as_ref())
            .await?;

        let posted_texts: Vec<String> = sqlx::query_scalar(
            "SELECT COALESCE(NULLIF(generated_text, ''), raw_text) FROM post \
             WHERE status = 'posted' AND external_id IS NOT NULL AND published_at >= ?1 \
             ORDER BY published_at ASC",
        )
        .bind(&since)
        .fetch_all(self.db.as_ref())
        .await?;

        let errors: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM log_entry WHERE created_at >= ?1")
                .bind(&since)
                .fetch_one(self.db.as_ref())
                .await?;

        Ok(DailyMetrics {
            ingested,
            published: i64::try_from(posted_texts.len()).unwrap_or(i64::MAX),
            errors,
            posted_texts,
        })
    }
}
