//! Social publishing abstraction.
//!
//! The [`Publisher`] trait is the only way the relay core reaches the social
//! account. [`twitter::TwitterPublisher`] implements it over the X API v2.

pub mod twitter;

use bytes::Bytes;
use serde::Serialize;

use crate::BoxFuture;

/// Media attached to a post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Media {
    /// Raw file content.
    pub bytes: Bytes,
    /// MIME type of the content.
    pub mime_type: String,
}

/// A post that mentions the publishing account.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Mention {
    /// Post id.
    pub id: String,
    /// Post text.
    pub text: String,
    /// Author id, when returned.
    pub author_id: Option<String>,
}

/// Interface to the social account.
pub trait Publisher: Send + Sync {
    /// Publish a text-only post, optionally as a reply; returns the new post id.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Publisher`](crate::AppError::Publisher) on API failure.
    fn post_text(&self, text: &str, reply_to: Option<&str>) -> BoxFuture<'_, String>;

    /// Publish a post with an optional media attachment; returns the new post id.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Publisher`](crate::AppError::Publisher) on upload or API failure.
    fn publish(
        &self,
        text: &str,
        media: Option<&Media>,
        reply_to: Option<&str>,
    ) -> BoxFuture<'_, String>;

    /// Resolve a username to a user id.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`](crate::AppError::NotFound) if the user does not exist.
    fn lookup_user(&self, username: &str) -> BoxFuture<'_, String>;

    /// Recent posts mentioning `user_id`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Publisher`](crate::AppError::Publisher) on API failure.
    fn list_mentions(&self, user_id: &str) -> BoxFuture<'_, Vec<Mention>>;
}
