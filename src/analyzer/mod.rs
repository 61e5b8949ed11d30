//! Content analysis abstraction.
//!
//! The [`Analyzer`] trait turns raw source content into analysis JSON and
//! renders post texts. [`gemini::GeminiAnalyzer`] implements it over the
//! Gemini `generateContent` API.

pub mod gemini;
pub mod prompts;

use crate::models::analysis::Analysis;
use crate::BoxFuture;

/// How an image should be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageMode {
    /// An event poster: classify as single, calendar or recap.
    Poster,
    /// Any other image: extract general event facts.
    General,
}

/// Interface to the generative analysis service.
///
/// Every call may fail independently; callers treat a failure as "no result".
pub trait Analyzer: Send + Sync {
    /// Analyze message text, returning raw (untrusted) JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Analyzer`](crate::AppError::Analyzer) on API failure.
    fn analyze_text(&self, text: &str) -> BoxFuture<'_, String>;

    /// Analyze an image, returning raw (untrusted) JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Analyzer`](crate::AppError::Analyzer) on API failure.
    fn analyze_image(&self, bytes: &[u8], mime_type: &str, mode: ImageMode)
        -> BoxFuture<'_, String>;

    /// Render a ready-to-post text for `analysis`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Analyzer`](crate::AppError::Analyzer) on API failure.
    fn render_post_text(&self, analysis: &Analysis) -> BoxFuture<'_, String>;

    /// Render a birthday congratulation for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Analyzer`](crate::AppError::Analyzer) on API failure.
    fn render_congratulation(&self, name: &str) -> BoxFuture<'_, String>;
}
