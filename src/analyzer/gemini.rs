//! Gemini `generateContent` analyzer.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{prompts, Analyzer, ImageMode};
use crate::config::AnalyzerConfig;
use crate::models::analysis::Analysis;
use crate::{AppError, BoxFuture, Result};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    Inline { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

/// Gemini REST client.
pub struct GeminiAnalyzer {
    http: reqwest::Client,
    model: String,
    api_key: String,
}

impl GeminiAnalyzer {
    /// Build an analyzer from configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Analyzer` if the HTTP client cannot be built.
    pub fn new(config: &AnalyzerConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| AppError::Analyzer(format!("failed to build http client: {err}")))?;
        Ok(Self {
            http,
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }

    async fn generate(&self, parts: Vec<Part>) -> Result<String> {
        let url = format!("{API_BASE}/{}:generateContent", self.model);
        let request = GenerateRequest {
            contents: vec![Content { parts }],
        };

        let response = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|err| AppError::Analyzer(format!("generateContent failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Analyzer(format!("generateContent {status}: {body}")));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|err| AppError::Analyzer(format!("generateContent response invalid: {err}")))?;

        let text: String = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(AppError::Analyzer("generateContent returned no text".into()));
        }
        debug!(model = %self.model, chars = text.len(), "gemini response");
        Ok(text.trim().to_owned())
    }
}

impl Analyzer for GeminiAnalyzer {
    fn analyze_text(&self, text: &str) -> BoxFuture<'_, String> {
        let prompt = format!(
            "{}\n\nText: \"{text}\"",
            prompts::general(Utc::now().date_naive())
        );
        Box::pin(self.generate(vec![Part::Text { text: prompt }]))
    }

    fn analyze_image(
        &self,
        bytes: &[u8],
        mime_type: &str,
        mode: ImageMode,
    ) -> BoxFuture<'_, String> {
        let today = Utc::now().date_naive();
        let prompt = match mode {
            ImageMode::Poster => prompts::poster(today),
            ImageMode::General => prompts::general(today),
        };
        let parts = vec![
            Part::Text { text: prompt },
            Part::Inline {
                inline_data: InlineData {
                    mime_type: mime_type.to_owned(),
                    data: STANDARD.encode(bytes),
                },
            },
        ];
        Box::pin(self.generate(parts))
    }

    fn render_post_text(&self, analysis: &Analysis) -> BoxFuture<'_, String> {
        let prompt = prompts::post_text(analysis);
        Box::pin(self.generate(vec![Part::Text { text: prompt }]))
    }

    fn render_congratulation(&self, name: &str) -> BoxFuture<'_, String> {
        let prompt = prompts::congratulation(name);
        Box::pin(self.generate(vec![Part::Text { text: prompt }]))
    }
}
