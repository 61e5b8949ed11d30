//! Raw source content to validated analysis and post text.

use std::sync::Arc;

use tracing::{debug, info_span, Instrument};

use super::ops_log::OpsLog;
use crate::analyzer::{Analyzer, ImageMode};
use crate::models::analysis::{Analysis, AnalysisKind};
use crate::publisher::Media;

/// Output of one pipeline run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Enrichment {
    /// Validated analysis, if the analyzer produced a usable object.
    pub analysis: Option<Analysis>,
    /// Rendered post text, if rendering succeeded.
    pub generated_text: Option<String>,
}

/// Sequences the analyzer calls for one source item.
///
/// Each call is isolated: a failure is logged and yields no result, so
/// the caller always gets an [`Enrichment`] back.
#[derive(Clone)]
pub struct ContentPipeline {
    analyzer: Arc<dyn Analyzer>,
    ops: OpsLog,
}

impl ContentPipeline {
    /// Create a pipeline over `analyzer`.
    #[must_use]
    pub fn new(analyzer: Arc<dyn Analyzer>, ops: OpsLog) -> Self {
        Self { analyzer, ops }
    }

    /// Analyze `text` and optional `media`, then render a post text.
    pub async fn run(&self, text: &str, media: Option<&Media>) -> Enrichment {
        let span = info_span!("content_pipeline", has_media = media.is_some());
        async move {
            let analysis = self.analyze(text, media).await;
            let generated_text = match &analysis {
                Some(analysis) if analysis.kind() != AnalysisKind::Calendar => {
                    self.render(analysis).await
                }
                _ => None,
            };
            debug!(
                kind = ?analysis.as_ref().map(Analysis::kind),
                rendered = generated_text.is_some(),
                "pipeline complete"
            );
            Enrichment {
                analysis,
                generated_text,
            }
        }
        .instrument(span)
        .await
    }

    async fn analyze(&self, text: &str, media: Option<&Media>) -> Option<Analysis> {
        let raw = if let Some(media) = media {
            self.analyzer
                .analyze_image(&media.bytes, &media.mime_type, ImageMode::Poster)
                .await
        } else if !text.trim().is_empty() {
            self.analyzer.analyze_text(text).await
        } else {
            return None;
        };

        match raw {
            Ok(raw) => {
                let parsed = Analysis::parse(&raw);
                if parsed.is_none() {
                    debug!("analyzer output is not a JSON object");
                }
                parsed
            }
            Err(err) => {
                self.ops.error("pipeline", "analysis failed", &err).await;
                None
            }
        }
    }

    async fn render(&self, analysis: &Analysis) -> Option<String> {
        match self.analyzer.render_post_text(analysis).await {
            Ok(text) => Some(text.trim().to_owned()).filter(|t| !t.is_empty()),
            Err(err) => {
                self.ops.error("pipeline", "post text rendering failed", &err).await;
                None
            }
        }
    }
}
