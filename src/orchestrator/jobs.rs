//! The three day-gated jobs.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use tracing::{info, info_span, Instrument};

use super::day_gate::local_day_hour;
use super::relay::Relay;
use super::threads::{digest_header, fit_post, CALL_TO_ACTION};
use crate::models::analysis::AnalysisKind;
use crate::models::post::{Post, PostStatus};
use crate::persistence::post_repo::DailyMetrics;
use crate::{AppError, Result};

/// Longest posted text quoted verbatim in the status report.
const REPORT_TEXT_LIMIT: usize = 100;

/// Render the daily status report for `today`.
#[must_use]
pub fn format_report(today: NaiveDate, metrics: &DailyMetrics) -> String {
    #[allow(clippy::cast_precision_loss)] // counts stay far below 2^52
    let success_rate = if metrics.ingested > 0 {
        metrics.published as f64 / metrics.ingested as f64 * 100.0
    } else {
        0.0
    };

    let mut report = format!(
        "📊 *Event Herald Daily Report*\n\
         📅 Date: {today}\n\n\
         📈 *System Metrics (Last 24h):*\n\
         - Messages Ingested: {}\n\
         - Posts Published: {}\n\
         - System Errors: {}\n\
         - Success Rate: {success_rate:.1}%\n\n",
        metrics.ingested, metrics.published, metrics.errors
    );

    if metrics.posted_texts.is_empty() {
        report.push_str("📭 No posts published in the last 24h.");
    } else {
        report.push_str("🐦 *Posts Published:*\n");
        for (i, text) in metrics.posted_texts.iter().enumerate() {
            report.push_str(&format!("{}. {}\n", i + 1, summarize(text)));
        }
    }

    report
}

fn summarize(text: &str) -> String {
    if text.chars().count() > REPORT_TEXT_LIMIT {
        let head: String = text.chars().take(REPORT_TEXT_LIMIT - 3).collect();
        format!("{head}...")
    } else {
        text.to_owned()
    }
}

/// Built-in congratulation used when rendering fails.
#[must_use]
pub fn fallback_congratulation(name: &str) -> String {
    format!("🎉 Happy birthday, {name}! Wishing you a wonderful year ahead from all of us. 🎂")
}

/// Whether a post belongs in the daily digest.
fn digest_eligible(post: &Post) -> bool {
    matches!(post.status, PostStatus::Pending | PostStatus::Failed)
        && !matches!(
            post.kind(),
            Some(AnalysisKind::Calendar | AnalysisKind::Recap)
        )
        && post.publish_text().is_some()
}

impl Relay {
    /// Send the 24-hour metrics report to the source channel and pin it.
    ///
    /// # Errors
    ///
    /// Returns the store or collector error if the report cannot be built or
    /// sent. A pin failure is only logged.
    pub async fn status_report_at(&mut self, now: DateTime<Utc>) -> Result<()> {
        let span = info_span!("status_report");
        async move {
            let (today, _) = local_day_hour(now, self.tz);
            let metrics = self
                .posts
                .daily_metrics(now - chrono::Duration::hours(24))
                .await?;
            let report = format_report(today, &metrics);

            let channel = self.config.source_channel_id.clone();
            let sent = self.collector.send_message(&channel, &report).await?;
            info!(message_id = sent.id, "status report sent");

            if let Err(err) = self.collector.pin_message(&channel, sent.id).await {
                self.ops.error("status_report", "failed to pin report", &err).await;
            }
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// Publish today's events as one thread. Returns the number of posts
    /// published as replies.
    ///
    /// # Errors
    ///
    /// Returns the store error, or the publisher error if the header fails.
    pub async fn digest_thread_at(&mut self, now: DateTime<Utc>) -> Result<usize> {
        let (today, _) = local_day_hour(now, self.tz);
        let span = info_span!("digest_thread", %today);
        async move {
            let items: Vec<Post> = self
                .posts
                .list_by_event_date(today)
                .await?
                .into_iter()
                .filter(digest_eligible)
                .collect();

            if items.is_empty() {
                info!("no events today; digest skipped");
                return Ok(0);
            }

            let mut chain = self.threads.start(&digest_header(today), None).await?;
            let mut published = 0;

            for mut post in items {
                let Some(text) = post.publish_text().map(str::to_owned) else {
                    continue;
                };
                let media = self.fetch_media(post.image_ref.as_ref()).await;
                let Some(reply_id) = self.threads.reply(&mut chain, &text, media.as_ref()).await
                else {
                    continue;
                };
                post.mark_posted(Some(reply_id), now)?;
                self.posts.save(&post).await?;
                published += 1;
            }

            self.threads.reply(&mut chain, CALL_TO_ACTION, None).await;
            info!(root = %chain.root, published, "digest thread published");
            Ok(published)
        }
        .instrument(span)
        .await
    }

    /// Congratulate every member whose birthday is today and who has not
    /// been celebrated this year. Returns the number of congratulations.
    ///
    /// A member's posting failure is logged and does not stop the others.
    /// The run still fails afterwards so the day marker stays unset and the
    /// uncelebrated members are retried on a later heartbeat.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` on store failure and `AppError::Publisher` when
    /// any congratulation could not be posted.
    pub async fn birthday_check_at(&mut self, now: DateTime<Utc>) -> Result<usize> {
        let (today, _) = local_day_hour(now, self.tz);
        let span = info_span!("birthday_check", %today);
        async move {
            let year = today.year();
            let mmdd = today.format("%m-%d").to_string();
            let mut members = self.members.list_birthdays_on(&mmdd).await?;
            // Feb 29 birthdays are celebrated on Feb 28 outside leap years.
            if mmdd == "02-28" && NaiveDate::from_ymd_opt(year, 2, 29).is_none() {
                members.extend(self.members.list_birthdays_on("02-29").await?);
            }

            let mut celebrated = 0;
            let mut failed = 0;
            for member in members.into_iter().filter(|m| m.is_due(year)) {
                let text = match self.analyzer.render_congratulation(&member.name).await {
                    Ok(text) if !text.trim().is_empty() => text,
                    Ok(_) => fallback_congratulation(&member.name),
                    Err(err) => {
                        self.ops
                            .error("birthday_check", "congratulation rendering failed", &err)
                            .await;
                        fallback_congratulation(&member.name)
                    }
                };

                match self.publisher.post_text(&fit_post(&text), None).await {
                    Ok(id) => {
                        self.members.mark_celebrated(&member.id, year).await?;
                        info!(member = %member.name, external_id = %id, "birthday posted");
                        celebrated += 1;
                    }
                    Err(err) => {
                        self.ops
                            .error(
                                "birthday_check",
                                &format!("congratulation for {} failed", member.name),
                                &err,
                            )
                            .await;
                        failed += 1;
                    }
                }
            }

            if failed > 0 {
                return Err(AppError::Publisher(format!(
                    "{failed} of {} congratulations failed",
                    celebrated + failed
                )));
            }
            Ok(celebrated)
        }
        .instrument(span)
        .await
    }
}
