//! The relay core: state owner and entry points of the actor.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use tracing::{info, info_span, warn, Instrument};

use super::dedupe::Deduplicator;
use super::day_gate::{is_due, local_day_hour, trigger_hour};
use super::ingest::PollReport;
use super::ops_log::OpsLog;
use super::pipeline::ContentPipeline;
use super::threads::ThreadPublisher;
use super::{HEALTH_STALE_AFTER, MAX_PUBLISH_ATTEMPTS, POLL_FAILURE_ALERT_THRESHOLD, RETRY_BASE_DELAY};
use crate::analyzer::Analyzer;
use crate::collector::{Collector, SourceItem};
use crate::models::analysis::Analysis;
use crate::models::log_entry::LogEntry;
use crate::models::member::{normalize_birthday, MemberBirthday};
use crate::models::post::{MediaRef, Post, PostStatus};
use crate::models::scheduler_state::{DailyJob, SchedulerState};
use crate::persistence::db::Database;
use crate::persistence::log_repo::LogRepo;
use crate::persistence::member_repo::MemberRepo;
use crate::persistence::post_repo::PostRepo;
use crate::persistence::state_repo::StateRepo;
use crate::publisher::{Media, Mention, Publisher};
use crate::{AppError, GlobalConfig, Result};

/// Collaborators and storage handed to [`Relay::new`].
pub struct RelayDeps {
    /// Validated configuration with credentials loaded.
    pub config: Arc<GlobalConfig>,
    /// Shared connection pool.
    pub db: Arc<Database>,
    /// Source channel client.
    pub collector: Arc<dyn Collector>,
    /// Content analysis client.
    pub analyzer: Arc<dyn Analyzer>,
    /// Social account client.
    pub publisher: Arc<dyn Publisher>,
}

/// Outcome of one heartbeat.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HeartbeatReport {
    /// Poll cycle outcome; `None` if the cycle hit a store error.
    pub poll: Option<PollReport>,
    /// Failed posts republished by the retry sweep.
    pub retried: usize,
    /// Day-gated jobs that completed on this heartbeat.
    pub jobs_run: Vec<DailyJob>,
}

/// Outcome of a bulk publication.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct PublishSummary {
    /// Posts a publication was attempted for.
    pub attempted: usize,
    /// Posts that ended up posted.
    pub published: usize,
}

/// Liveness verdict served by `/health`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HealthReport {
    /// Whether polling is healthy.
    pub healthy: bool,
    /// Why the relay is degraded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Consecutive failed poll cycles.
    pub poll_failure_count: u32,
    /// Time of the last successful poll cycle.
    pub last_poll_success_at: Option<DateTime<Utc>>,
}

/// Single owner of relay state.
///
/// Every method takes `&mut self`; concurrent access goes through the
/// actor in [`super::actor`].
pub struct Relay {
    pub(super) config: Arc<GlobalConfig>,
    pub(super) tz: FixedOffset,
    pub(super) collector: Arc<dyn Collector>,
    pub(super) analyzer: Arc<dyn Analyzer>,
    pub(super) publisher: Arc<dyn Publisher>,
    pub(super) posts: PostRepo,
    pub(super) logs: LogRepo,
    pub(super) members: MemberRepo,
    pub(super) states: StateRepo,
    pub(super) state: SchedulerState,
    pub(super) dedupe: Deduplicator,
    pub(super) pipeline: ContentPipeline,
    pub(super) threads: ThreadPublisher,
    pub(super) ops: OpsLog,
}

impl Relay {
    /// Build the relay and load the persisted scheduler state.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` for an invalid timezone, or `AppError::Db`
    /// if the state cannot be loaded.
    pub async fn new(deps: RelayDeps) -> Result<Self> {
        let tz = deps.config.schedule.timezone()?;
        let posts = PostRepo::new(Arc::clone(&deps.db));
        let logs = LogRepo::new(Arc::clone(&deps.db));
        let members = MemberRepo::new(Arc::clone(&deps.db));
        let states = StateRepo::new(Arc::clone(&deps.db));
        let state = states.load().await?;
        let ops = OpsLog::new(logs.clone());

        info!(
            cursor = state.cursor,
            version = state.version,
            poll_failure_count = state.poll_failure_count,
            "relay state loaded"
        );

        Ok(Self {
            pipeline: ContentPipeline::new(Arc::clone(&deps.analyzer), ops.clone()),
            threads: ThreadPublisher::new(Arc::clone(&deps.publisher), ops.clone()),
            dedupe: Deduplicator::new(posts.clone()),
            config: deps.config,
            tz,
            collector: deps.collector,
            analyzer: deps.analyzer,
            publisher: deps.publisher,
            posts,
            logs,
            members,
            states,
            state,
            ops,
        })
    }

    /// Current scheduler state.
    #[must_use]
    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    /// Number of ids in the in-memory dedupe tier.
    #[must_use]
    pub fn cached_ids(&self) -> usize {
        self.dedupe.cached()
    }

    /// One scheduler wake: poll cycle, retry sweep, then the due daily jobs.
    ///
    /// Each stage is isolated; a store error in one is logged and the next
    /// stage still runs.
    pub async fn heartbeat_at(&mut self, now: DateTime<Utc>) -> HeartbeatReport {
        let span = info_span!("heartbeat", cursor = self.state.cursor);
        async move {
            let mut report = HeartbeatReport::default();

            match self.poll_once_at(now).await {
                Ok(poll) => report.poll = Some(poll),
                Err(err) => self.ops.error("heartbeat", "poll cycle store failure", &err).await,
            }

            match self.retry_failed_at(now).await {
                Ok(retried) => report.retried = retried,
                Err(err) => self.ops.error("heartbeat", "retry sweep failed", &err).await,
            }

            report.jobs_run = self.run_due_jobs(now).await;
            info!(
                retried = report.retried,
                jobs = report.jobs_run.len(),
                "heartbeat complete"
            );
            report
        }
        .instrument(span)
        .await
    }

    /// Run every daily job whose trigger hour is now and that has not
    /// completed today, advancing and persisting its marker on success.
    pub async fn run_due_jobs(&mut self, now: DateTime<Utc>) -> Vec<DailyJob> {
        let (today, hour) = local_day_hour(now, self.tz);
        let mut completed = Vec::new();

        for job in DailyJob::ALL {
            let trigger = trigger_hour(&self.config.schedule, job);
            if !is_due(&self.state, job, today, hour, trigger) {
                continue;
            }

            info!(job = job.as_str(), %today, "running daily job");
            if let Err(err) = self.run_job_at(job, now).await {
                self.ops
                    .error(job.as_str(), "daily job failed; retrying next heartbeat", &err)
                    .await;
                continue;
            }

            self.state.set_marker(job, today);
            if let Err(err) = self.states.save(&mut self.state).await {
                self.ops.error(job.as_str(), "failed to persist day marker", &err).await;
                continue;
            }
            completed.push(job);
        }

        completed
    }

    /// Run `job` immediately without consulting or advancing its marker.
    ///
    /// # Errors
    ///
    /// Returns the first error that fails the job as a whole.
    pub async fn run_job_at(&mut self, job: DailyJob, now: DateTime<Utc>) -> Result<()> {
        match job {
            DailyJob::StatusReport => self.status_report_at(now).await,
            DailyJob::DigestThread => self.digest_thread_at(now).await.map(|_| ()),
            DailyJob::BirthdayCheck => self.birthday_check_at(now).await.map(|_| ()),
        }
    }

    /// Republish failed posts whose backoff has elapsed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if listing or saving posts fails.
    pub async fn retry_failed_at(&mut self, now: DateTime<Utc>) -> Result<usize> {
        let candidates = self.posts.list_retryable(MAX_PUBLISH_ATTEMPTS).await?;
        let mut retried = 0;

        for mut post in candidates {
            if !retry_due(&post, now) {
                continue;
            }
            info!(
                post_id = %post.id,
                attempts = post.publish_attempts,
                "retrying failed post"
            );
            let media = self.fetch_media(post.image_ref.as_ref()).await;
            let Some(result) = self.publish_stored(&post, media.as_ref()).await else {
                warn!(post_id = %post.id, "failed post has nothing to publish");
                continue;
            };
            self.settle(&mut post, result, now).await?;
            retried += 1;
        }

        Ok(retried)
    }

    /// Publish one stored post on operator request.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown id or a post with nothing
    /// to publish, `AppError::InvalidTransition` if it is already posted, or
    /// `AppError::Db` on store failure. A publisher failure is recorded on
    /// the returned post.
    pub async fn publish_post_at(&mut self, id: &str, now: DateTime<Utc>) -> Result<Post> {
        let mut post = self
            .posts
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("post {id}")))?;

        if !post.can_transition_to(PostStatus::Posted) {
            return Err(AppError::InvalidTransition(format!(
                "post {id} is already {}",
                post.status.as_str()
            )));
        }

        let media = self.fetch_media(post.image_ref.as_ref()).await;
        let result = self
            .publish_stored(&post, media.as_ref())
            .await
            .ok_or_else(|| AppError::NotFound(format!("publishable text for post {id}")))?;
        self.settle(&mut post, result, now).await?;
        Ok(post)
    }

    /// Publish every pending post that carries generated text.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` on store failure.
    pub async fn publish_pending_at(&mut self, now: DateTime<Utc>) -> Result<PublishSummary> {
        let pending = self.posts.list_publishable(&[PostStatus::Pending]).await?;
        let mut summary = PublishSummary::default();

        for mut post in pending {
            let media = self.fetch_media(post.image_ref.as_ref()).await;
            let Some(result) = self.publish_stored(&post, media.as_ref()).await else {
                continue;
            };
            summary.attempted += 1;
            self.settle(&mut post, result, now).await?;
            if post.status == PostStatus::Posted {
                summary.published += 1;
            }
        }

        info!(
            attempted = summary.attempted,
            published = summary.published,
            "pending posts processed"
        );
        Ok(summary)
    }

    /// Health verdict at `now`.
    #[must_use]
    pub fn health_at(&self, now: DateTime<Utc>) -> HealthReport {
        let reason = if self.state.poll_failure_count >= POLL_FAILURE_ALERT_THRESHOLD {
            Some(format!(
                "{} consecutive poll failures",
                self.state.poll_failure_count
            ))
        } else {
            match self.state.last_poll_success_at {
                None => Some("no successful poll yet".to_owned()),
                Some(at) => {
                    let fresh = chrono::Duration::from_std(HEALTH_STALE_AFTER)
                        .is_ok_and(|limit| now.signed_duration_since(at) <= limit);
                    let stale = !fresh;
                    stale.then(|| format!("last successful poll at {}", at.to_rfc3339()))
                }
            }
        };

        HealthReport {
            healthy: reason.is_none(),
            reason,
            poll_failure_count: self.state.poll_failure_count,
            last_poll_success_at: self.state.last_poll_success_at,
        }
    }

    /// Most recently ingested posts.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn recent_posts(&self, limit: u32) -> Result<Vec<Post>> {
        self.posts.list_recent(limit).await
    }

    /// Most recent operator log entries.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn recent_logs(&self, limit: u32) -> Result<Vec<LogEntry>> {
        self.logs.list_recent(limit).await
    }

    /// Register or update a member birthday.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` for an unparseable date, or `AppError::Db`.
    pub async fn add_birthday(&self, name: &str, date: &str) -> Result<MemberBirthday> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Config("member name must not be empty".into()));
        }
        let birthday = normalize_birthday(date)
            .ok_or_else(|| AppError::Config(format!("invalid birthday: {date}")))?;
        self.members.upsert_birthday(name, &birthday).await
    }

    /// All registered members.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn members(&self) -> Result<Vec<MemberBirthday>> {
        self.members.list().await
    }

    /// Up to `limit` past messages of the source channel, newest last.
    ///
    /// Read-only: nothing is ingested or deduplicated.
    ///
    /// # Errors
    ///
    /// Returns the collector error unchanged.
    pub async fn history(&self, limit: u32) -> Result<Vec<SourceItem>> {
        self.collector
            .fetch_history(&self.config.source_channel_id, limit)
            .await
    }

    /// Resolve a username on the social account's platform.
    ///
    /// # Errors
    ///
    /// Returns the publisher error unchanged.
    pub async fn lookup_user(&self, username: &str) -> Result<String> {
        self.publisher
            .lookup_user(username.trim_start_matches('@'))
            .await
    }

    /// Recent posts mentioning `username`.
    ///
    /// # Errors
    ///
    /// Returns the publisher error unchanged.
    pub async fn mentions(&self, username: &str) -> Result<Vec<Mention>> {
        let user_id = self.lookup_user(username).await?;
        self.publisher.list_mentions(&user_id).await
    }

    /// Download the media behind `media`; any failure is logged and yields `None`.
    pub(super) async fn fetch_media(&self, media: Option<&MediaRef>) -> Option<Media> {
        let media = media?;
        match self.collector.download_media(media).await {
            Ok(Some(bytes)) => Some(Media {
                bytes,
                mime_type: media.mime_type.clone(),
            }),
            Ok(None) => None,
            Err(err) => {
                self.ops
                    .error("media", &format!("download of {} failed", media.file_id), &err)
                    .await;
                None
            }
        }
    }

    /// Publish a stored post according to its analysis kind.
    ///
    /// Calendar and recap analyses become threads; everything else is a
    /// single post. Returns `None` when there is no text to publish.
    pub(super) async fn publish_stored(
        &self,
        post: &Post,
        media: Option<&Media>,
    ) -> Option<Result<String>> {
        match &post.analysis {
            Some(Analysis::Calendar(facts)) => {
                Some(self.threads.publish_calendar(facts, media).await)
            }
            Some(Analysis::Recap(facts)) => Some(
                self.threads
                    .publish_recap(facts, post.generated_text.as_deref(), media)
                    .await,
            ),
            _ => {
                let text = post.publish_text()?.to_owned();
                Some(self.threads.publish_single(&text, media).await)
            }
        }
    }

    /// Record a publication outcome on `post` and persist it.
    pub(super) async fn settle(
        &self,
        post: &mut Post,
        result: Result<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        match result {
            Ok(external_id) => {
                post.mark_posted(Some(external_id), now)?;
                info!(post_id = %post.id, "post published");
            }
            Err(err) => {
                self.ops
                    .error("publish", &format!("publication of post {} failed", post.id), &err)
                    .await;
                post.mark_failed(err.to_string(), now)?;
            }
        }
        self.posts.save(post).await
    }
}

/// Whether the backoff of a failed post has elapsed at `now`.
///
/// The delay is `RETRY_BASE_DELAY × 2^(attempts − 1)` after the last attempt.
#[must_use]
pub fn retry_due(post: &Post, now: DateTime<Utc>) -> bool {
    if post.status != PostStatus::Failed || post.publish_attempts >= MAX_PUBLISH_ATTEMPTS {
        return false;
    }
    let exponent = post.publish_attempts.saturating_sub(1).min(16);
    let delay = RETRY_BASE_DELAY * 2_u32.pow(exponent);
    chrono::Duration::from_std(delay).is_ok_and(|delay| now >= post.updated_at + delay)
}
