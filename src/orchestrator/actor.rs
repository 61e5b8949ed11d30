//! Actor task serializing heartbeats and operator commands over the relay.
//!
//! The actor starts cold: no heartbeat is scheduled until the first command
//! arrives (the binary sends [`RelayHandle::prime`] at start-up). The first
//! heartbeat runs right after that command is answered and before the next
//! one is served. Each heartbeat schedules the next a fixed interval later.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, Instrument};

use super::relay::{HealthReport, HeartbeatReport, PublishSummary, Relay};
use crate::collector::SourceItem;
use crate::models::log_entry::LogEntry;
use crate::models::member::MemberBirthday;
use crate::models::post::Post;
use crate::models::scheduler_state::{DailyJob, SchedulerState};
use crate::publisher::Mention;
use crate::{AppError, Result};

/// Capacity of the command queue.
const COMMAND_QUEUE: usize = 32;

type Reply<T> = oneshot::Sender<Result<T>>;

/// Messages accepted by the relay actor.
enum Command {
    Prime(Reply<()>),
    Tick(Reply<HeartbeatReport>),
    RunJob(DailyJob, Reply<()>),
    Publish(String, Reply<Post>),
    PublishPending(Reply<PublishSummary>),
    Posts(u32, Reply<Vec<Post>>),
    Logs(u32, Reply<Vec<LogEntry>>),
    State(Reply<SchedulerState>),
    Health(Reply<HealthReport>),
    AddBirthday {
        name: String,
        date: String,
        reply: Reply<MemberBirthday>,
    },
    Members(Reply<Vec<MemberBirthday>>),
    LookupUser(String, Reply<String>),
    Mentions(String, Reply<Vec<Mention>>),
    History(u32, Reply<Vec<SourceItem>>),
}

/// Cloneable handle for sending commands to the relay actor.
#[derive(Clone)]
pub struct RelayHandle {
    tx: mpsc::Sender<Command>,
}

impl RelayHandle {
    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| AppError::Ipc("relay actor has stopped".into()))?;
        reply_rx
            .await
            .map_err(|_| AppError::Ipc("relay actor dropped the request".into()))?
    }

    /// Wake the actor so that it schedules its first heartbeat.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Ipc` if the actor has stopped.
    pub async fn prime(&self) -> Result<()> {
        self.request(Command::Prime).await
    }

    /// Run a heartbeat now.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Ipc` if the actor has stopped.
    pub async fn tick(&self) -> Result<HeartbeatReport> {
        self.request(Command::Tick).await
    }

    /// Run a daily job now, outside its day gate.
    ///
    /// # Errors
    ///
    /// Returns the job error, or `AppError::Ipc` if the actor has stopped.
    pub async fn run_job(&self, job: DailyJob) -> Result<()> {
        self.request(|reply| Command::RunJob(job, reply)).await
    }

    /// Publish one stored post.
    ///
    /// # Errors
    ///
    /// See [`Relay::publish_post_at`].
    pub async fn publish(&self, id: String) -> Result<Post> {
        self.request(|reply| Command::Publish(id, reply)).await
    }

    /// Publish every pending post with generated text.
    ///
    /// # Errors
    ///
    /// See [`Relay::publish_pending_at`].
    pub async fn publish_pending(&self) -> Result<PublishSummary> {
        self.request(Command::PublishPending).await
    }

    /// Most recently ingested posts.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` or `AppError::Ipc`.
    pub async fn posts(&self, limit: u32) -> Result<Vec<Post>> {
        self.request(|reply| Command::Posts(limit, reply)).await
    }

    /// Most recent operator log entries.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` or `AppError::Ipc`.
    pub async fn logs(&self, limit: u32) -> Result<Vec<LogEntry>> {
        self.request(|reply| Command::Logs(limit, reply)).await
    }

    /// Snapshot of the scheduler state.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Ipc` if the actor has stopped.
    pub async fn state(&self) -> Result<SchedulerState> {
        self.request(Command::State).await
    }

    /// Current health verdict.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Ipc` if the actor has stopped.
    pub async fn health(&self) -> Result<HealthReport> {
        self.request(Command::Health).await
    }

    /// Register or update a member birthday.
    ///
    /// # Errors
    ///
    /// See [`Relay::add_birthday`].
    pub async fn add_birthday(&self, name: String, date: String) -> Result<MemberBirthday> {
        self.request(|reply| Command::AddBirthday { name, date, reply })
            .await
    }

    /// All registered members.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` or `AppError::Ipc`.
    pub async fn members(&self) -> Result<Vec<MemberBirthday>> {
        self.request(Command::Members).await
    }

    /// Resolve a username to a user id.
    ///
    /// # Errors
    ///
    /// See [`Relay::lookup_user`].
    pub async fn lookup_user(&self, username: String) -> Result<String> {
        self.request(|reply| Command::LookupUser(username, reply))
            .await
    }

    /// Recent posts mentioning `username`.
    ///
    /// # Errors
    ///
    /// See [`Relay::mentions`].
    pub async fn mentions(&self, username: String) -> Result<Vec<Mention>> {
        self.request(|reply| Command::Mentions(username, reply))
            .await
    }

    /// Past messages of the source channel.
    ///
    /// # Errors
    ///
    /// See [`Relay::history`].
    pub async fn history(&self, limit: u32) -> Result<Vec<SourceItem>> {
        self.request(|reply| Command::History(limit, reply)).await
    }
}

/// Spawn the relay actor.
///
/// The actor stops when `cancel` fires or every handle is dropped. The join
/// handle yields the relay back for inspection.
#[must_use]
pub fn spawn_relay(
    relay: Relay,
    heartbeat_interval: Duration,
    cancel: CancellationToken,
) -> (RelayHandle, JoinHandle<Relay>) {
    let (tx, rx) = mpsc::channel(COMMAND_QUEUE);
    let task = tokio::spawn(
        run(relay, heartbeat_interval, rx, cancel).instrument(info_span!("relay_actor")),
    );
    (RelayHandle { tx }, task)
}

async fn run(
    mut relay: Relay,
    heartbeat_interval: Duration,
    mut rx: mpsc::Receiver<Command>,
    cancel: CancellationToken,
) -> Relay {
    let mut next_heartbeat: Option<Instant> = None;
    info!(
        interval_secs = heartbeat_interval.as_secs(),
        "relay actor started"
    );

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                info!("relay actor shutting down");
                break;
            }
            () = sleep_until(next_heartbeat) => {
                next_heartbeat = Some(Instant::now() + heartbeat_interval);
                relay.heartbeat_at(Utc::now()).await;
            }
            command = rx.recv() => {
                let Some(command) = command else {
                    debug!("all relay handles dropped");
                    break;
                };
                handle(&mut relay, command).await;
                if next_heartbeat.is_none() {
                    debug!("first request served; running initial heartbeat");
                    next_heartbeat = Some(Instant::now() + heartbeat_interval);
                    relay.heartbeat_at(Utc::now()).await;
                }
            }
        }
    }

    relay
}

/// Sleep until `deadline`, or forever when no heartbeat is scheduled.
async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn handle(relay: &mut Relay, command: Command) {
    let now = Utc::now();
    // A dropped reply receiver only means the caller went away.
    match command {
        Command::Prime(reply) => {
            let _ = reply.send(Ok(()));
        }
        Command::Tick(reply) => {
            let _ = reply.send(Ok(relay.heartbeat_at(now).await));
        }
        Command::RunJob(job, reply) => {
            info!(job = job.as_str(), "manual job run");
            let _ = reply.send(relay.run_job_at(job, now).await);
        }
        Command::Publish(id, reply) => {
            let _ = reply.send(relay.publish_post_at(&id, now).await);
        }
        Command::PublishPending(reply) => {
            let _ = reply.send(relay.publish_pending_at(now).await);
        }
        Command::Posts(limit, reply) => {
            let _ = reply.send(relay.recent_posts(limit).await);
        }
        Command::Logs(limit, reply) => {
            let _ = reply.send(relay.recent_logs(limit).await);
        }
        Command::State(reply) => {
            let _ = reply.send(Ok(relay.state().clone()));
        }
        Command::Health(reply) => {
            let _ = reply.send(Ok(relay.health_at(now)));
        }
        Command::AddBirthday { name, date, reply } => {
            let _ = reply.send(relay.add_birthday(&name, &date).await);
        }
        Command::Members(reply) => {
            let _ = reply.send(relay.members().await);
        }
        Command::LookupUser(username, reply) => {
            let _ = reply.send(relay.lookup_user(&username).await);
        }
        Command::Mentions(username, reply) => {
            let _ = reply.send(relay.mentions(&username).await);
        }
        Command::History(limit, reply) => {
            let _ = reply.send(relay.history(limit).await);
        }
    }
}
