//! Relay orchestration.
//!
//! [`relay::Relay`] is the single owner of all mutable relay state: the
//! scheduler record, the dedupe cache and every write to post status.
//! [`actor`] wraps it in a tokio task that serializes heartbeats and
//! operator commands, so the core itself needs no locking.

use std::time::Duration;

pub mod actor;
pub mod day_gate;
pub mod dedupe;
pub mod ingest;
pub mod jobs;
pub mod ops_log;
pub mod pipeline;
pub mod relay;
pub mod threads;

/// Consecutive poll failures at which the operator is alerted, and at
/// which `/health` reports degraded.
pub const POLL_FAILURE_ALERT_THRESHOLD: u32 = 5;

/// A successful poll older than this marks the relay as degraded.
pub const HEALTH_STALE_AFTER: Duration = Duration::from_secs(15 * 60);

/// Automatic publication attempts before a failed post is left for manual action.
pub const MAX_PUBLISH_ATTEMPTS: u32 = 3;

/// Delay before the first automatic retry; doubles with each attempt.
pub const RETRY_BASE_DELAY: Duration = Duration::from_secs(5 * 60);
