//! Two-tier "already seen" check for source items.
//!
//! The memory tier answers the common just-processed case; the durable
//! post table is the source of truth across restarts.

use std::collections::{HashSet, VecDeque};

use tracing::debug;

use crate::persistence::post_repo::PostRepo;
use crate::Result;

/// Capacity of the in-memory tier.
pub const RECENT_CAPACITY: usize = 100;

/// Bounded set that evicts the oldest inserted id once over capacity.
///
/// Eviction follows insertion order, not access order.
#[derive(Debug)]
pub struct RecentIds {
    capacity: usize,
    order: VecDeque<String>,
    members: HashSet<String>,
}

impl RecentIds {
    /// Create an empty set holding at most `capacity` ids.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity + 1),
            members: HashSet::with_capacity(capacity + 1),
        }
    }

    /// Whether `id` is held.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.members.contains(id)
    }

    /// Insert `id`, returning the evicted id if capacity was exceeded.
    pub fn insert(&mut self, id: &str) -> Option<String> {
        if self.capacity == 0 || !self.members.insert(id.to_owned()) {
            return None;
        }
        self.order.push_back(id.to_owned());
        if self.order.len() > self.capacity {
            let evicted = self.order.pop_front()?;
            self.members.remove(&evicted);
            return Some(evicted);
        }
        None
    }

    /// Number of ids held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no id is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Memory cache in front of the durable existence query.
pub struct Deduplicator {
    recent: RecentIds,
    posts: PostRepo,
}

impl Deduplicator {
    /// Create a deduplicator with the default capacity.
    #[must_use]
    pub fn new(posts: PostRepo) -> Self {
        Self {
            recent: RecentIds::new(RECENT_CAPACITY),
            posts,
        }
    }

    /// Whether `id` has never been processed.
    ///
    /// A durable hit is written through to the memory tier.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the existence query fails.
    pub async fn is_new(&mut self, id: &str) -> Result<bool> {
        if self.recent.contains(id) {
            debug!(id, "dedupe hit in memory");
            return Ok(false);
        }
        if self.posts.exists(id).await? {
            debug!(id, "dedupe hit in store");
            self.recent.insert(id);
            return Ok(false);
        }
        Ok(true)
    }

    /// Record a freshly processed id.
    pub fn remember(&mut self, id: &str) {
        self.recent.insert(id);
    }

    /// Number of ids in the memory tier.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.recent.len()
    }
}
