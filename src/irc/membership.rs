//! Channel membership.
//!
//! [`Presence`] is the live set of users in the channel, seeded from name
//! replies and updated on every JOIN and PART. [`MembershipBatcher`]
//! coalesces the individual changes into one
//! [`ConnectionEvent::MembershipChanged`] per burst, because the server
//! delivers joins and parts in bulk.

use std::cmp;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, Notify};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use crate::event::ConnectionEvent;

/// Concurrency-safe set of users present in a channel.
///
/// Clones share the same set. Only the connection mutates it.
#[derive(Debug, Clone, Default)]
pub struct Presence {
    users: Arc<RwLock<HashSet<String>>>,
}

impl Presence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, user: &str) -> bool {
        self.users.read().contains(user)
    }

    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }

    /// Sorted copy of the current members.
    pub fn snapshot(&self) -> Vec<String> {
        let mut users: Vec<String> = self.users.read().iter().cloned().collect();
        users.sort();
        users
    }

    pub(crate) fn insert(&self, user: &str) {
        self.users.write().insert(user.to_string());
    }

    pub(crate) fn remove(&self, user: &str) {
        self.users.write().remove(user);
    }

    pub(crate) fn extend<I>(&self, users: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.users.write().extend(users);
    }

    pub(crate) fn clear(&self) {
        self.users.write().clear();
    }
}

#[derive(Debug, Default)]
struct Pending {
    joined: HashSet<String>,
    left: HashSet<String>,
    first_change: Option<Instant>,
    last_change: Option<Instant>,
}

impl Pending {
    fn touch(&mut self) {
        let now = Instant::now();
        self.first_change.get_or_insert(now);
        self.last_change = Some(now);
    }

    fn take(&mut self) -> (Vec<String>, Vec<String>) {
        let mut joined: Vec<String> = self.joined.drain().collect();
        let mut left: Vec<String> = self.left.drain().collect();
        joined.sort();
        left.sort();
        self.first_change = None;
        self.last_change = None;
        (joined, left)
    }
}

/// Accumulates joins and parts and flushes them in batches.
///
/// A batch is flushed one quiet period after the later of "one quiet
/// period after the first change" and "the latest change", so it is never
/// sooner than two quiet periods after it opened. A steady trickle of
/// changes cannot hold it open past `max_delay`.
pub struct MembershipBatcher {
    pending: Mutex<Pending>,
    wake: Notify,
    quiet_period: Duration,
    max_delay: Duration,
}

impl MembershipBatcher {
    pub fn new(quiet_period: Duration, max_delay: Duration) -> Self {
        Self {
            pending: Mutex::new(Pending::default()),
            wake: Notify::new(),
            quiet_period,
            max_delay,
        }
    }

    pub fn record_join(&self, user: &str) {
        let mut pending = self.pending.lock();
        pending.joined.insert(user.to_string());
        pending.touch();
        drop(pending);
        self.wake.notify_one();
    }

    pub fn record_part(&self, user: &str) {
        let mut pending = self.pending.lock();
        pending.left.insert(user.to_string());
        pending.touch();
        drop(pending);
        self.wake.notify_one();
    }

    /// Changes recorded but not yet flushed, as `(joined, left)` counts.
    pub fn pending_counts(&self) -> (usize, usize) {
        let pending = self.pending.lock();
        (pending.joined.len(), pending.left.len())
    }

    fn flush_deadline(&self) -> Option<Instant> {
        let pending = self.pending.lock();
        let first = pending.first_change?;
        let last = pending.last_change.unwrap_or(first);
        let settled = cmp::max(first + self.quiet_period, last) + self.quiet_period;
        Some(cmp::min(settled, first + self.max_delay))
    }

    /// Run the batching loop until `cancel` fires.
    pub async fn run(
        self: Arc<Self>,
        events: broadcast::Sender<ConnectionEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            let Some(deadline) = self.flush_deadline() else {
                tokio::select! {
                    () = cancel.cancelled() => return,
                    () = self.wake.notified() => {}
                }
                continue;
            };

            if Instant::now() < deadline {
                tokio::select! {
                    () = cancel.cancelled() => return,
                    () = sleep_until(deadline) => {}
                }
                // New changes may have moved the deadline.
                continue;
            }

            let (joined, left) = self.pending.lock().take();
            if joined.is_empty() && left.is_empty() {
                continue;
            }
            tracing::debug!(
                joined = joined.len(),
                left = left.len(),
                "Flushing membership changes"
            );
            let _ = events.send(ConnectionEvent::MembershipChanged { joined, left });
        }
    }
}
