//! Relay counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Counters shared by the pump, the listener callbacks and the relay.
#[derive(Debug)]
pub struct MirrorStats {
    /// Start time for uptime calculation.
    start_time: Instant,
    /// Completed sync rounds.
    sync_ticks: AtomicU64,
    /// Failed sync rounds.
    sync_failures: AtomicU64,
    /// Change notifications received by listeners.
    notifications: AtomicU64,
    /// Messages published.
    published: AtomicU64,
    /// Failed publishes.
    publish_failures: AtomicU64,
    /// Updates dropped because a newer revision was already published.
    stale_dropped: AtomicU64,
    /// Updates or bindings refused for a type conflict.
    type_conflicts: AtomicU64,
    /// Updates or entries refused for an unsupported type.
    unsupported: AtomicU64,
}

impl Default for MirrorStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`MirrorStats`] for serialization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub uptime_secs: u64,
    pub sync_ticks: u64,
    pub sync_failures: u64,
    pub notifications: u64,
    pub published: u64,
    pub publish_failures: u64,
    pub stale_dropped: u64,
    pub type_conflicts: u64,
    pub unsupported: u64,
}

impl MirrorStats {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            sync_ticks: AtomicU64::new(0),
            sync_failures: AtomicU64::new(0),
            notifications: AtomicU64::new(0),
            published: AtomicU64::new(0),
            publish_failures: AtomicU64::new(0),
            stale_dropped: AtomicU64::new(0),
            type_conflicts: AtomicU64::new(0),
            unsupported: AtomicU64::new(0),
        }
    }

    pub fn record_sync(&self) {
        self.sync_ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sync_failure(&self) {
        self.sync_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_notification(&self) {
        self.notifications.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_publish_failure(&self) {
        self.publish_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale(&self) {
        self.stale_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_type_conflict(&self) {
        self.type_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unsupported(&self) {
        self.unsupported.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a snapshot of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            uptime_secs: self.start_time.elapsed().as_secs(),
            sync_ticks: self.sync_ticks.load(Ordering::Relaxed),
            sync_failures: self.sync_failures.load(Ordering::Relaxed),
            notifications: self.notifications.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            stale_dropped: self.stale_dropped.load(Ordering::Relaxed),
            type_conflicts: self.type_conflicts.load(Ordering::Relaxed),
            unsupported: self.unsupported.load(Ordering::Relaxed),
        }
    }
}
