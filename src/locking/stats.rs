use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Lock manager counters
#[derive(Debug, Default)]
pub struct LockManagerStats {
    pub granted: AtomicU64,
    pub renewed: AtomicU64,
    pub denied: AtomicU64,
    pub released: AtomicU64,
    pub sessions_expired: AtomicU64,
    pub locks_expired: AtomicU64,
    pub force_releases: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockStatsSnapshot {
    pub granted: u64,
    pub renewed: u64,
    pub denied: u64,
    pub released: u64,
    pub sessions_expired: u64,
    pub locks_expired: u64,
    pub force_releases: u64,
}

impl LockManagerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_granted(&self) {
        self.granted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_renewed(&self) {
        self.renewed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_denied(&self) {
        self.denied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_released(&self) {
        self.released.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sessions_expired(&self, count: usize) {
        self.sessions_expired
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_locks_expired(&self, count: usize) {
        self.locks_expired.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_force_release(&self) {
        self.force_releases.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> LockStatsSnapshot {
        LockStatsSnapshot {
            granted: self.granted.load(Ordering::Relaxed),
            renewed: self.renewed.load(Ordering::Relaxed),
            denied: self.denied.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
            sessions_expired: self.sessions_expired.load(Ordering::Relaxed),
            locks_expired: self.locks_expired.load(Ordering::Relaxed),
            force_releases: self.force_releases.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.snapshot();
        info!(
            "Lock manager stats: granted={}, renewed={}, denied={}, released={}, sessions_expired={}, locks_expired={}, force_releases={}",
            stats.granted,
            stats.renewed,
            stats.denied,
            stats.released,
            stats.sessions_expired,
            stats.locks_expired,
            stats.force_releases
        );
    }
}
