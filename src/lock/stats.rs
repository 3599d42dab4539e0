use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Counters for a lock manager since it was created.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockStats {
    pub acquired: u64,
    pub released: u64,
    pub timed_out: u64,
    pub cancelled: u64,
    /// Holds cleared because their lease elapsed.
    pub expired: u64,
    /// Unlock or renew attempts rejected as `NotOwner`.
    pub not_owner: u64,
}

/// Point-in-time view of one named lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockSnapshot {
    pub name: String,
    pub owner: Option<String>,
    pub held_for_ms: Option<u64>,
    pub lease_remaining_ms: Option<u64>,
    /// Owners queued for the lock, head first.
    pub waiters: Vec<String>,
}

#[derive(Debug, Default)]
pub(crate) struct StatsCollector {
    pub(crate) acquired: AtomicU64,
    pub(crate) released: AtomicU64,
    pub(crate) timed_out: AtomicU64,
    pub(crate) cancelled: AtomicU64,
    pub(crate) expired: AtomicU64,
    pub(crate) not_owner: AtomicU64,
}

impl StatsCollector {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> LockStats {
        LockStats {
            acquired: self.acquired.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
            not_owner: self.not_owner.load(Ordering::Relaxed),
        }
    }
}
