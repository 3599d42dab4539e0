use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::events::LockEvent;
#[cfg(feature = "emitter")]
use super::events::LockEvents;
use super::queue::{Admission, WaitOutcome, WaitQueue, WaitRequest};
use super::request::LockRequest;
use super::stats::{LockSnapshot, LockStats, StatsCollector};
use super::table::{LockEntry, LockTable};
use super::{LockError, LockManager, Locked, Renewed, Timeout, Unlocked};
use crate::config::LockConfig;

/// What one sweep cleared.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub leases_expired: usize,
    pub requests_expired: usize,
}

/// In-process lock manager built from a `LockTable` and a `WaitQueue`.
///
/// Holds without a lease last until unlocked. With a default lease (or
/// `lock_with_lease`), a hold whose lease elapsed counts as free: the next
/// acquisition takes it over, and blocked waiters wake at the lease end to
/// clear it and serve the head of the queue. `expire_leases`/`sweep`
/// (usually driven by a `LeaseSweeper`) do the same for locks nobody is
/// blocked on.
pub struct InMemoryLockManager {
    table: LockTable,
    queue: WaitQueue,
    default_lease: Option<Duration>,
    stats: StatsCollector,
    #[cfg(feature = "emitter")]
    events: LockEvents,
}

impl InMemoryLockManager {
    pub fn new() -> Self {
        InMemoryLockManager {
            table: LockTable::new(),
            queue: WaitQueue::new(),
            default_lease: None,
            stats: StatsCollector::default(),
            #[cfg(feature = "emitter")]
            events: LockEvents::new(),
        }
    }

    pub fn from_config(config: &LockConfig) -> Self {
        let manager = Self::new();
        match config.default_lease() {
            Some(lease) => manager.with_default_lease(lease),
            None => manager,
        }
    }

    /// Give every `lock` call a lease of `lease` unless it asks otherwise.
    pub fn with_default_lease(mut self, lease: Duration) -> Self {
        self.default_lease = Some(lease);
        self
    }

    pub fn default_lease(&self) -> Option<Duration> {
        self.default_lease
    }

    /// Start an acquisition with the default lease without blocking.
    ///
    /// The returned request is either already granted or queued; call
    /// `wait` to block on it, or `cancel` (or drop it) to give up.
    pub fn request(
        &self,
        name: &str,
        owner: &str,
        timeout: Timeout,
    ) -> Result<LockRequest<'_>, LockError> {
        self.request_with_lease(name, owner, timeout, self.default_lease)
    }

    /// Start an acquisition with an explicit lease (`None` for no lease).
    pub fn request_with_lease(
        &self,
        name: &str,
        owner: &str,
        timeout: Timeout,
        lease: Option<Duration>,
    ) -> Result<LockRequest<'_>, LockError> {
        let started = Instant::now();
        match self.queue.admit(&self.table, name, owner, timeout, lease)? {
            Admission::Granted => {
                let locked = self.granted(name, owner, started)?;
                Ok(LockRequest::granted(self, locked))
            }
            Admission::Queued(request) => Ok(LockRequest::queued(self, request, started)),
            Admission::Busy => Err(self.timed_out(name, owner)),
        }
    }

    /// Blocking acquisition with an explicit lease.
    pub fn lock_with_lease(
        &self,
        name: &str,
        owner: &str,
        timeout: Timeout,
        lease: Option<Duration>,
    ) -> Result<Locked, LockError> {
        self.request_with_lease(name, owner, timeout, lease)?.wait()
    }

    /// Clear every elapsed lease and hand each freed lock to its next waiter.
    pub fn expire_leases(&self) -> Result<Vec<LockEntry>, LockError> {
        let expired = self.table.expire_leases(Instant::now())?;
        for entry in &expired {
            self.lease_expired(entry);
            self.settle(&entry.name)?;
        }
        Ok(expired)
    }

    /// Expire elapsed leases and wait requests whose deadline passed.
    pub fn sweep(&self) -> Result<SweepReport, LockError> {
        let leases_expired = self.expire_leases()?.len();

        let requests = self.queue.expire(Instant::now())?;
        let names: BTreeSet<&str> = requests.iter().map(|r| r.lock_name()).collect();
        for name in names {
            self.settle(name)?;
        }

        Ok(SweepReport {
            leases_expired,
            requests_expired: requests.len(),
        })
    }

    /// Owners queued for `name`, head first.
    pub fn waiting(&self, name: &str) -> Result<Vec<String>, LockError> {
        self.queue.waiting(name)
    }

    /// Point-in-time view of every known lock, sorted by name.
    pub fn snapshot(&self) -> Result<Vec<LockSnapshot>, LockError> {
        let now = Instant::now();
        let mut snapshots = self
            .table
            .entries()?
            .into_iter()
            .map(|entry| {
                let owner = entry.holder_at(now).map(str::to_string);
                let held = owner.is_some();
                Ok(LockSnapshot {
                    waiters: self.queue.waiting(&entry.name)?,
                    held_for_ms: entry
                        .acquired_at
                        .filter(|_| held)
                        .map(|at| now.saturating_duration_since(at).as_millis() as u64),
                    lease_remaining_ms: entry
                        .expires_at
                        .filter(|_| held)
                        .map(|at| at.saturating_duration_since(now).as_millis() as u64),
                    owner,
                    name: entry.name,
                })
            })
            .collect::<Result<Vec<_>, LockError>>()?;
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(snapshots)
    }

    pub fn stats(&self) -> LockStats {
        self.stats.snapshot()
    }

    #[cfg(feature = "emitter")]
    pub fn events(&self) -> &LockEvents {
        &self.events
    }

    /// Block on a queued request and turn its outcome into a result.
    pub(crate) fn finish_wait(
        &self,
        request: &WaitRequest,
        started: Instant,
    ) -> Result<Locked, LockError> {
        let (name, owner) = (request.lock_name(), request.owner());
        let outcome = loop {
            match request.wait_for(self.lease_end(name)?)? {
                Some(outcome) => break outcome,
                None => self.expire_lease(name)?,
            }
        };
        match outcome {
            WaitOutcome::Granted => self.granted(name, owner, started),
            WaitOutcome::TimedOut => {
                self.queue.remove(name, request.id())?;
                self.settle(name)?;
                Err(self.timed_out(name, owner))
            }
            WaitOutcome::Cancelled => {
                self.queue.remove(name, request.id())?;
                self.settle(name)?;
                Err(self.cancelled(name, owner))
            }
        }
    }

    /// Give up on a request nobody will wait for.
    ///
    /// A grant that raced with the abandonment is released again so the
    /// lock moves on to the next waiter.
    pub(crate) fn abandon(&self, request: &WaitRequest) -> Result<(), LockError> {
        let (name, owner) = (request.lock_name(), request.owner());
        if request.resolve(WaitOutcome::Cancelled)? {
            self.queue.remove(name, request.id())?;
            self.settle(name)?;
            self.record_cancelled(name, owner);
            return Ok(());
        }

        match request.outcome()? {
            Some(WaitOutcome::Granted) => {
                debug!(lock = name, owner, "releasing unobserved grant");
                self.release_unobserved(name, owner)
            }
            _ => {
                self.queue.remove(name, request.id())?;
                self.settle(name)
            }
        }
    }

    /// Release a hold its owner never observed. An already elapsed lease is
    /// not an error here.
    pub(crate) fn release_unobserved(&self, name: &str, owner: &str) -> Result<(), LockError> {
        match self.unlock(name, owner) {
            Ok(_) | Err(LockError::NotLocked { .. }) => Ok(()),
            Err(err) => Err(err),
        }
    }

    fn granted(&self, name: &str, owner: &str, started: Instant) -> Result<Locked, LockError> {
        let expires_at = self.table.get(name)?.and_then(|entry| entry.expires_at);
        let waited = started.elapsed();
        debug!(lock = name, owner, waited_ms = waited.as_millis() as u64, "lock granted");
        StatsCollector::bump(&self.stats.acquired);
        self.publish(LockEvent::Acquired {
            name: name.to_string(),
            owner: owner.to_string(),
        });
        Ok(Locked {
            name: name.to_string(),
            owner: owner.to_string(),
            waited,
            expires_at,
        })
    }

    fn timed_out(&self, name: &str, owner: &str) -> LockError {
        debug!(lock = name, owner, "lock timed out");
        StatsCollector::bump(&self.stats.timed_out);
        self.publish(LockEvent::TimedOut {
            name: name.to_string(),
            owner: owner.to_string(),
        });
        LockError::TimedOut {
            name: name.to_string(),
            owner: owner.to_string(),
        }
    }

    fn cancelled(&self, name: &str, owner: &str) -> LockError {
        self.record_cancelled(name, owner);
        LockError::Cancelled {
            name: name.to_string(),
            owner: owner.to_string(),
        }
    }

    fn record_cancelled(&self, name: &str, owner: &str) {
        debug!(lock = name, owner, "lock request cancelled");
        StatsCollector::bump(&self.stats.cancelled);
        self.publish(LockEvent::Cancelled {
            name: name.to_string(),
            owner: owner.to_string(),
        });
    }

    fn lease_expired(&self, entry: &LockEntry) {
        let owner = entry.owner.clone().unwrap_or_default();
        info!(lock = %entry.name, owner = %owner, "lease expired");
        StatsCollector::bump(&self.stats.expired);
        self.publish(LockEvent::Expired {
            name: entry.name.clone(),
            owner,
        });
    }

    /// When the current hold on `name` runs out, if it has a lease.
    fn lease_end(&self, name: &str) -> Result<Option<Instant>, LockError> {
        Ok(self
            .table
            .get(name)?
            .filter(|entry| entry.owner.is_some())
            .and_then(|entry| entry.expires_at))
    }

    /// Clear the hold on `name` if its lease elapsed and serve the next
    /// waiter. Waiters call this when they wake at the holder's lease end,
    /// so expiry does not depend on a sweeper.
    fn expire_lease(&self, name: &str) -> Result<(), LockError> {
        if let Some(entry) = self.table.expire_lease(name, Instant::now())? {
            self.lease_expired(&entry);
            self.settle(name)?;
        }
        Ok(())
    }

    /// Serve the next waiter if the lock is free, and drop the bookkeeping
    /// for `name` once it is unheld with nobody waiting.
    fn settle(&self, name: &str) -> Result<(), LockError> {
        if self.queue.hand_off(name, &self.table)?.is_none() && self.queue.reclaim(name)? {
            self.table.reclaim(name)?;
        }
        Ok(())
    }

    fn publish(&self, event: LockEvent) {
        #[cfg(feature = "emitter")]
        self.events.emit(&event);
        #[cfg(not(feature = "emitter"))]
        let _ = event;
    }

    fn record_rejection(&self, err: &LockError) {
        if matches!(err, LockError::NotOwner { .. }) {
            StatsCollector::bump(&self.stats.not_owner);
        }
    }
}

impl Default for InMemoryLockManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LockManager for InMemoryLockManager {
    fn lock(&self, name: &str, owner: &str, timeout: Timeout) -> Result<Locked, LockError> {
        self.lock_with_lease(name, owner, timeout, self.default_lease)
    }

    fn unlock(&self, name: &str, owner: &str) -> Result<Unlocked, LockError> {
        let released = self.table.release(name, owner).map_err(|err| {
            self.record_rejection(&err);
            err
        })?;
        let held_for = released
            .acquired_at
            .map(|at| at.elapsed())
            .unwrap_or_default();

        debug!(lock = name, owner, held_ms = held_for.as_millis() as u64, "lock released");
        StatsCollector::bump(&self.stats.released);
        self.publish(LockEvent::Released {
            name: name.to_string(),
            owner: owner.to_string(),
        });
        self.settle(name)?;

        Ok(Unlocked {
            name: name.to_string(),
            owner: owner.to_string(),
            held_for,
        })
    }

    fn renew(&self, name: &str, owner: &str, lease: Duration) -> Result<Renewed, LockError> {
        let expires_at = self.table.renew(name, owner, lease).map_err(|err| {
            self.record_rejection(&err);
            err
        })?;
        debug!(lock = name, owner, lease_ms = lease.as_millis() as u64, "lease renewed");
        Ok(Renewed {
            name: name.to_string(),
            owner: owner.to_string(),
            expires_at,
        })
    }

    fn get_owner(&self, name: &str) -> Result<Option<String>, LockError> {
        let now = Instant::now();
        Ok(self
            .table
            .get(name)?
            .and_then(|entry| entry.holder_at(now).map(str::to_string)))
    }
}
