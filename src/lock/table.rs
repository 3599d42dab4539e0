//! Lock table: the current holder of every named lock.
//!
//! Each name gets its own `Mutex<LockEntry>` behind an `Arc`, created lazily
//! the first time the name is touched. The table-wide map mutex is held only
//! to look up, insert or remove a slot, never while waiting on an entry, so
//! operations on different names do not serialize on each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::ownership;
use super::LockError;

/// State of a single named lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockEntry {
    pub name: String,
    /// Current holder, `None` when unheld.
    pub owner: Option<String>,
    pub acquired_at: Option<Instant>,
    /// Lease end. `None` for holds without a lease.
    pub expires_at: Option<Instant>,
}

impl LockEntry {
    /// An empty placeholder for `name`.
    pub fn unheld(name: impl Into<String>) -> Self {
        LockEntry {
            name: name.into(),
            owner: None,
            acquired_at: None,
            expires_at: None,
        }
    }

    /// Whether the lease (if any) has run out at `now`.
    pub fn lease_elapsed(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(expires_at) if now >= expires_at)
    }

    /// The effective holder at `now`, ignoring holds whose lease elapsed.
    pub fn holder_at(&self, now: Instant) -> Option<&str> {
        if self.lease_elapsed(now) {
            None
        } else {
            self.owner.as_deref()
        }
    }

    pub(crate) fn grant(&mut self, owner: &str, now: Instant, lease: Option<Duration>) {
        self.owner = Some(owner.to_string());
        self.acquired_at = Some(now);
        self.expires_at = lease.and_then(|lease| now.checked_add(lease));
    }

    pub(crate) fn clear(&mut self) {
        self.owner = None;
        self.acquired_at = None;
        self.expires_at = None;
    }
}

type Slot = Arc<Mutex<LockEntry>>;

/// Map from lock name to its current `LockEntry`.
pub struct LockTable {
    entries: Mutex<HashMap<String, Slot>>,
}

impl LockTable {
    pub fn new() -> Self {
        LockTable {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Snapshot of the entry for `name`, if the table has one.
    pub fn get(&self, name: &str) -> Result<Option<LockEntry>, LockError> {
        match self.existing(name)? {
            Some(slot) => Ok(Some(lock_entry(name, &slot)?.clone())),
            None => Ok(None),
        }
    }

    /// Atomically grant `name` to `owner` if nobody holds it.
    ///
    /// A hold whose lease has elapsed counts as free and is taken over.
    pub fn try_acquire(
        &self,
        name: &str,
        owner: &str,
        lease: Option<Duration>,
    ) -> Result<bool, LockError> {
        let slot = self.slot(name)?;
        let mut entry = lock_entry(name, &slot)?;
        let now = Instant::now();

        if entry.holder_at(now).is_some() {
            return Ok(false);
        }
        if let Some(previous) = &entry.owner {
            debug!(lock = name, previous = %previous, owner, "taking over elapsed lease");
        }
        entry.grant(owner, now, lease);
        Ok(true)
    }

    /// Release `name` on behalf of `owner`, returning the entry as it was
    /// just before release.
    pub fn release(&self, name: &str, owner: &str) -> Result<LockEntry, LockError> {
        let slot = self.existing(name)?.ok_or_else(|| LockError::NotLocked {
            name: name.to_string(),
        })?;
        let mut entry = lock_entry(name, &slot)?;
        ownership::validate(&entry, owner, Instant::now())?;

        let released = entry.clone();
        entry.clear();
        Ok(released)
    }

    /// Extend the lease on `name` to `lease` from now.
    ///
    /// Returns the new lease end, `None` if it does not fit in an `Instant`.
    pub fn renew(
        &self,
        name: &str,
        owner: &str,
        lease: Duration,
    ) -> Result<Option<Instant>, LockError> {
        let slot = self.existing(name)?.ok_or_else(|| LockError::NotLocked {
            name: name.to_string(),
        })?;
        let mut entry = lock_entry(name, &slot)?;
        let now = Instant::now();
        ownership::validate(&entry, owner, now)?;

        entry.expires_at = now.checked_add(lease);
        Ok(entry.expires_at)
    }

    /// Clear every hold whose lease elapsed at `now`, returning the
    /// expired entries.
    ///
    /// A poisoned entry is skipped; it does not stop the sweep of others.
    pub fn expire_leases(&self, now: Instant) -> Result<Vec<LockEntry>, LockError> {
        let slots: Vec<Slot> = self.map()?.values().cloned().collect();

        let mut expired = Vec::new();
        for slot in slots {
            let Ok(mut entry) = slot.lock() else {
                warn!("skipping poisoned lock entry during lease sweep");
                continue;
            };
            if entry.owner.is_some() && entry.lease_elapsed(now) {
                expired.push(entry.clone());
                entry.clear();
            }
        }
        Ok(expired)
    }

    /// Clear the hold on `name` if its lease elapsed at `now`, returning the
    /// expired entry.
    pub fn expire_lease(&self, name: &str, now: Instant) -> Result<Option<LockEntry>, LockError> {
        let Some(slot) = self.existing(name)? else {
            return Ok(None);
        };
        let mut entry = lock_entry(name, &slot)?;
        if entry.owner.is_none() || !entry.lease_elapsed(now) {
            return Ok(None);
        }
        let expired = entry.clone();
        entry.clear();
        Ok(Some(expired))
    }

    /// Drop the entry for `name` if it is unheld and nobody else is using it.
    pub fn reclaim(&self, name: &str) -> Result<bool, LockError> {
        let mut map = self.map()?;
        let unused = match map.get(name) {
            Some(slot) if Arc::strong_count(slot) == 1 => slot
                .lock()
                .map(|entry| entry.owner.is_none())
                .unwrap_or(false),
            _ => false,
        };
        if unused {
            map.remove(name);
        }
        Ok(unused)
    }

    /// Snapshot of every entry, in no particular order.
    pub fn entries(&self) -> Result<Vec<LockEntry>, LockError> {
        let slots: Vec<(String, Slot)> = self
            .map()?
            .iter()
            .map(|(name, slot)| (name.clone(), Arc::clone(slot)))
            .collect();

        slots
            .iter()
            .map(|(name, slot)| lock_entry(name, slot).map(|entry| entry.clone()))
            .collect()
    }

    /// Number of names with an entry (held or placeholder).
    pub fn len(&self) -> Result<usize, LockError> {
        Ok(self.map()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, LockError> {
        Ok(self.len()? == 0)
    }

    fn map(&self) -> Result<MutexGuard<'_, HashMap<String, Slot>>, LockError> {
        self.entries
            .lock()
            .map_err(|_| LockError::Poisoned("lock table map".into()))
    }

    fn slot(&self, name: &str) -> Result<Slot, LockError> {
        let mut map = self.map()?;
        Ok(map
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(LockEntry::unheld(name))))
            .clone())
    }

    fn existing(&self, name: &str) -> Result<Option<Slot>, LockError> {
        Ok(self.map()?.get(name).cloned())
    }
}

impl Default for LockTable {
    fn default() -> Self {
        Self::new()
    }
}

fn lock_entry<'a>(name: &str, slot: &'a Mutex<LockEntry>) -> Result<MutexGuard<'a, LockEntry>, LockError> {
    slot.lock().map_err(|_| {
        warn!(lock = name, "lock entry poisoned");
        LockError::Poisoned(format!("lock entry {}", name))
    })
}
