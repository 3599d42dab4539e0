use std::time::{Duration, Instant};

use super::guard::LockGuard;
use super::{LockError, Timeout};

/// A granted acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locked {
    pub name: String,
    pub owner: String,
    /// Time spent between the request and the grant.
    pub waited: Duration,
    /// Lease end, `None` for holds without a lease.
    pub expires_at: Option<Instant>,
}

/// A successful release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unlocked {
    pub name: String,
    pub owner: String,
    pub held_for: Duration,
}

/// A successful lease renewal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Renewed {
    pub name: String,
    pub owner: String,
    pub expires_at: Option<Instant>,
}

/// Named, owner-tagged locks.
///
/// `lock` blocks the calling thread until the lock is granted, the timeout
/// elapses or the request is cancelled. Waiters on the same name are
/// served in arrival order. Only the recorded owner may `unlock` or
/// `renew`, matched by exact string equality.
///
/// The default `InMemoryLockManager` keeps everything in process; a
/// deployment that needs locks to survive restarts would put a replicated
/// store behind the same trait.
pub trait LockManager: Send + Sync {
    /// Acquire `name` for `owner`, waiting at most `timeout`.
    fn lock(&self, name: &str, owner: &str, timeout: Timeout) -> Result<Locked, LockError>;

    /// Release `name`. Fails with `NotOwner` or `NotLocked` without
    /// changing any state.
    fn unlock(&self, name: &str, owner: &str) -> Result<Unlocked, LockError>;

    /// Extend the lease on `name` to `lease` from now.
    fn renew(&self, name: &str, owner: &str, lease: Duration) -> Result<Renewed, LockError>;

    /// Current holder of `name`, if any.
    fn get_owner(&self, name: &str) -> Result<Option<String>, LockError>;

    fn is_locked(&self, name: &str) -> Result<bool, LockError> {
        Ok(self.get_owner(name)?.is_some())
    }

    /// Acquire `name` and return a guard that unlocks it when dropped.
    fn guard(
        &self,
        name: &str,
        owner: &str,
        timeout: Timeout,
    ) -> Result<LockGuard<'_, Self>, LockError>
    where
        Self: Sized,
    {
        self.lock(name, owner, timeout)?;
        Ok(LockGuard::new(self, name, owner))
    }

    /// Run `f` while holding `name`.
    fn with_lock<T, F>(&self, name: &str, owner: &str, timeout: Timeout, f: F) -> Result<T, LockError>
    where
        Self: Sized,
        F: FnOnce() -> T,
    {
        let guard = self.guard(name, owner, timeout)?;
        let value = f();
        guard.unlock()?;
        Ok(value)
    }
}
