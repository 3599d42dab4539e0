use tracing::warn;

use super::{LockError, LockManager, Unlocked};

/// Holds a named lock until dropped or explicitly unlocked.
pub struct LockGuard<'a, M: LockManager + ?Sized> {
    manager: &'a M,
    name: String,
    owner: String,
    released: bool,
}

impl<'a, M: LockManager + ?Sized> LockGuard<'a, M> {
    /// Wrap a lock that `owner` already holds.
    pub fn new(manager: &'a M, name: impl Into<String>, owner: impl Into<String>) -> Self {
        LockGuard {
            manager,
            name: name.into(),
            owner: owner.into(),
            released: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Release now and report the outcome.
    pub fn unlock(mut self) -> Result<Unlocked, LockError> {
        self.released = true;
        self.manager.unlock(&self.name, &self.owner)
    }
}

impl<M: LockManager + ?Sized> Drop for LockGuard<'_, M> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(err) = self.manager.unlock(&self.name, &self.owner) {
            warn!(lock = %self.name, owner = %self.owner, error = %err, "guard release failed");
        }
    }
}
