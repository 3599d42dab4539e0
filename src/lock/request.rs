use std::sync::Arc;
use std::time::Instant;

use tracing::warn;

use super::in_memory::InMemoryLockManager;
use super::queue::{WaitOutcome, WaitRequest};
use super::{LockError, Locked};

enum State {
    Granted(Locked),
    Pending {
        request: Arc<WaitRequest>,
        started: Instant,
    },
}

/// An acquisition started with `InMemoryLockManager::request`.
///
/// Either already granted or queued. `wait` blocks until the outcome is
/// known; `cancel` gives up. Dropping a request that was never waited on
/// cancels it, and releases the lock if it had been granted meanwhile.
pub struct LockRequest<'a> {
    manager: &'a InMemoryLockManager,
    name: String,
    owner: String,
    state: Option<State>,
}

impl<'a> LockRequest<'a> {
    pub(crate) fn granted(manager: &'a InMemoryLockManager, locked: Locked) -> Self {
        LockRequest {
            manager,
            name: locked.name.clone(),
            owner: locked.owner.clone(),
            state: Some(State::Granted(locked)),
        }
    }

    pub(crate) fn queued(
        manager: &'a InMemoryLockManager,
        request: Arc<WaitRequest>,
        started: Instant,
    ) -> Self {
        LockRequest {
            manager,
            name: request.lock_name().to_string(),
            owner: request.owner().to_string(),
            state: Some(State::Pending { request, started }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Whether the request had to queue and has not been resolved yet.
    pub fn is_pending(&self) -> bool {
        matches!(&self.state, Some(State::Pending { request, .. }) if !request.is_resolved())
    }

    /// A handle that can cancel this request from another thread.
    ///
    /// `None` if the lock was granted without queueing.
    pub fn canceller(&self) -> Option<Canceller> {
        match &self.state {
            Some(State::Pending { request, .. }) => Some(Canceller {
                request: Arc::clone(request),
            }),
            _ => None,
        }
    }

    /// Block until the lock is granted, the deadline passes, or the request
    /// is cancelled.
    pub fn wait(mut self) -> Result<Locked, LockError> {
        match self.state.take() {
            Some(State::Granted(locked)) => Ok(locked),
            Some(State::Pending { request, started }) => {
                self.manager.finish_wait(&request, started)
            }
            None => Err(LockError::Cancelled {
                name: self.name.clone(),
                owner: self.owner.clone(),
            }),
        }
    }

    /// Give up on the request.
    ///
    /// A queued request leaves its line without disturbing other waiters.
    /// A request that was already granted releases the lock.
    pub fn cancel(mut self) -> Result<(), LockError> {
        self.abandon()
    }

    fn abandon(&mut self) -> Result<(), LockError> {
        match self.state.take() {
            Some(State::Granted(locked)) => {
                self.manager.release_unobserved(&locked.name, &locked.owner)
            }
            Some(State::Pending { request, .. }) => self.manager.abandon(&request),
            None => Ok(()),
        }
    }
}

impl Drop for LockRequest<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.abandon() {
            warn!(lock = %self.name, owner = %self.owner, error = %err, "abandoning lock request failed");
        }
    }
}

/// Cancels a queued request from any thread.
#[derive(Debug, Clone)]
pub struct Canceller {
    request: Arc<WaitRequest>,
}

impl Canceller {
    /// Resolve the request as cancelled and wake its waiter.
    ///
    /// Returns `false` if it had already been granted, timed out or
    /// cancelled.
    pub fn cancel(&self) -> bool {
        matches!(self.request.resolve(WaitOutcome::Cancelled), Ok(true))
    }

    pub fn lock_name(&self) -> &str {
        self.request.lock_name()
    }
}
