//! Thread-bound lock client.
//!
//! Callers that do not carry an explicit owner token use the name of the
//! current thread instead, so only the thread that acquired a lock can
//! release it. Timeouts are whole seconds, converted to milliseconds for
//! the locking task.

use std::thread;

use crate::lock::LockManager;
use crate::task::{LockTask, TaskError, TaskOutput};

/// Owner token for the current thread: its name, or its id when unnamed.
pub fn current_thread_owner() -> String {
    let current = thread::current();
    match current.name() {
        Some(name) => name.to_string(),
        None => format!("{:?}", current.id()),
    }
}

/// Issues locking tasks on behalf of the calling thread.
pub struct LockClient<'a, M: LockManager + ?Sized> {
    manager: &'a M,
}

impl<'a, M: LockManager + ?Sized> LockClient<'a, M> {
    pub fn new(manager: &'a M) -> Self {
        LockClient { manager }
    }

    /// Acquire `name` for the current thread, waiting up to `timeout_secs`.
    pub fn acquire_lock(&self, name: &str, timeout_secs: u64) -> Result<TaskOutput, TaskError> {
        let timeout_ms = i64::try_from(timeout_secs.saturating_mul(1000)).unwrap_or(-1);
        LockTask::lock(name, current_thread_owner(), timeout_ms).execute(self.manager)
    }

    /// Release `name`. Fails with `NotOwner` unless the current thread
    /// acquired it.
    pub fn release_lock(&self, name: &str) -> Result<TaskOutput, TaskError> {
        LockTask::unlock(name, current_thread_owner()).execute(self.manager)
    }
}
