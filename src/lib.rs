//! Named, owner-tagged locks.
//!
//! A lock is identified by a name and held by an opaque owner token.
//! `lock` waits up to a timeout, serving waiters on the same name strictly
//! in arrival order; `unlock` succeeds only for the recorded owner.
//!
//! ```
//! use named_locks::{InMemoryLockManager, LockError, LockManager, Timeout};
//!
//! let locks = InMemoryLockManager::new();
//! locks.lock("realms", "worker-1", Timeout::from_millis(1000)).unwrap();
//!
//! assert_eq!(locks.get_owner("realms").unwrap().as_deref(), Some("worker-1"));
//! assert!(matches!(
//!     locks.lock("realms", "worker-2", Timeout::Immediate),
//!     Err(LockError::TimedOut { .. })
//! ));
//! assert!(matches!(
//!     locks.unlock("realms", "worker-2"),
//!     Err(LockError::NotOwner { .. })
//! ));
//! locks.unlock("realms", "worker-1").unwrap();
//! assert!(!locks.is_locked("realms").unwrap());
//! ```

mod client;
mod config;
pub mod lock;
pub mod task;

pub use client::{current_thread_owner, LockClient};
pub use config::LockConfig;
#[cfg(feature = "emitter")]
pub use lock::LockEvents;
pub use lock::{
    Canceller, InMemoryLockManager, LeaseSweeper, LockEntry, LockError, LockEvent, LockGuard,
    LockManager, LockRequest, LockSnapshot, LockStats, LockTable, Locked, Renewed, SweepReport,
    SweepStats, Timeout, Unlocked, WaitQueue,
};
pub use task::{LockOp, LockTask, TaskError, TaskOutput};
