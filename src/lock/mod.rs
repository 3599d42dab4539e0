mod error;
pub mod events;
mod guard;
mod in_memory;
mod lock_manager;
mod ownership;
mod queue;
mod request;
mod stats;
mod sweeper;
mod table;
mod timeout;

pub use error::LockError;
#[cfg(feature = "emitter")]
pub use events::LockEvents;
pub use events::LockEvent;
pub use guard::LockGuard;
pub use in_memory::{InMemoryLockManager, SweepReport};
pub use lock_manager::{LockManager, Locked, Renewed, Unlocked};
pub use ownership::validate as validate_owner;
pub use queue::{Admission, WaitOutcome, WaitQueue, WaitRequest};
pub use request::{Canceller, LockRequest};
pub use stats::{LockSnapshot, LockStats};
pub use sweeper::{LeaseSweeper, SweepStats};
pub use table::{LockEntry, LockTable};
pub use timeout::Timeout;
