use std::fmt;

/// Error type for lock operations.
///
/// Every expected condition of the lock protocol is a variant here; callers
/// get an explicit outcome instead of a panic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    /// The acquisition deadline elapsed before the lock was granted.
    /// Recoverable: the caller may retry.
    TimedOut { name: String, owner: String },
    /// Unlock or renew was attempted by someone other than the holder.
    NotOwner {
        name: String,
        owner: String,
        holder: String,
    },
    /// Unlock or renew was attempted on a lock that nobody holds.
    NotLocked { name: String },
    /// A pending acquisition was cancelled before it resolved.
    Cancelled { name: String, owner: String },
    /// A per-lock mutex was poisoned (a thread panicked while holding it).
    /// Only the named lock is affected.
    Poisoned(String),
}

impl LockError {
    /// Whether the caller may reasonably retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LockError::TimedOut { .. })
    }

    /// The lock name the error refers to, if any.
    pub fn lock_name(&self) -> Option<&str> {
        match self {
            LockError::TimedOut { name, .. }
            | LockError::NotOwner { name, .. }
            | LockError::NotLocked { name }
            | LockError::Cancelled { name, .. } => Some(name),
            LockError::Poisoned(_) => None,
        }
    }
}

impl fmt::Display for LockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockError::TimedOut { name, owner } => {
                write!(f, "timed out acquiring lock {} for {}", name, owner)
            }
            LockError::NotOwner {
                name,
                owner,
                holder,
            } => write!(
                f,
                "lock {} is held by {}, not by {}",
                name, holder, owner
            ),
            LockError::NotLocked { name } => write!(f, "lock {} is not locked", name),
            LockError::Cancelled { name, owner } => {
                write!(f, "acquisition of lock {} by {} was cancelled", name, owner)
            }
            LockError::Poisoned(msg) => write!(f, "lock poisoned: {}", msg),
        }
    }
}

impl std::error::Error for LockError {}
