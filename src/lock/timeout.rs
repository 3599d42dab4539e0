use std::time::{Duration, Instant};

/// How long a `lock` call may wait for the lock to become available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Timeout {
    /// Try exactly once and fail fast if the lock is held. Never queues.
    Immediate,
    /// Wait up to the given duration.
    After(Duration),
    /// Wait until granted or cancelled.
    #[default]
    Never,
}

impl Timeout {
    /// Build a timeout from wire-level milliseconds.
    ///
    /// `0` is immediate, a negative value waits indefinitely.
    pub fn from_millis(millis: i64) -> Self {
        match millis {
            m if m < 0 => Timeout::Never,
            0 => Timeout::Immediate,
            m => Timeout::After(Duration::from_millis(m as u64)),
        }
    }

    /// Absolute deadline for a request made at `now`.
    ///
    /// `None` means no deadline. An `After` that overflows `Instant` is
    /// treated as no deadline.
    pub fn deadline_from(&self, now: Instant) -> Option<Instant> {
        match self {
            Timeout::Immediate => Some(now),
            Timeout::After(duration) => now.checked_add(*duration),
            Timeout::Never => None,
        }
    }

    pub fn is_immediate(&self) -> bool {
        matches!(self, Timeout::Immediate)
    }
}

impl From<Duration> for Timeout {
    fn from(duration: Duration) -> Self {
        if duration.is_zero() {
            Timeout::Immediate
        } else {
            Timeout::After(duration)
        }
    }
}

impl From<Option<Duration>> for Timeout {
    fn from(duration: Option<Duration>) -> Self {
        duration.map(Timeout::from).unwrap_or(Timeout::Never)
    }
}
