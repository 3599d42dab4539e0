//! Background lease sweeper.
//!
//! Leases and wait deadlines are enforced lazily by the callers that touch a
//! lock. This thread makes expiry prompt for locks nobody touches: every
//! poll interval it clears elapsed leases (handing each lock to its next
//! waiter) and drops wait requests whose deadline passed.

use std::sync::mpsc::{channel, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{info, warn};

use super::in_memory::InMemoryLockManager;
use crate::config::LockConfig;

/// Statistics from the sweeper thread.
#[derive(Debug, Default, Clone)]
pub struct SweepStats {
    pub sweeps: usize,
    pub leases_expired: usize,
    pub requests_expired: usize,
    pub errors: usize,
}

/// A background thread that sweeps an `InMemoryLockManager`.
///
/// ## Example
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use named_locks::{InMemoryLockManager, LeaseSweeper};
///
/// let manager = Arc::new(InMemoryLockManager::new().with_default_lease(Duration::from_secs(30)));
/// let sweeper = LeaseSweeper::spawn(Arc::clone(&manager), Duration::from_millis(100));
///
/// // ... lock and unlock ...
///
/// let stats = sweeper.stop();
/// assert_eq!(stats.errors, 0);
/// ```
pub struct LeaseSweeper {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<SweepStats>>,
}

impl LeaseSweeper {
    /// Spawn a sweeper polling every `poll_interval`.
    pub fn spawn(manager: Arc<InMemoryLockManager>, poll_interval: Duration) -> Self {
        let (stop_tx, stop_rx) = channel();

        let handle = thread::spawn(move || {
            info!(interval_ms = poll_interval.as_millis() as u64, "lease sweeper started");
            let mut stats = SweepStats::default();

            loop {
                match stop_rx.recv_timeout(poll_interval) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {}
                }

                stats.sweeps += 1;
                match manager.sweep() {
                    Ok(report) => {
                        stats.leases_expired += report.leases_expired;
                        stats.requests_expired += report.requests_expired;
                    }
                    Err(err) => {
                        // One poisoned lock must not stop the sweeps of the others.
                        warn!(error = %err, "lease sweep failed");
                        stats.errors += 1;
                    }
                }
            }

            info!(sweeps = stats.sweeps, "lease sweeper stopped");
            stats
        });

        Self {
            stop_tx,
            handle: Some(handle),
        }
    }

    /// Spawn a sweeper with the configured poll interval.
    pub fn from_config(manager: Arc<InMemoryLockManager>, config: &LockConfig) -> Self {
        Self::spawn(manager, config.sweep_interval())
    }

    /// Signal the sweeper to stop and wait for it to finish.
    /// Returns the sweeper statistics; a sweeper that panicked reports one
    /// error and nothing else.
    pub fn stop(mut self) -> SweepStats {
        let _ = self.stop_tx.send(());
        self.handle.take().map(join_sweeper).unwrap_or_default()
    }

    /// Signal the sweeper to stop without waiting.
    pub fn signal_stop(&self) {
        let _ = self.stop_tx.send(());
    }
}

impl Drop for LeaseSweeper {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
    }
}

fn join_sweeper(handle: JoinHandle<SweepStats>) -> SweepStats {
    handle.join().unwrap_or_else(|_| {
        warn!("lease sweeper thread panicked");
        SweepStats {
            errors: 1,
            ..SweepStats::default()
        }
    })
}
