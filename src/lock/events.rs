//! Lock lifecycle notifications.
//!
//! With the `emitter` feature, `LockEvents` forwards each `LockEvent` to
//! in-process listeners through an `EventEmitter`. Payloads travel as JSON
//! strings, and listeners run on the emitter's own threads, so they observe
//! events shortly after the fact rather than inline.

use serde::{Deserialize, Serialize};

#[cfg(feature = "emitter")]
use std::sync::Mutex;

#[cfg(feature = "emitter")]
use event_emitter_rs::EventEmitter;
#[cfg(feature = "emitter")]
use tracing::warn;

pub const ACQUIRED: &str = "lock.acquired";
pub const RELEASED: &str = "lock.released";
pub const EXPIRED: &str = "lock.expired";
pub const TIMED_OUT: &str = "lock.timed_out";
pub const CANCELLED: &str = "lock.cancelled";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LockEvent {
    Acquired { name: String, owner: String },
    Released { name: String, owner: String },
    /// The holder's lease elapsed and the hold was cleared.
    Expired { name: String, owner: String },
    TimedOut { name: String, owner: String },
    Cancelled { name: String, owner: String },
}

impl LockEvent {
    /// Event name listeners subscribe to.
    pub fn kind(&self) -> &'static str {
        match self {
            LockEvent::Acquired { .. } => ACQUIRED,
            LockEvent::Released { .. } => RELEASED,
            LockEvent::Expired { .. } => EXPIRED,
            LockEvent::TimedOut { .. } => TIMED_OUT,
            LockEvent::Cancelled { .. } => CANCELLED,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            LockEvent::Acquired { name, .. }
            | LockEvent::Released { name, .. }
            | LockEvent::Expired { name, .. }
            | LockEvent::TimedOut { name, .. }
            | LockEvent::Cancelled { name, .. } => name,
        }
    }

    pub fn owner(&self) -> &str {
        match self {
            LockEvent::Acquired { owner, .. }
            | LockEvent::Released { owner, .. }
            | LockEvent::Expired { owner, .. }
            | LockEvent::TimedOut { owner, .. }
            | LockEvent::Cancelled { owner, .. } => owner,
        }
    }
}

/// Listener registry for `LockEvent`s.
#[cfg(feature = "emitter")]
pub struct LockEvents {
    emitter: Mutex<EventEmitter>,
}

#[cfg(feature = "emitter")]
impl LockEvents {
    pub fn new() -> Self {
        LockEvents {
            emitter: Mutex::new(EventEmitter::new()),
        }
    }

    /// Register a listener for one event kind (e.g. `events::RELEASED`).
    ///
    /// Returns the listener id, or `None` if the registry is poisoned.
    pub fn on<F>(&self, kind: &str, listener: F) -> Option<String>
    where
        F: Fn(LockEvent) + Send + Sync + 'static,
    {
        let mut emitter = self.emitter.lock().ok()?;
        Some(emitter.on(kind, move |payload: String| {
            match serde_json::from_str::<LockEvent>(&payload) {
                Ok(event) => listener(event),
                Err(err) => warn!(error = %err, "undecodable lock event"),
            }
        }))
    }

    pub(crate) fn emit(&self, event: &LockEvent) {
        let payload = match serde_json::to_string(event) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "failed to encode lock event");
                return;
            }
        };
        match self.emitter.lock() {
            Ok(mut emitter) => {
                emitter.emit(event.kind(), payload);
            }
            Err(_) => warn!(kind = event.kind(), "lock event emitter poisoned"),
        }
    }
}

#[cfg(feature = "emitter")]
impl Default for LockEvents {
    fn default() -> Self {
        Self::new()
    }
}
