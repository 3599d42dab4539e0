//! Wait queue manager: per-lock FIFO lines of pending acquisitions.
//!
//! A `WaitRequest` carries a fulfil-once result slot. Whoever resolves it
//! first wins: the hand-off (granted), the waiter itself or the sweeper
//! (timed out), or a canceller. Losers of that race observe `false` from
//! `resolve` and back out.
//!
//! Lock order is line mutex, then lock-table entry mutex. The table never
//! calls back into the queue.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use super::table::LockTable;
use super::{LockError, Timeout};

/// How a wait request was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Granted,
    TimedOut,
    Cancelled,
}

/// A pending acquisition of one named lock.
#[derive(Debug)]
pub struct WaitRequest {
    id: u64,
    lock_name: String,
    owner: String,
    deadline: Option<Instant>,
    lease: Option<Duration>,
    enqueued_at: Instant,
    slot: Mutex<Option<WaitOutcome>>,
    wake: Condvar,
}

impl WaitRequest {
    pub fn new(
        id: u64,
        lock_name: impl Into<String>,
        owner: impl Into<String>,
        deadline: Option<Instant>,
        lease: Option<Duration>,
    ) -> Self {
        WaitRequest {
            id,
            lock_name: lock_name.into(),
            owner: owner.into(),
            deadline,
            lease,
            enqueued_at: Instant::now(),
            slot: Mutex::new(None),
            wake: Condvar::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn lock_name(&self) -> &str {
        &self.lock_name
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn lease(&self) -> Option<Duration> {
        self.lease
    }

    pub fn enqueued_at(&self) -> Instant {
        self.enqueued_at
    }

    /// Fulfil the result slot. Returns `false` if it was already resolved.
    pub fn resolve(&self, outcome: WaitOutcome) -> Result<bool, LockError> {
        let mut slot = self.slot()?;
        if slot.is_some() {
            return Ok(false);
        }
        *slot = Some(outcome);
        self.wake.notify_all();
        Ok(true)
    }

    /// The outcome, if resolved.
    pub fn outcome(&self) -> Result<Option<WaitOutcome>, LockError> {
        Ok(*self.slot()?)
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.outcome(), Ok(Some(_)) | Err(_))
    }

    /// Park until the request is resolved or its deadline passes.
    ///
    /// Reaching the deadline resolves the request as timed out, unless a
    /// grant got there first.
    pub fn wait(&self) -> Result<WaitOutcome, LockError> {
        loop {
            if let Some(outcome) = self.wait_for(None)? {
                return Ok(outcome);
            }
        }
    }

    /// Like `wait`, but also wake at `wake_at` if it comes first.
    ///
    /// Returns `None` when woken at `wake_at` with the request still
    /// unresolved. `wake_at` is checked before the deadline, so a caller
    /// woken at both gets one more chance to be served.
    pub fn wait_for(&self, wake_at: Option<Instant>) -> Result<Option<WaitOutcome>, LockError> {
        let mut slot = self.slot()?;
        loop {
            if let Some(outcome) = *slot {
                return Ok(Some(outcome));
            }
            let now = Instant::now();
            if matches!(wake_at, Some(at) if now >= at) {
                return Ok(None);
            }
            if self.is_expired_at(now) {
                *slot = Some(WaitOutcome::TimedOut);
                return Ok(Some(WaitOutcome::TimedOut));
            }

            let until = match (self.deadline, wake_at) {
                (Some(deadline), Some(at)) => Some(deadline.min(at)),
                (deadline, at) => deadline.or(at),
            };
            slot = match until {
                None => self.wake.wait(slot).map_err(|_| self.poisoned())?,
                Some(until) => self
                    .wake
                    .wait_timeout(slot, until - now)
                    .map_err(|_| self.poisoned())?
                    .0,
            };
        }
    }

    fn is_expired_at(&self, now: Instant) -> bool {
        matches!(self.deadline, Some(deadline) if now >= deadline)
    }

    fn slot(&self) -> Result<MutexGuard<'_, Option<WaitOutcome>>, LockError> {
        self.slot.lock().map_err(|_| self.poisoned())
    }

    fn poisoned(&self) -> LockError {
        LockError::Poisoned(format!("wait request {} on {}", self.id, self.lock_name))
    }
}

/// Result of admitting a `lock` call.
#[derive(Debug)]
pub enum Admission {
    /// The lock was free and nobody was queued; it now belongs to the caller.
    Granted,
    /// The caller is queued behind the current holder and earlier waiters.
    Queued(Arc<WaitRequest>),
    /// The lock was busy and the timeout was immediate.
    Busy,
}

type Line = VecDeque<Arc<WaitRequest>>;

/// Per-lock FIFO queues of pending acquisitions.
pub struct WaitQueue {
    lines: Mutex<HashMap<String, Arc<Mutex<Line>>>>,
    next_id: AtomicU64,
}

impl WaitQueue {
    pub fn new() -> Self {
        WaitQueue {
            lines: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Admit a `lock` call: grant immediately, queue it, or report busy.
    ///
    /// The fast path is only taken when no live waiter is queued for the
    /// name, so newcomers never overtake earlier waiters. If the lock turns
    /// out to be free while waiters are queued (an elapsed lease, or a
    /// waiter that timed out at the head), the head is served first.
    pub fn admit(
        &self,
        table: &LockTable,
        name: &str,
        owner: &str,
        timeout: Timeout,
        lease: Option<Duration>,
    ) -> Result<Admission, LockError> {
        let line = self.line(name)?;
        let mut waiters = lock_line(name, &line)?;

        waiters.retain(|request| !request.is_resolved());
        if !waiters.is_empty() {
            serve_head(&mut waiters, table, name)?;
        }

        if waiters.is_empty() && table.try_acquire(name, owner, lease)? {
            return Ok(Admission::Granted);
        }
        if timeout.is_immediate() {
            return Ok(Admission::Busy);
        }

        let request = Arc::new(WaitRequest::new(
            self.next_id(),
            name,
            owner,
            timeout.deadline_from(Instant::now()),
            lease,
        ));
        trace!(lock = name, owner, id = request.id, waiting = waiters.len(), "queued");
        waiters.push_back(Arc::clone(&request));
        Ok(Admission::Queued(request))
    }

    /// Append an already-built request to the tail of its lock's line.
    pub fn enqueue(&self, request: WaitRequest) -> Result<Arc<WaitRequest>, LockError> {
        let request = Arc::new(request);
        let line = self.line(&request.lock_name)?;
        lock_line(&request.lock_name, &line)?.push_back(Arc::clone(&request));
        Ok(request)
    }

    /// Allocate the next request id.
    pub fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Hand a just-released lock to the first live waiter.
    ///
    /// Returns the request that was granted, if any.
    pub fn hand_off(
        &self,
        name: &str,
        table: &LockTable,
    ) -> Result<Option<Arc<WaitRequest>>, LockError> {
        let Some(line) = self.existing(name)? else {
            return Ok(None);
        };
        let mut waiters = lock_line(name, &line)?;
        serve_head(&mut waiters, table, name)
    }

    /// Remove a request from its line. Returns `false` if it was not queued.
    pub fn remove(&self, name: &str, id: u64) -> Result<bool, LockError> {
        let Some(line) = self.existing(name)? else {
            return Ok(false);
        };
        let mut waiters = lock_line(name, &line)?;
        let before = waiters.len();
        waiters.retain(|request| request.id != id);
        Ok(waiters.len() != before)
    }

    /// Resolve and drop every request whose deadline passed at `now`.
    pub fn expire(&self, now: Instant) -> Result<Vec<Arc<WaitRequest>>, LockError> {
        let lines: Vec<(String, Arc<Mutex<Line>>)> = self
            .map()?
            .iter()
            .map(|(name, line)| (name.clone(), Arc::clone(line)))
            .collect();

        let mut expired = Vec::new();
        for (name, line) in lines {
            let Ok(mut waiters) = lock_line(&name, &line) else {
                continue;
            };
            let mut kept = VecDeque::with_capacity(waiters.len());
            for request in waiters.drain(..) {
                if request.is_expired_at(now) {
                    if matches!(request.resolve(WaitOutcome::TimedOut), Ok(true)) {
                        expired.push(request);
                    }
                } else if !request.is_resolved() {
                    kept.push_back(request);
                }
            }
            *waiters = kept;
        }
        Ok(expired)
    }

    /// Owners of the live requests queued on `name`, head first.
    pub fn waiting(&self, name: &str) -> Result<Vec<String>, LockError> {
        let Some(line) = self.existing(name)? else {
            return Ok(Vec::new());
        };
        let waiters = lock_line(name, &line)?;
        Ok(waiters
            .iter()
            .filter(|request| !request.is_resolved())
            .map(|request| request.owner.clone())
            .collect())
    }

    /// Number of live requests queued on `name`.
    pub fn len(&self, name: &str) -> Result<usize, LockError> {
        Ok(self.waiting(name)?.len())
    }

    /// Drop the line for `name` if it is empty and nobody else is using it.
    ///
    /// Returns `true` when no line for `name` remains.
    pub fn reclaim(&self, name: &str) -> Result<bool, LockError> {
        let mut map = self.map()?;
        let unused = match map.get(name) {
            None => return Ok(true),
            Some(line) if Arc::strong_count(line) == 1 => line
                .lock()
                .map(|waiters| waiters.is_empty())
                .unwrap_or(false),
            _ => false,
        };
        if unused {
            map.remove(name);
        }
        Ok(unused)
    }

    fn map(&self) -> Result<MutexGuard<'_, HashMap<String, Arc<Mutex<Line>>>>, LockError> {
        self.lines
            .lock()
            .map_err(|_| LockError::Poisoned("wait queue map".into()))
    }

    fn line(&self, name: &str) -> Result<Arc<Mutex<Line>>, LockError> {
        let mut map = self.map()?;
        Ok(map.entry(name.to_string()).or_default().clone())
    }

    fn existing(&self, name: &str) -> Result<Option<Arc<Mutex<Line>>>, LockError> {
        Ok(self.map()?.get(name).cloned())
    }
}

impl Default for WaitQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Grant the lock to the first live waiter in `waiters`, if it is free.
///
/// A waiter that resolved itself (timeout or cancel) between the grant and
/// our `resolve` gets the lock taken back, and the next waiter is tried.
fn serve_head(
    waiters: &mut Line,
    table: &LockTable,
    name: &str,
) -> Result<Option<Arc<WaitRequest>>, LockError> {
    while let Some(head) = waiters.front() {
        if head.is_resolved() {
            waiters.pop_front();
            continue;
        }
        if !table.try_acquire(name, &head.owner, head.lease)? {
            return Ok(None);
        }

        let Some(head) = waiters.pop_front() else {
            break;
        };
        if head.resolve(WaitOutcome::Granted)? {
            debug!(
                lock = name,
                owner = %head.owner,
                id = head.id,
                waited_ms = head.enqueued_at.elapsed().as_millis() as u64,
                "handed off"
            );
            return Ok(Some(head));
        }
        table.release(name, &head.owner)?;
    }
    Ok(None)
}

fn lock_line<'a>(name: &str, line: &'a Mutex<Line>) -> Result<MutexGuard<'a, Line>, LockError> {
    line.lock().map_err(|_| {
        warn!(lock = name, "wait line poisoned");
        LockError::Poisoned(format!("wait line {}", name))
    })
}
