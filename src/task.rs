//! Locking server task.
//!
//! The shape a cache platform's remote "locking" script exposes: the caller
//! sends a parameter map and gets back a string.
//!
//! ```json
//! { "op": "lock", "lockName": "realms", "lockOwner": "worker-1", "timeout": 5000 }
//! ```
//!
//! `op` is `"lock"` or `"unlock"`. `timeout` is in milliseconds: `0` tries
//! once, a negative or missing value waits indefinitely. A successful lock
//! answers `"locked"`, a successful unlock `"unlocked"`; everything else is
//! a `TaskError`. Transport is left to the caller.
//!
//! ```
//! use named_locks::{task, InMemoryLockManager};
//! use serde_json::json;
//!
//! let manager = InMemoryLockManager::new();
//! let params = json!({ "op": "lock", "lockName": "realms", "lockOwner": "w1", "timeout": 0 });
//! assert_eq!(task::run(&manager, params).unwrap(), json!("locked"));
//! ```

use std::error::Error;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::lock::{LockError, LockManager, Timeout};

pub const LOCKED: &str = "locked";
pub const UNLOCKED: &str = "unlocked";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockOp {
    Lock,
    Unlock,
}

impl FromStr for LockOp {
    type Err = TaskError;

    fn from_str(op: &str) -> Result<Self, Self::Err> {
        match op {
            "lock" => Ok(LockOp::Lock),
            "unlock" => Ok(LockOp::Unlock),
            other => Err(TaskError::UnknownOp(other.to_string())),
        }
    }
}

/// A decoded locking task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockTask {
    pub op: LockOp,
    pub lock_name: String,
    pub lock_owner: String,
    /// Milliseconds; only meaningful for `lock`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<i64>,
}

/// Wire form, with `op` still a free string so an unknown op can be
/// reported as such rather than as a decode failure.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTask {
    op: String,
    lock_name: String,
    lock_owner: String,
    #[serde(default)]
    timeout: Option<i64>,
}

impl LockTask {
    pub fn lock(name: impl Into<String>, owner: impl Into<String>, timeout_ms: i64) -> Self {
        LockTask {
            op: LockOp::Lock,
            lock_name: name.into(),
            lock_owner: owner.into(),
            timeout: Some(timeout_ms),
        }
    }

    pub fn unlock(name: impl Into<String>, owner: impl Into<String>) -> Self {
        LockTask {
            op: LockOp::Unlock,
            lock_name: name.into(),
            lock_owner: owner.into(),
            timeout: None,
        }
    }

    /// Decode a task from its parameter map.
    pub fn from_params(params: Value) -> Result<Self, TaskError> {
        let raw: RawTask = serde_json::from_value(params)?;
        Ok(LockTask {
            op: raw.op.parse()?,
            lock_name: raw.lock_name,
            lock_owner: raw.lock_owner,
            timeout: raw.timeout,
        })
    }

    pub fn timeout(&self) -> Timeout {
        self.timeout.map(Timeout::from_millis).unwrap_or(Timeout::Never)
    }

    /// Run the task against `manager`.
    pub fn execute<M: LockManager + ?Sized>(&self, manager: &M) -> Result<TaskOutput, TaskError> {
        debug!(op = ?self.op, lock = %self.lock_name, owner = %self.lock_owner, "executing lock task");
        match self.op {
            LockOp::Lock => {
                manager.lock(&self.lock_name, &self.lock_owner, self.timeout())?;
                Ok(TaskOutput::Locked)
            }
            LockOp::Unlock => {
                manager.unlock(&self.lock_name, &self.lock_owner)?;
                Ok(TaskOutput::Unlocked)
            }
        }
    }
}

/// Successful task result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutput {
    Locked,
    Unlocked,
}

impl TaskOutput {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskOutput::Locked => LOCKED,
            TaskOutput::Unlocked => UNLOCKED,
        }
    }
}

impl fmt::Display for TaskOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<TaskOutput> for Value {
    fn from(output: TaskOutput) -> Self {
        Value::String(output.as_str().to_string())
    }
}

/// Decode and execute a parameter map, answering with the JSON string
/// `"locked"` or `"unlocked"`.
pub fn run<M: LockManager + ?Sized>(manager: &M, params: Value) -> Result<Value, TaskError> {
    let task = LockTask::from_params(params)?;
    Ok(task.execute(manager)?.into())
}

/// Error type for locking tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// `op` was neither `lock` nor `unlock`.
    UnknownOp(String),
    /// The parameter map was missing fields or had the wrong types.
    DecodeFailed(String),
    /// The lock operation itself failed.
    Lock(LockError),
}

impl TaskError {
    /// The lock error behind this task error, if any.
    pub fn lock_error(&self) -> Option<&LockError> {
        match self {
            TaskError::Lock(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskError::UnknownOp(op) => write!(f, "unknown lock op: {}", op),
            TaskError::DecodeFailed(msg) => write!(f, "decode failed: {}", msg),
            TaskError::Lock(e) => write!(f, "{}", e),
        }
    }
}

impl Error for TaskError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TaskError::Lock(e) => Some(e),
            _ => None,
        }
    }
}

impl From<LockError> for TaskError {
    fn from(err: LockError) -> Self {
        TaskError::Lock(err)
    }
}

impl From<serde_json::Error> for TaskError {
    fn from(err: serde_json::Error) -> Self {
        TaskError::DecodeFailed(err.to_string())
    }
}
