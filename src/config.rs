//! Lock service settings.
//!
//! ```
//! use named_locks::LockConfig;
//!
//! let config = LockConfig::from_json(r#"{ "defaultLeaseMs": 30000 }"#).unwrap();
//! assert_eq!(config.default_lease_ms, Some(30000));
//! assert_eq!(config.sweep_interval_ms, 100);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LockConfig {
    /// Lease given to every hold unless the caller asks otherwise.
    /// `None` means holds last until unlocked.
    pub default_lease_ms: Option<u64>,
    /// How often a `LeaseSweeper` polls.
    pub sweep_interval_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            default_lease_ms: None,
            sweep_interval_ms: 100,
        }
    }
}

impl LockConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn default_lease(&self) -> Option<Duration> {
        self.default_lease_ms.map(Duration::from_millis)
    }

    /// Poll interval, never shorter than one millisecond.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms.max(1))
    }
}
