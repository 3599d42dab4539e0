use std::time::Instant;

use tracing::warn;

use super::table::LockEntry;
use super::LockError;

/// Check that `presented` is the current holder of `entry`.
///
/// Matching is exact string equality. A hold whose lease has elapsed at
/// `now` counts as unheld.
pub fn validate<'e>(entry: &'e LockEntry, presented: &str, now: Instant) -> Result<&'e str, LockError> {
    match entry.holder_at(now) {
        None => Err(LockError::NotLocked {
            name: entry.name.clone(),
        }),
        Some(holder) if holder == presented => Ok(holder),
        Some(holder) => {
            warn!(lock = %entry.name, owner = presented, holder, "rejected non-owner");
            Err(LockError::NotOwner {
                name: entry.name.clone(),
                owner: presented.to_string(),
                holder: holder.to_string(),
            })
        }
    }
}
