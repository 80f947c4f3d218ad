//! Advisory content-lock semantics.
//!
//! Locks are cooperative, time-boxed, whole-document claims. Expiry is lazy:
//! a lock whose deadline has passed is treated as absent everywhere it is
//! read, and the next acquirer silently reclaims it (the previous holder is
//! notified of the involuntary release). Coarse advisory locking avoids
//! field-level merge complexity while still preventing last-write-wins
//! collisions on whole documents.

use serde::Serialize;

use crate::error::{CoreError, CoreResult};
use crate::types::{DbId, Timestamp};

/// Default lock lifetime in seconds when the caller does not specify one.
pub const DEFAULT_LOCK_TTL_SECS: i64 = 300;

/// Minimum caller-specified lock lifetime in seconds.
pub const MIN_LOCK_TTL_SECS: i64 = 10;

/// Maximum caller-specified lock lifetime in seconds (30 minutes).
pub const MAX_LOCK_TTL_SECS: i64 = 1800;

/// Effective lock state of a content item at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "state")]
pub enum LockState {
    Unlocked,
    Held { user_id: DbId, until: Timestamp },
}

impl LockState {
    /// Evaluate the stored lock fields at `now`. A missing holder, a missing
    /// deadline, or a past deadline all mean "unlocked".
    pub fn evaluate(
        locked_by: Option<DbId>,
        lock_expiry: Option<Timestamp>,
        now: Timestamp,
    ) -> Self {
        match (locked_by, lock_expiry) {
            (Some(user_id), Some(until)) if until > now => LockState::Held { user_id, until },
            _ => LockState::Unlocked,
        }
    }

    /// The live holder, if any.
    pub fn holder(self) -> Option<DbId> {
        match self {
            LockState::Held { user_id, .. } => Some(user_id),
            LockState::Unlocked => None,
        }
    }
}

/// Validate a caller-specified TTL in seconds against the configured bounds.
pub fn validate_ttl(ttl_secs: i64) -> CoreResult<()> {
    if ttl_secs < MIN_LOCK_TTL_SECS {
        return Err(CoreError::Validation(format!(
            "Lock TTL must be at least {MIN_LOCK_TTL_SECS} seconds, got {ttl_secs}"
        )));
    }
    if ttl_secs > MAX_LOCK_TTL_SECS {
        return Err(CoreError::Validation(format!(
            "Lock TTL must be at most {MAX_LOCK_TTL_SECS} seconds, got {ttl_secs}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn missing_fields_mean_unlocked() {
        let now = Utc::now();
        assert_eq!(LockState::evaluate(None, None, now), LockState::Unlocked);
        assert_eq!(LockState::evaluate(Some(1), None, now), LockState::Unlocked);
        assert_eq!(
            LockState::evaluate(None, Some(now + Duration::seconds(60)), now),
            LockState::Unlocked
        );
    }

    #[test]
    fn live_lock_is_held() {
        let now = Utc::now();
        let until = now + Duration::seconds(60);
        assert_eq!(
            LockState::evaluate(Some(7), Some(until), now),
            LockState::Held { user_id: 7, until }
        );
    }

    #[test]
    fn past_expiry_is_equivalent_to_unlocked() {
        let now = Utc::now();
        assert_eq!(
            LockState::evaluate(Some(7), Some(now - Duration::seconds(1)), now),
            LockState::Unlocked
        );
        // The exact deadline instant is already reclaimable.
        assert_eq!(LockState::evaluate(Some(7), Some(now), now), LockState::Unlocked);
    }

    #[test]
    fn ttl_bounds() {
        assert!(validate_ttl(DEFAULT_LOCK_TTL_SECS).is_ok());
        assert!(validate_ttl(MIN_LOCK_TTL_SECS).is_ok());
        assert!(validate_ttl(MAX_LOCK_TTL_SECS).is_ok());
        assert!(validate_ttl(MIN_LOCK_TTL_SECS - 1).is_err());
        assert!(validate_ttl(MAX_LOCK_TTL_SECS + 1).is_err());
    }
}
