//! Invite lifecycle: tokenized email invitations with expiry.
//!
//! States: `pending → {accepted, declined, expired, cancelled}`. Tokens are
//! opaque 32-byte hex strings, globally unique by construction plus a unique
//! index in the store. Expiry is inclusive: an invite whose deadline equals
//! the current instant is already expired.

use chrono::Duration;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

/// Default invite lifetime.
pub const DEFAULT_INVITE_TTL_DAYS: i64 = 7;

/// Length of the raw random token in bytes (hex-encoded to 64 chars).
const INVITE_TOKEN_BYTES: usize = 32;

/// Lifecycle status of a collaboration invite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InviteStatus {
    Pending,
    Accepted,
    Declined,
    Expired,
    Cancelled,
}

impl InviteStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            InviteStatus::Pending => "pending",
            InviteStatus::Accepted => "accepted",
            InviteStatus::Declined => "declined",
            InviteStatus::Expired => "expired",
            InviteStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(InviteStatus::Pending),
            "accepted" => Some(InviteStatus::Accepted),
            "declined" => Some(InviteStatus::Declined),
            "expired" => Some(InviteStatus::Expired),
            "cancelled" => Some(InviteStatus::Cancelled),
            _ => None,
        }
    }
}

/// Generate a cryptographically random invite token (64 hex chars).
pub fn generate_invite_token() -> String {
    let mut bytes = [0u8; INVITE_TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    let mut token = String::with_capacity(INVITE_TOKEN_BYTES * 2);
    for b in bytes {
        token.push_str(&format!("{b:02x}"));
    }
    token
}

/// The deadline for an invite created at `now` with the given TTL in days.
pub fn expiry_from(now: Timestamp, ttl_days: i64) -> Timestamp {
    now + Duration::days(ttl_days)
}

/// Inclusive expiry check: `expires_at == now` counts as expired.
pub fn is_expired(expires_at: Timestamp, now: Timestamp) -> bool {
    expires_at <= now
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn token_is_64_hex_chars() {
        let token = generate_invite_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn tokens_are_unique() {
        // Collisions in 256 bits would be astonishing.
        let a = generate_invite_token();
        let b = generate_invite_token();
        assert_ne!(a, b);
    }

    #[test]
    fn expiry_boundary_is_inclusive() {
        let now = Utc::now();
        assert!(is_expired(now, now));
        assert!(is_expired(now - Duration::seconds(1), now));
        assert!(!is_expired(now + Duration::seconds(1), now));
    }

    #[test]
    fn default_ttl_is_seven_days() {
        let now = Utc::now();
        let deadline = expiry_from(now, DEFAULT_INVITE_TTL_DAYS);
        assert_eq!(deadline - now, Duration::days(7));
    }

    #[test]
    fn status_round_trips_through_strings() {
        for s in [
            InviteStatus::Pending,
            InviteStatus::Accepted,
            InviteStatus::Declined,
            InviteStatus::Expired,
            InviteStatus::Cancelled,
        ] {
            assert_eq!(InviteStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(InviteStatus::parse("revoked"), None);
    }
}
