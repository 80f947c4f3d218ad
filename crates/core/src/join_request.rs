//! Join-request lifecycle for spaces that require approval to join.
//!
//! States: `pending → {approved, rejected}`. Uniqueness is enforced on
//! pending rows only; creating a new request purges the pair's stale
//! terminal rows, so a user may re-request after leaving or being rejected.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::permissions::Permission;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinRequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl JoinRequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JoinRequestStatus::Pending => "pending",
            JoinRequestStatus::Approved => "approved",
            JoinRequestStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JoinRequestStatus::Pending),
            "approved" => Some(JoinRequestStatus::Approved),
            "rejected" => Some(JoinRequestStatus::Rejected),
            _ => None,
        }
    }
}

/// Join requests may only ask for `view` or `edit`; admin is granted, never
/// requested.
pub fn validate_requested_permission(permission: Permission) -> CoreResult<()> {
    match permission {
        Permission::View | Permission::Edit => Ok(()),
        Permission::Admin => Err(CoreError::Validation(
            "Join requests may only ask for view or edit permission".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_cannot_be_requested() {
        assert!(validate_requested_permission(Permission::View).is_ok());
        assert!(validate_requested_permission(Permission::Edit).is_ok());
        assert!(validate_requested_permission(Permission::Admin).is_err());
    }

    #[test]
    fn status_round_trips_through_strings() {
        for s in [
            JoinRequestStatus::Pending,
            JoinRequestStatus::Approved,
            JoinRequestStatus::Rejected,
        ] {
            assert_eq!(JoinRequestStatus::parse(s.as_str()), Some(s));
        }
    }
}
