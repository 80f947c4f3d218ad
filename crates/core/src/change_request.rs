//! Change-request state machine: propose → review → apply.
//!
//! Reachable transitions: `pending → {approved, rejected, cancelled}` and
//! `approved → applied`. Applied, rejected, and cancelled are terminal.
//! The repository layer enforces each transition with a conditional update
//! guarded on the expected current status, so two racing reviews cannot
//! both succeed; this module decides which transitions and reviewers are
//! legal in the first place.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::permissions::{is_allowed, SpaceAction, SpaceSnapshot};
use crate::types::DbId;

/// Lifecycle status of a change request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeRequestStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
    Applied,
}

impl ChangeRequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeRequestStatus::Pending => "pending",
            ChangeRequestStatus::Approved => "approved",
            ChangeRequestStatus::Rejected => "rejected",
            ChangeRequestStatus::Cancelled => "cancelled",
            ChangeRequestStatus::Applied => "applied",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ChangeRequestStatus::Pending),
            "approved" => Some(ChangeRequestStatus::Approved),
            "rejected" => Some(ChangeRequestStatus::Rejected),
            "cancelled" => Some(ChangeRequestStatus::Cancelled),
            "applied" => Some(ChangeRequestStatus::Applied),
            _ => None,
        }
    }

    /// Whether `self → to` is a legal transition.
    pub fn can_transition(self, to: ChangeRequestStatus) -> bool {
        use ChangeRequestStatus::*;
        matches!(
            (self, to),
            (Pending, Approved) | (Pending, Rejected) | (Pending, Cancelled) | (Approved, Applied)
        )
    }

    /// Applied, rejected, and cancelled requests are immutable history.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ChangeRequestStatus::Applied
                | ChangeRequestStatus::Rejected
                | ChangeRequestStatus::Cancelled
        )
    }
}

/// A reviewer's verdict on a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
    Approved,
    Rejected,
}

impl ReviewDecision {
    pub fn as_status(self) -> ChangeRequestStatus {
        match self {
            ReviewDecision::Approved => ChangeRequestStatus::Approved,
            ReviewDecision::Rejected => ChangeRequestStatus::Rejected,
        }
    }
}

/// Guard for `review(request, reviewer, ...)`.
///
/// The reviewer needs `approve_changes`, and may never review their own
/// request unless they are the space owner. Admins do not get the
/// self-review exemption.
pub fn ensure_reviewer_allowed(
    space: &SpaceSnapshot,
    requested_by: DbId,
    reviewer: DbId,
) -> CoreResult<()> {
    if !is_allowed(space, reviewer, SpaceAction::ApproveChanges) {
        return Err(CoreError::PermissionDenied(
            "You cannot review change requests in this space".into(),
        ));
    }
    if reviewer == requested_by && reviewer != space.owner_id {
        return Err(CoreError::PermissionDenied(
            "You cannot review your own change request".into(),
        ));
    }
    Ok(())
}

/// Guard for `cancel/delete(request, actor)`: requester or admin, and only
/// while the request is pending or rejected.
pub fn ensure_can_cancel(
    space: &SpaceSnapshot,
    requested_by: DbId,
    status: ChangeRequestStatus,
    actor: DbId,
) -> CoreResult<()> {
    if actor != requested_by && !is_allowed(space, actor, SpaceAction::ApproveChanges) {
        return Err(CoreError::PermissionDenied(
            "Only the requester or an admin can delete this change request".into(),
        ));
    }
    match status {
        ChangeRequestStatus::Pending | ChangeRequestStatus::Rejected => Ok(()),
        other => Err(CoreError::InvalidState(format!(
            "Cannot delete a change request in status '{}'",
            other.as_str()
        ))),
    }
}

/// Visibility rule for listing/fetching: admins see everything, others see
/// only requests they created or reviewed.
pub fn can_view_request(
    space: &SpaceSnapshot,
    requested_by: DbId,
    reviewed_by: Option<DbId>,
    viewer: DbId,
) -> bool {
    is_allowed(space, viewer, SpaceAction::ApproveChanges)
        || requested_by == viewer
        || reviewed_by == Some(viewer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::membership::CollaboratorStatus;
    use crate::permissions::{CollaboratorEntry, Permission, Privacy};
    use assert_matches::assert_matches;
    use ChangeRequestStatus::*;

    const OWNER: DbId = 1;
    const ADMIN: DbId = 2;
    const EDITOR: DbId = 3;
    const VIEWER: DbId = 4;

    fn space() -> SpaceSnapshot {
        SpaceSnapshot::new(
            1,
            OWNER,
            Privacy::Private,
            vec![
                CollaboratorEntry {
                    user_id: ADMIN,
                    permission: Permission::Admin,
                    status: CollaboratorStatus::Active,
                },
                CollaboratorEntry {
                    user_id: EDITOR,
                    permission: Permission::Edit,
                    status: CollaboratorStatus::Active,
                },
                CollaboratorEntry {
                    user_id: VIEWER,
                    permission: Permission::View,
                    status: CollaboratorStatus::Active,
                },
            ],
        )
    }

    #[test]
    fn only_documented_transitions_are_reachable() {
        let all = [Pending, Approved, Rejected, Cancelled, Applied];
        for from in all {
            for to in all {
                let legal = matches!(
                    (from, to),
                    (Pending, Approved)
                        | (Pending, Rejected)
                        | (Pending, Cancelled)
                        | (Approved, Applied)
                );
                assert_eq!(from.can_transition(to), legal, "{from:?} -> {to:?}");
            }
        }
    }

    #[test]
    fn terminal_states() {
        assert!(Applied.is_terminal());
        assert!(Rejected.is_terminal());
        assert!(Cancelled.is_terminal());
        assert!(!Pending.is_terminal());
        assert!(!Approved.is_terminal());
    }

    #[test]
    fn admin_may_review_others_requests() {
        assert!(ensure_reviewer_allowed(&space(), EDITOR, ADMIN).is_ok());
    }

    #[test]
    fn viewer_may_not_review() {
        assert_matches!(
            ensure_reviewer_allowed(&space(), EDITOR, VIEWER),
            Err(CoreError::PermissionDenied(_))
        );
    }

    #[test]
    fn admin_self_review_is_denied() {
        assert_matches!(
            ensure_reviewer_allowed(&space(), ADMIN, ADMIN),
            Err(CoreError::PermissionDenied(_))
        );
    }

    #[test]
    fn owner_self_review_is_allowed() {
        assert!(ensure_reviewer_allowed(&space(), OWNER, OWNER).is_ok());
    }

    #[test]
    fn requester_may_cancel_while_pending_or_rejected() {
        let s = space();
        assert!(ensure_can_cancel(&s, EDITOR, Pending, EDITOR).is_ok());
        assert!(ensure_can_cancel(&s, EDITOR, Rejected, EDITOR).is_ok());
    }

    #[test]
    fn approved_and_applied_are_immutable_history() {
        let s = space();
        assert_matches!(
            ensure_can_cancel(&s, EDITOR, Approved, EDITOR),
            Err(CoreError::InvalidState(_))
        );
        assert_matches!(
            ensure_can_cancel(&s, EDITOR, Applied, ADMIN),
            Err(CoreError::InvalidState(_))
        );
    }

    #[test]
    fn unrelated_collaborator_may_not_cancel() {
        assert_matches!(
            ensure_can_cancel(&space(), EDITOR, Pending, VIEWER),
            Err(CoreError::PermissionDenied(_))
        );
    }

    #[test]
    fn visibility_is_admin_or_participant() {
        let s = space();
        assert!(can_view_request(&s, EDITOR, None, ADMIN));
        assert!(can_view_request(&s, EDITOR, None, EDITOR));
        assert!(can_view_request(&s, EDITOR, Some(VIEWER), VIEWER));
        assert!(!can_view_request(&s, EDITOR, None, VIEWER));
    }
}
