//! Membership lifecycle rules: collaborator status and the pure guards for
//! permission changes and removal.
//!
//! The store enforces the structural invariants (at most one active record
//! per user, stats recomputed in the mutating transaction); this module
//! decides *who may do what* to a membership record.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::permissions::{is_allowed, SpaceAction, SpaceSnapshot};
use crate::types::DbId;

/// Lifecycle status of a collaborator record.
///
/// Removal soft-transitions to `Inactive`; records are never deleted so the
/// membership history survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollaboratorStatus {
    Pending,
    Active,
    Inactive,
}

impl CollaboratorStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CollaboratorStatus::Pending => "pending",
            CollaboratorStatus::Active => "active",
            CollaboratorStatus::Inactive => "inactive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(CollaboratorStatus::Pending),
            "active" => Some(CollaboratorStatus::Active),
            "inactive" => Some(CollaboratorStatus::Inactive),
            _ => None,
        }
    }
}

/// Guard for `update_permission(target, new, actor)`.
///
/// Requires `manage_permissions`; the owner's implicit admin grade can never
/// be altered.
pub fn ensure_can_update_permission(
    space: &SpaceSnapshot,
    actor: DbId,
    target: DbId,
) -> CoreResult<()> {
    if !is_allowed(space, actor, SpaceAction::ManagePermissions) {
        return Err(CoreError::PermissionDenied(
            "Only owners and admins can update permissions".into(),
        ));
    }
    if target == space.owner_id {
        return Err(CoreError::PermissionDenied(
            "Cannot change owner permissions".into(),
        ));
    }
    Ok(())
}

/// Guard for `remove(target, actor)`.
///
/// Allowed for the collaborator themselves, an admin, or the owner; the
/// owner can never be removed.
pub fn ensure_can_remove(space: &SpaceSnapshot, actor: DbId, target: DbId) -> CoreResult<()> {
    if target == space.owner_id {
        return Err(CoreError::PermissionDenied("Cannot remove space owner".into()));
    }
    if actor == target || is_allowed(space, actor, SpaceAction::ManagePermissions) {
        return Ok(());
    }
    Err(CoreError::PermissionDenied(
        "Only owners, admins, or the collaborator themselves can remove access".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::{CollaboratorEntry, Permission, Privacy};
    use assert_matches::assert_matches;

    const OWNER: DbId = 1;
    const ADMIN: DbId = 2;
    const EDITOR: DbId = 3;

    fn space() -> SpaceSnapshot {
        SpaceSnapshot::new(
            7,
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
            ],
        )
    }

    #[test]
    fn admin_and_owner_may_update_permissions() {
        let s = space();
        assert!(ensure_can_update_permission(&s, OWNER, EDITOR).is_ok());
        assert!(ensure_can_update_permission(&s, ADMIN, EDITOR).is_ok());
    }

    #[test]
    fn editor_may_not_update_permissions() {
        assert_matches!(
            ensure_can_update_permission(&space(), EDITOR, ADMIN),
            Err(CoreError::PermissionDenied(_))
        );
    }

    #[test]
    fn owner_grade_is_immutable() {
        assert_matches!(
            ensure_can_update_permission(&space(), ADMIN, OWNER),
            Err(CoreError::PermissionDenied(_))
        );
    }

    #[test]
    fn self_removal_is_allowed() {
        assert!(ensure_can_remove(&space(), EDITOR, EDITOR).is_ok());
    }

    #[test]
    fn admin_may_remove_others_but_not_owner() {
        let s = space();
        assert!(ensure_can_remove(&s, ADMIN, EDITOR).is_ok());
        assert_matches!(
            ensure_can_remove(&s, ADMIN, OWNER),
            Err(CoreError::PermissionDenied(_))
        );
    }

    #[test]
    fn editor_may_not_remove_someone_else() {
        assert_matches!(
            ensure_can_remove(&space(), EDITOR, ADMIN),
            Err(CoreError::PermissionDenied(_))
        );
    }
}
