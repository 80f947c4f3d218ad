//! Permission engine: derives a caller's effective permission in a space and
//! gates every action against the graded ladder.
//!
//! All functions here are pure and side-effect-free; callers evaluate them
//! repeatedly against a [`SpaceSnapshot`] read from the store. The owner
//! always bypasses the ladder.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::membership::CollaboratorStatus;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Permission ladder
// ---------------------------------------------------------------------------

/// Graded permission a collaborator holds in a space.
///
/// Ordered: `View < Edit < Admin`. Serialized lowercase to match the stored
/// column values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    View,
    Edit,
    Admin,
}

impl Permission {
    /// Numeric rank used for ladder comparisons.
    pub fn rank(self) -> u8 {
        match self {
            Permission::View => 0,
            Permission::Edit => 1,
            Permission::Admin => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Permission::View => "view",
            Permission::Edit => "edit",
            Permission::Admin => "admin",
        }
    }

    /// Parse a stored column value. Returns `None` for unknown strings.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "view" => Some(Permission::View),
            "edit" => Some(Permission::Edit),
            "admin" => Some(Permission::Admin),
            _ => None,
        }
    }
}

/// Space privacy level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privacy {
    Public,
    Private,
    Restricted,
}

impl Privacy {
    pub fn as_str(self) -> &'static str {
        match self {
            Privacy::Public => "public",
            Privacy::Private => "private",
            Privacy::Restricted => "restricted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "public" => Some(Privacy::Public),
            "private" => Some(Privacy::Private),
            "restricted" => Some(Privacy::Restricted),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// Everything a caller can attempt against a space, mapped to the minimum
/// permission rank that allows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpaceAction {
    ViewSpace,
    ViewContent,
    CreateContent,
    EditContent,
    Comment,
    InviteUsers,
    ManagePermissions,
    DeleteContent,
    ApproveChanges,
}

impl SpaceAction {
    /// Minimum permission required for the action.
    pub fn required_permission(self) -> Permission {
        match self {
            SpaceAction::ViewSpace | SpaceAction::ViewContent => Permission::View,
            SpaceAction::CreateContent
            | SpaceAction::EditContent
            | SpaceAction::Comment => Permission::Edit,
            SpaceAction::InviteUsers
            | SpaceAction::ManagePermissions
            | SpaceAction::DeleteContent
            | SpaceAction::ApproveChanges => Permission::Admin,
        }
    }
}

// ---------------------------------------------------------------------------
// Space snapshot
// ---------------------------------------------------------------------------

/// One collaborator entry inside a [`SpaceSnapshot`].
#[derive(Debug, Clone)]
pub struct CollaboratorEntry {
    pub user_id: DbId,
    pub permission: Permission,
    pub status: CollaboratorStatus,
}

/// Immutable view of a space used by the permission engine.
///
/// Collaborators keep their display order; an index keyed by user id is
/// built once so lookups and uniqueness checks are O(1) instead of a linear
/// scan of the list.
#[derive(Debug, Clone)]
pub struct SpaceSnapshot {
    pub space_id: DbId,
    pub owner_id: DbId,
    pub privacy: Privacy,
    collaborators: Vec<CollaboratorEntry>,
    by_user: HashMap<DbId, usize>,
}

impl SpaceSnapshot {
    /// Build a snapshot from a collaborator list in display order.
    ///
    /// If a user somehow has multiple entries, the active one wins the index
    /// slot (at most one active entry per user is a store invariant).
    pub fn new(
        space_id: DbId,
        owner_id: DbId,
        privacy: Privacy,
        collaborators: Vec<CollaboratorEntry>,
    ) -> Self {
        let mut by_user = HashMap::with_capacity(collaborators.len());
        for (idx, c) in collaborators.iter().enumerate() {
            by_user
                .entry(c.user_id)
                .and_modify(|slot: &mut usize| {
                    if c.status == CollaboratorStatus::Active {
                        *slot = idx;
                    }
                })
                .or_insert(idx);
        }
        Self {
            space_id,
            owner_id,
            privacy,
            collaborators,
            by_user,
        }
    }

    /// Look up a user's collaborator entry, if any.
    pub fn collaborator(&self, user_id: DbId) -> Option<&CollaboratorEntry> {
        self.by_user.get(&user_id).map(|&idx| &self.collaborators[idx])
    }

    /// The user's *active* collaborator entry, if any.
    pub fn active_collaborator(&self, user_id: DbId) -> Option<&CollaboratorEntry> {
        self.collaborator(user_id)
            .filter(|c| c.status == CollaboratorStatus::Active)
    }

    /// All collaborators in display order.
    pub fn collaborators(&self) -> &[CollaboratorEntry] {
        &self.collaborators
    }

    /// Active user ids with `Admin` permission, plus the owner. These are
    /// the users notified of events that need a reviewer.
    pub fn admin_user_ids(&self) -> Vec<DbId> {
        let mut ids: Vec<DbId> = self
            .collaborators
            .iter()
            .filter(|c| {
                c.status == CollaboratorStatus::Active && c.permission == Permission::Admin
            })
            .map(|c| c.user_id)
            .collect();
        if !ids.contains(&self.owner_id) {
            ids.push(self.owner_id);
        }
        ids
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The caller's effective permission: owner is always admin, otherwise the
/// active collaborator's grade, otherwise none.
pub fn effective_permission(space: &SpaceSnapshot, user_id: DbId) -> Option<Permission> {
    if space.owner_id == user_id {
        return Some(Permission::Admin);
    }
    space.active_collaborator(user_id).map(|c| c.permission)
}

/// Whether the caller may perform `action`. The owner always passes.
pub fn is_allowed(space: &SpaceSnapshot, user_id: DbId, action: SpaceAction) -> bool {
    if space.owner_id == user_id {
        return true;
    }
    match effective_permission(space, user_id) {
        Some(p) => p.rank() >= action.required_permission().rank(),
        None => false,
    }
}

/// Whether the caller may see the space at all: owner, active collaborator,
/// or anyone when the space is public.
pub fn has_access(space: &SpaceSnapshot, user_id: DbId) -> bool {
    if space.owner_id == user_id || space.active_collaborator(user_id).is_some() {
        return true;
    }
    space.privacy == Privacy::Public
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: DbId = 1;
    const EDITOR: DbId = 2;
    const VIEWER: DbId = 3;
    const ADMIN: DbId = 4;
    const INACTIVE: DbId = 5;
    const STRANGER: DbId = 99;

    fn entry(user_id: DbId, permission: Permission, status: CollaboratorStatus) -> CollaboratorEntry {
        CollaboratorEntry {
            user_id,
            permission,
            status,
        }
    }

    fn snapshot(privacy: Privacy) -> SpaceSnapshot {
        SpaceSnapshot::new(
            10,
            OWNER,
            privacy,
            vec![
                entry(EDITOR, Permission::Edit, CollaboratorStatus::Active),
                entry(VIEWER, Permission::View, CollaboratorStatus::Active),
                entry(ADMIN, Permission::Admin, CollaboratorStatus::Active),
                entry(INACTIVE, Permission::Admin, CollaboratorStatus::Inactive),
            ],
        )
    }

    #[test]
    fn owner_is_admin_without_a_record() {
        let space = snapshot(Privacy::Private);
        assert_eq!(effective_permission(&space, OWNER), Some(Permission::Admin));
    }

    #[test]
    fn active_collaborator_permission_is_returned() {
        let space = snapshot(Privacy::Private);
        assert_eq!(effective_permission(&space, EDITOR), Some(Permission::Edit));
        assert_eq!(effective_permission(&space, VIEWER), Some(Permission::View));
    }

    #[test]
    fn inactive_collaborator_has_no_permission() {
        let space = snapshot(Privacy::Private);
        assert_eq!(effective_permission(&space, INACTIVE), None);
        assert_eq!(effective_permission(&space, STRANGER), None);
    }

    #[test]
    fn ladder_gates_actions_by_rank() {
        let space = snapshot(Privacy::Private);

        assert!(is_allowed(&space, VIEWER, SpaceAction::ViewContent));
        assert!(!is_allowed(&space, VIEWER, SpaceAction::EditContent));
        assert!(!is_allowed(&space, VIEWER, SpaceAction::ApproveChanges));

        assert!(is_allowed(&space, EDITOR, SpaceAction::EditContent));
        assert!(is_allowed(&space, EDITOR, SpaceAction::Comment));
        assert!(!is_allowed(&space, EDITOR, SpaceAction::InviteUsers));

        assert!(is_allowed(&space, ADMIN, SpaceAction::ApproveChanges));
        assert!(is_allowed(&space, ADMIN, SpaceAction::ManagePermissions));
    }

    #[test]
    fn owner_bypasses_the_ladder() {
        let space = snapshot(Privacy::Private);
        assert!(is_allowed(&space, OWNER, SpaceAction::ApproveChanges));
        assert!(is_allowed(&space, OWNER, SpaceAction::ManagePermissions));
    }

    #[test]
    fn stranger_is_allowed_nothing() {
        let space = snapshot(Privacy::Private);
        assert!(!is_allowed(&space, STRANGER, SpaceAction::ViewSpace));
    }

    #[test]
    fn access_for_members_and_owner() {
        let space = snapshot(Privacy::Private);
        assert!(has_access(&space, OWNER));
        assert!(has_access(&space, VIEWER));
        assert!(!has_access(&space, INACTIVE));
        assert!(!has_access(&space, STRANGER));
    }

    #[test]
    fn public_space_is_visible_to_everyone() {
        let space = snapshot(Privacy::Public);
        assert!(has_access(&space, STRANGER));
        // Visibility is not permission: strangers still cannot act.
        assert_eq!(effective_permission(&space, STRANGER), None);
    }

    #[test]
    fn index_prefers_active_entry_over_stale_history() {
        // One inactive record followed by a re-added active record.
        let space = SpaceSnapshot::new(
            10,
            OWNER,
            Privacy::Private,
            vec![
                entry(EDITOR, Permission::Admin, CollaboratorStatus::Inactive),
                entry(EDITOR, Permission::View, CollaboratorStatus::Active),
            ],
        );
        assert_eq!(effective_permission(&space, EDITOR), Some(Permission::View));
    }

    #[test]
    fn admin_user_ids_include_owner_once() {
        let space = snapshot(Privacy::Private);
        let ids = space.admin_user_ids();
        assert!(ids.contains(&ADMIN));
        assert!(ids.contains(&OWNER));
        // Inactive admin excluded.
        assert!(!ids.contains(&INACTIVE));
        assert_eq!(ids.iter().filter(|&&id| id == OWNER).count(), 1);
    }

    #[test]
    fn permission_round_trips_through_strings() {
        for p in [Permission::View, Permission::Edit, Permission::Admin] {
            assert_eq!(Permission::parse(p.as_str()), Some(p));
        }
        assert_eq!(Permission::parse("owner"), None);
        assert_eq!(Permission::parse("VIEW"), None);
    }
}
