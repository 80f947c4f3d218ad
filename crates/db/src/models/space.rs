//! Space and collaborator models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use cospace_core::membership::CollaboratorStatus;
use cospace_core::permissions::{
    CollaboratorEntry, Permission, Privacy, SpaceSnapshot,
};
use cospace_core::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Space
// ---------------------------------------------------------------------------

/// A row from the `spaces` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Space {
    pub id: DbId,
    pub title: String,
    pub description: String,
    pub owner_id: DbId,
    pub privacy: String,
    pub allow_guest_view: bool,
    pub require_approval_for_join: bool,
    pub auto_approve_join_requests: bool,
    pub total_collaborators: i64,
    pub pending_join_requests: i64,
    pub pending_change_requests: i64,
    pub last_activity: Timestamp,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Space {
    /// Parsed privacy level. Unknown stored values are treated as private,
    /// the most restrictive interpretation.
    pub fn privacy_level(&self) -> Privacy {
        Privacy::parse(&self.privacy).unwrap_or_else(|| {
            tracing::warn!(space_id = self.id, privacy = %self.privacy, "Unknown privacy value");
            Privacy::Private
        })
    }
}

/// DTO for creating a space.
#[derive(Debug, Deserialize)]
pub struct CreateSpaceRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_privacy")]
    pub privacy: Privacy,
    #[serde(default)]
    pub allow_guest_view: bool,
    #[serde(default = "default_true")]
    pub require_approval_for_join: bool,
    #[serde(default)]
    pub auto_approve_join_requests: bool,
}

fn default_privacy() -> Privacy {
    Privacy::Private
}

fn default_true() -> bool {
    true
}

/// DTO for updating a space. All fields optional.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateSpaceRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub privacy: Option<Privacy>,
    pub allow_guest_view: Option<bool>,
    pub require_approval_for_join: Option<bool>,
    pub auto_approve_join_requests: Option<bool>,
}

// ---------------------------------------------------------------------------
// SpaceCollaborator
// ---------------------------------------------------------------------------

/// A row from the `space_collaborators` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SpaceCollaborator {
    pub id: DbId,
    pub space_id: DbId,
    pub user_id: DbId,
    pub email: String,
    pub permission: String,
    pub status: String,
    pub invited_by: DbId,
    pub joined_at: Timestamp,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl SpaceCollaborator {
    /// Parsed permission grade. Unknown stored values degrade to view.
    pub fn permission_grade(&self) -> Permission {
        Permission::parse(&self.permission).unwrap_or_else(|| {
            tracing::warn!(
                collaborator_id = self.id,
                permission = %self.permission,
                "Unknown permission value"
            );
            Permission::View
        })
    }

    /// Parsed status. Unknown stored values degrade to inactive.
    pub fn collaborator_status(&self) -> CollaboratorStatus {
        CollaboratorStatus::parse(&self.status).unwrap_or_else(|| {
            tracing::warn!(
                collaborator_id = self.id,
                status = %self.status,
                "Unknown collaborator status"
            );
            CollaboratorStatus::Inactive
        })
    }
}

/// DTO for changing a collaborator's permission.
#[derive(Debug, Deserialize)]
pub struct UpdateCollaboratorRequest {
    pub permission: Permission,
}

/// Build the permission engine's view of a space from its rows.
pub fn build_snapshot(space: &Space, collaborators: &[SpaceCollaborator]) -> SpaceSnapshot {
    let entries = collaborators
        .iter()
        .map(|c| CollaboratorEntry {
            user_id: c.user_id,
            permission: c.permission_grade(),
            status: c.collaborator_status(),
        })
        .collect();
    SpaceSnapshot::new(space.id, space.owner_id, space.privacy_level(), entries)
}
