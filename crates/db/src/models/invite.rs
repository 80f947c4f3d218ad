//! Collaboration invite models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use cospace_core::invite::InviteStatus;
use cospace_core::permissions::Permission;
use cospace_core::types::{DbId, Timestamp};

/// A row from the `collaboration_invites` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CollaborationInvite {
    pub id: DbId,
    pub space_id: DbId,
    pub invited_email: String,
    pub invited_user_id: Option<DbId>,
    pub invited_by: DbId,
    pub permission: String,
    pub token: String,
    pub message: String,
    pub status: String,
    pub expires_at: Timestamp,
    pub accepted_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl CollaborationInvite {
    /// Parsed permission the invite grants. Unknown values degrade to view.
    pub fn permission_grade(&self) -> Permission {
        Permission::parse(&self.permission).unwrap_or(Permission::View)
    }

    /// Parsed lifecycle status. Unknown values degrade to cancelled.
    pub fn lifecycle_status(&self) -> InviteStatus {
        InviteStatus::parse(&self.status).unwrap_or_else(|| {
            tracing::warn!(invite_id = self.id, status = %self.status, "Unknown invite status");
            InviteStatus::Cancelled
        })
    }
}

/// DTO for creating an invite.
#[derive(Debug, Deserialize)]
pub struct CreateInviteRequest {
    pub email: String,
    #[serde(default = "default_permission")]
    pub permission: Permission,
    #[serde(default)]
    pub message: String,
}

fn default_permission() -> Permission {
    Permission::View
}
