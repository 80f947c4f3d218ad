//! Join request models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use cospace_core::join_request::JoinRequestStatus;
use cospace_core::permissions::Permission;
use cospace_core::types::{DbId, Timestamp};

/// A row from the `join_requests` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct JoinRequest {
    pub id: DbId,
    pub space_id: DbId,
    pub requester_id: DbId,
    pub requester_email: String,
    pub requested_permission: String,
    pub message: String,
    pub status: String,
    pub auto_approved: bool,
    pub reviewed_by: Option<DbId>,
    pub reviewed_at: Option<Timestamp>,
    pub review_message: Option<String>,
    pub created_at: Timestamp,
}

impl JoinRequest {
    pub fn permission_grade(&self) -> Permission {
        Permission::parse(&self.requested_permission).unwrap_or(Permission::View)
    }

    pub fn lifecycle_status(&self) -> JoinRequestStatus {
        JoinRequestStatus::parse(&self.status).unwrap_or_else(|| {
            tracing::warn!(
                join_request_id = self.id,
                status = %self.status,
                "Unknown join request status"
            );
            JoinRequestStatus::Rejected
        })
    }
}

/// DTO for asking to join a space.
#[derive(Debug, Deserialize)]
pub struct CreateJoinRequest {
    #[serde(default = "default_permission")]
    pub requested_permission: Permission,
    #[serde(default)]
    pub message: String,
}

fn default_permission() -> Permission {
    Permission::View
}

/// DTO for reviewing a join request.
#[derive(Debug, Default, Deserialize)]
pub struct ReviewJoinRequest {
    #[serde(default)]
    pub message: Option<String>,
}
