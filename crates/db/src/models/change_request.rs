//! Change request models and DTOs.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

use cospace_core::change_request::{ChangeRequestStatus, ReviewDecision};
use cospace_core::types::{DbId, Timestamp};

/// A row from the `change_requests` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ChangeRequest {
    pub id: DbId,
    pub content_id: DbId,
    pub space_id: DbId,
    pub requested_by: DbId,
    pub status: String,
    pub proposed_content: Value,
    pub original_content: Value,
    pub review_comments: Option<String>,
    pub reviewed_by: Option<DbId>,
    pub reviewed_at: Option<Timestamp>,
    pub comments: Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ChangeRequest {
    /// Parsed lifecycle status. Unknown stored values degrade to cancelled,
    /// a terminal state that permits nothing further.
    pub fn lifecycle_status(&self) -> ChangeRequestStatus {
        ChangeRequestStatus::parse(&self.status).unwrap_or_else(|| {
            tracing::warn!(
                change_request_id = self.id,
                status = %self.status,
                "Unknown change request status"
            );
            ChangeRequestStatus::Cancelled
        })
    }
}

/// DTO for proposing a change.
#[derive(Debug, Deserialize)]
pub struct CreateChangeRequest {
    pub proposed_content: Value,
}

/// DTO for reviewing a pending request.
#[derive(Debug, Deserialize)]
pub struct ReviewChangeRequest {
    pub decision: ReviewDecision,
    #[serde(default)]
    pub comments: Option<String>,
    /// When true and the decision is approval, the change is applied in the
    /// same call.
    #[serde(default)]
    pub apply: bool,
}

/// DTO for commenting on a request.
#[derive(Debug, Deserialize)]
pub struct AddCommentRequest {
    pub content: String,
}

/// Filter for listing a space's change requests.
#[derive(Debug, Default, Deserialize)]
pub struct ChangeRequestFilter {
    pub status: Option<ChangeRequestStatus>,
}
