//! Repository for the `change_requests` table.
//!
//! Status transitions are conditional updates guarded on the expected
//! current status, so two racing reviews (or a review racing a cancel) can
//! never both succeed. `apply` performs the content overwrite, the version
//! snapshot, and the status flip in one transaction.

use serde_json::{json, Value};
use sqlx::PgPool;

use cospace_core::change_request::ChangeRequestStatus;
use cospace_core::types::DbId;

use crate::models::change_request::ChangeRequest;
use crate::models::content::SharedContent;
use crate::repositories::SpaceRepo;

/// Column list for `change_requests` queries.
const COLUMNS: &str = "id, content_id, space_id, requested_by, status, \
                       proposed_content, original_content, review_comments, \
                       reviewed_by, reviewed_at, comments, created_at, updated_at";

const CONTENT_COLUMNS: &str = "id, space_id, title, body, version, status, \
                               locked_by, locked_at, lock_expiry, created_by, \
                               last_modified_by, created_at, updated_at";

/// Provides the change-request workflow: propose, review, apply, cancel.
pub struct ChangeRequestRepo;

impl ChangeRequestRepo {
    /// Propose a change, snapshotting the content's current body into
    /// `original_content`.
    ///
    /// `None` means the requester already has a pending request for this
    /// content (partial unique index) — or the content does not exist; the
    /// caller checks content existence first.
    pub async fn create(
        pool: &PgPool,
        content_id: DbId,
        space_id: DbId,
        requested_by: DbId,
        proposed_content: &Value,
    ) -> Result<Option<ChangeRequest>, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let query = format!(
            "INSERT INTO change_requests \
                (content_id, space_id, requested_by, proposed_content, original_content) \
             SELECT id, $2, $3, $4, body FROM shared_content WHERE id = $1 \
             ON CONFLICT (content_id, requested_by) WHERE status = 'pending' \
             DO NOTHING \
             RETURNING {COLUMNS}"
        );
        let request = sqlx::query_as::<_, ChangeRequest>(&query)
            .bind(content_id)
            .bind(space_id)
            .bind(requested_by)
            .bind(proposed_content)
            .fetch_optional(&mut *tx)
            .await?;
        if request.is_some() {
            SpaceRepo::recompute_stats(&mut tx, space_id).await?;
        }
        tx.commit().await?;
        Ok(request)
    }

    pub async fn get(pool: &PgPool, id: DbId) -> Result<Option<ChangeRequest>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM change_requests WHERE id = $1");
        sqlx::query_as::<_, ChangeRequest>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List a space's requests, newest first, optionally filtered by status.
    /// Visibility filtering is the caller's concern.
    pub async fn list_for_space(
        pool: &PgPool,
        space_id: DbId,
        status: Option<ChangeRequestStatus>,
    ) -> Result<Vec<ChangeRequest>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM change_requests \
             WHERE space_id = $1 AND ($2::text IS NULL OR status = $2) \
             ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, ChangeRequest>(&query)
            .bind(space_id)
            .bind(status.map(|s| s.as_str()))
            .fetch_all(pool)
            .await
    }

    /// Record a review verdict on a pending request.
    ///
    /// Guarded on `status = 'pending'`: `None` means the request is missing
    /// or no longer pending (lost a race with another reviewer or a cancel).
    pub async fn review(
        pool: &PgPool,
        id: DbId,
        reviewer: DbId,
        verdict: ChangeRequestStatus,
        comments: Option<&str>,
    ) -> Result<Option<ChangeRequest>, sqlx::Error> {
        debug_assert!(ChangeRequestStatus::Pending.can_transition(verdict));
        let mut tx = pool.begin().await?;
        let query = format!(
            "UPDATE change_requests SET \
                status = $3, reviewed_by = $2, reviewed_at = NOW(), \
                review_comments = $4, updated_at = NOW() \
             WHERE id = $1 AND status = 'pending' \
             RETURNING {COLUMNS}"
        );
        let request = sqlx::query_as::<_, ChangeRequest>(&query)
            .bind(id)
            .bind(reviewer)
            .bind(verdict.as_str())
            .bind(comments)
            .fetch_optional(&mut *tx)
            .await?;
        if let Some(ref r) = request {
            SpaceRepo::recompute_stats(&mut tx, r.space_id).await?;
        }
        tx.commit().await?;
        Ok(request)
    }

    /// Apply an approved request to its content.
    ///
    /// One transaction: flip the request to 'applied' (guarded on
    /// 'approved'), append the pre-change body to `content_versions`,
    /// overwrite the body and bump the version. `None` means the request is
    /// missing or not approved.
    pub async fn apply(
        pool: &PgPool,
        id: DbId,
        applied_by: DbId,
    ) -> Result<Option<(ChangeRequest, SharedContent)>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "UPDATE change_requests SET status = 'applied', updated_at = NOW() \
             WHERE id = $1 AND status = 'approved' \
             RETURNING {COLUMNS}"
        );
        let Some(request) = sqlx::query_as::<_, ChangeRequest>(&query)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query(
            "INSERT INTO content_versions (content_id, version, body, modified_by) \
             SELECT id, version, body, $2 FROM shared_content WHERE id = $1",
        )
        .bind(request.content_id)
        .bind(applied_by)
        .execute(&mut *tx)
        .await?;

        let query = format!(
            "UPDATE shared_content SET \
                body = $2, version = version + 1, last_modified_by = $3, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {CONTENT_COLUMNS}"
        );
        let content = sqlx::query_as::<_, SharedContent>(&query)
            .bind(request.content_id)
            .bind(&request.proposed_content)
            .bind(applied_by)
            .fetch_one(&mut *tx)
            .await?;

        SpaceRepo::recompute_stats(&mut tx, request.space_id).await?;
        tx.commit().await?;
        Ok(Some((request, content)))
    }

    /// Cancel a pending or rejected request. Who may cancel is decided by
    /// the caller; this guards only the lifecycle state.
    pub async fn cancel(pool: &PgPool, id: DbId) -> Result<Option<ChangeRequest>, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let query = format!(
            "UPDATE change_requests SET status = 'cancelled', updated_at = NOW() \
             WHERE id = $1 AND status IN ('pending', 'rejected') \
             RETURNING {COLUMNS}"
        );
        let request = sqlx::query_as::<_, ChangeRequest>(&query)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if let Some(ref r) = request {
            SpaceRepo::recompute_stats(&mut tx, r.space_id).await?;
        }
        tx.commit().await?;
        Ok(request)
    }

    /// Append a discussion comment to the request's `comments` array.
    pub async fn add_comment(
        pool: &PgPool,
        id: DbId,
        user_id: DbId,
        content: &str,
    ) -> Result<Option<ChangeRequest>, sqlx::Error> {
        let comment = json!({
            "user_id": user_id,
            "content": content,
            "created_at": chrono::Utc::now(),
        });
        let query = format!(
            "UPDATE change_requests SET \
                comments = comments || $2::jsonb, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ChangeRequest>(&query)
            .bind(id)
            .bind(&comment)
            .fetch_optional(pool)
            .await
    }
}
