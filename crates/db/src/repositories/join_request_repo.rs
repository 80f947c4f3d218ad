//! Repository for the `join_requests` table.
//!
//! A pending request is unique per (space, requester); terminal rows for the
//! pair are purged when a new request is created, so users can re-request
//! after leaving or being rejected.

use sqlx::PgPool;

use cospace_core::permissions::Permission;
use cospace_core::types::DbId;

use crate::models::join_request::JoinRequest;
use crate::models::space::SpaceCollaborator;
use crate::repositories::{CollaboratorRepo, SpaceRepo};

/// Column list for `join_requests` queries.
const COLUMNS: &str = "id, space_id, requester_id, requester_email, \
                       requested_permission, message, status, auto_approved, \
                       reviewed_by, reviewed_at, review_message, created_at";

/// Provides the join-request flow: create (optionally auto-approved),
/// approve, reject.
pub struct JoinRequestRepo;

impl JoinRequestRepo {
    /// Create a join request, purging the pair's stale terminal rows first.
    ///
    /// With `auto_approve` the row is inserted already approved and the
    /// collaborator is added in the same transaction. `None` means a pending
    /// request already exists (partial unique index).
    pub async fn create(
        pool: &PgPool,
        space_id: DbId,
        requester_id: DbId,
        requester_email: &str,
        permission: Permission,
        message: &str,
        auto_approve: bool,
    ) -> Result<Option<JoinRequest>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query(
            "DELETE FROM join_requests \
             WHERE space_id = $1 AND requester_id = $2 AND status <> 'pending'",
        )
        .bind(space_id)
        .bind(requester_id)
        .execute(&mut *tx)
        .await?;

        let query = format!(
            "INSERT INTO join_requests \
                (space_id, requester_id, requester_email, requested_permission, \
                 message, status, auto_approved, reviewed_at) \
             VALUES ($1, $2, $3, $4, $5, \
                     CASE WHEN $6 THEN 'approved' ELSE 'pending' END, $6, \
                     CASE WHEN $6 THEN NOW() END) \
             ON CONFLICT (space_id, requester_id) WHERE status = 'pending' \
             DO NOTHING \
             RETURNING {COLUMNS}"
        );
        let Some(request) = sqlx::query_as::<_, JoinRequest>(&query)
            .bind(space_id)
            .bind(requester_id)
            .bind(requester_email)
            .bind(permission.as_str())
            .bind(message)
            .bind(auto_approve)
            .fetch_optional(&mut *tx)
            .await?
        else {
            tx.rollback().await?;
            return Ok(None);
        };

        if auto_approve {
            CollaboratorRepo::add(
                &mut tx,
                space_id,
                requester_id,
                requester_email,
                permission,
                requester_id,
            )
            .await?;
        }

        SpaceRepo::recompute_stats(&mut tx, space_id).await?;
        tx.commit().await?;
        Ok(Some(request))
    }

    pub async fn get(pool: &PgPool, id: DbId) -> Result<Option<JoinRequest>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM join_requests WHERE id = $1");
        sqlx::query_as::<_, JoinRequest>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Pending requests for a space, oldest first (review queue order).
    pub async fn list_pending_for_space(
        pool: &PgPool,
        space_id: DbId,
    ) -> Result<Vec<JoinRequest>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM join_requests \
             WHERE space_id = $1 AND status = 'pending' \
             ORDER BY created_at"
        );
        sqlx::query_as::<_, JoinRequest>(&query)
            .bind(space_id)
            .fetch_all(pool)
            .await
    }

    /// A user's requests across spaces, newest first.
    pub async fn list_for_requester(
        pool: &PgPool,
        requester_id: DbId,
    ) -> Result<Vec<JoinRequest>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM join_requests \
             WHERE requester_id = $1 ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, JoinRequest>(&query)
            .bind(requester_id)
            .fetch_all(pool)
            .await
    }

    /// Approve a pending request and add the collaborator in one
    /// transaction. `None` means the request is missing or not pending.
    pub async fn approve(
        pool: &PgPool,
        id: DbId,
        reviewer: DbId,
        review_message: Option<&str>,
    ) -> Result<Option<(JoinRequest, Option<SpaceCollaborator>)>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "UPDATE join_requests SET \
                status = 'approved', reviewed_by = $2, reviewed_at = NOW(), \
                review_message = $3 \
             WHERE id = $1 AND status = 'pending' \
             RETURNING {COLUMNS}"
        );
        let Some(request) = sqlx::query_as::<_, JoinRequest>(&query)
            .bind(id)
            .bind(reviewer)
            .bind(review_message)
            .fetch_optional(&mut *tx)
            .await?
        else {
            tx.rollback().await?;
            return Ok(None);
        };

        let collaborator = CollaboratorRepo::add(
            &mut tx,
            request.space_id,
            request.requester_id,
            &request.requester_email,
            request.permission_grade(),
            reviewer,
        )
        .await?;

        SpaceRepo::recompute_stats(&mut tx, request.space_id).await?;
        tx.commit().await?;
        Ok(Some((request, collaborator)))
    }

    /// Reject a pending request. `None` means missing or not pending.
    pub async fn reject(
        pool: &PgPool,
        id: DbId,
        reviewer: DbId,
        review_message: Option<&str>,
    ) -> Result<Option<JoinRequest>, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let query = format!(
            "UPDATE join_requests SET \
                status = 'rejected', reviewed_by = $2, reviewed_at = NOW(), \
                review_message = $3 \
             WHERE id = $1 AND status = 'pending' \
             RETURNING {COLUMNS}"
        );
        let request = sqlx::query_as::<_, JoinRequest>(&query)
            .bind(id)
            .bind(reviewer)
            .bind(review_message)
            .fetch_optional(&mut *tx)
            .await?;
        if let Some(ref r) = request {
            SpaceRepo::recompute_stats(&mut tx, r.space_id).await?;
        }
        tx.commit().await?;
        Ok(request)
    }
}
