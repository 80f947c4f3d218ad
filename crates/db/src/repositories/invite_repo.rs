//! Repository for the `collaboration_invites` table.
//!
//! A pending invite is unique per (space, email); the token is globally
//! unique. Accept re-validates expiry inside its guard so it is safe to race
//! the expiry sweep.

use sqlx::PgPool;

use cospace_core::permissions::Permission;
use cospace_core::types::DbId;

use crate::models::invite::CollaborationInvite;
use crate::models::space::SpaceCollaborator;
use crate::repositories::{CollaboratorRepo, SpaceRepo};

/// Column list for `collaboration_invites` queries.
const COLUMNS: &str = "id, space_id, invited_email, invited_user_id, invited_by, \
                       permission, token, message, status, expires_at, \
                       accepted_at, created_at, updated_at";

/// Provides the invite lifecycle: create, resolve, accept, decline, cancel.
pub struct InviteRepo;

impl InviteRepo {
    /// Create a pending invite.
    ///
    /// An *expired* pending invite for the same (space, email) is deleted
    /// and replaced in the same transaction. `None` means a still-valid
    /// pending invite already exists (partial unique index).
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        pool: &PgPool,
        space_id: DbId,
        email: &str,
        permission: Permission,
        invited_by: DbId,
        message: &str,
        token: &str,
        ttl_days: i64,
    ) -> Result<Option<CollaborationInvite>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query(
            "DELETE FROM collaboration_invites \
             WHERE space_id = $1 AND invited_email = $2 \
               AND status = 'pending' AND expires_at <= NOW()",
        )
        .bind(space_id)
        .bind(email)
        .execute(&mut *tx)
        .await?;

        let query = format!(
            "INSERT INTO collaboration_invites \
                (space_id, invited_email, invited_by, permission, message, token, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6, NOW() + ($7 || ' days')::interval) \
             ON CONFLICT (space_id, invited_email) WHERE status = 'pending' \
             DO NOTHING \
             RETURNING {COLUMNS}"
        );
        let invite = sqlx::query_as::<_, CollaborationInvite>(&query)
            .bind(space_id)
            .bind(email)
            .bind(invited_by)
            .bind(permission.as_str())
            .bind(message)
            .bind(token)
            .bind(ttl_days.to_string())
            .fetch_optional(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(invite)
    }

    pub async fn get_by_token(
        pool: &PgPool,
        token: &str,
    ) -> Result<Option<CollaborationInvite>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM collaboration_invites WHERE token = $1");
        sqlx::query_as::<_, CollaborationInvite>(&query)
            .bind(token)
            .fetch_optional(pool)
            .await
    }

    pub async fn get(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<CollaborationInvite>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM collaboration_invites WHERE id = $1");
        sqlx::query_as::<_, CollaborationInvite>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Pending invites for a space, newest first.
    pub async fn list_pending_for_space(
        pool: &PgPool,
        space_id: DbId,
    ) -> Result<Vec<CollaborationInvite>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM collaboration_invites \
             WHERE space_id = $1 AND status = 'pending' \
             ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, CollaborationInvite>(&query)
            .bind(space_id)
            .fetch_all(pool)
            .await
    }

    /// Accept a pending, unexpired invite: mark it accepted and add the
    /// active collaborator in one transaction, stats recomputed.
    ///
    /// `None` means the token did not match a pending, unexpired invite; the
    /// caller disambiguates (missing / expired / terminal) via
    /// [`Self::get_by_token`]. `Some((invite, None))` means the invite was
    /// consumed but the user was already an active collaborator.
    pub async fn accept(
        pool: &PgPool,
        token: &str,
        user_id: DbId,
        user_email: &str,
    ) -> Result<Option<(CollaborationInvite, Option<SpaceCollaborator>)>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "UPDATE collaboration_invites SET \
                status = 'accepted', accepted_at = NOW(), invited_user_id = $2, \
                updated_at = NOW() \
             WHERE token = $1 AND status = 'pending' AND expires_at > NOW() \
             RETURNING {COLUMNS}"
        );
        let Some(invite) = sqlx::query_as::<_, CollaborationInvite>(&query)
            .bind(token)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            tx.rollback().await?;
            return Ok(None);
        };

        let collaborator = CollaboratorRepo::add(
            &mut tx,
            invite.space_id,
            user_id,
            user_email,
            invite.permission_grade(),
            invite.invited_by,
        )
        .await?;

        SpaceRepo::recompute_stats(&mut tx, invite.space_id).await?;
        tx.commit().await?;
        Ok(Some((invite, collaborator)))
    }

    /// Decline a pending, unexpired invite.
    pub async fn decline(
        pool: &PgPool,
        token: &str,
        user_id: DbId,
    ) -> Result<Option<CollaborationInvite>, sqlx::Error> {
        let query = format!(
            "UPDATE collaboration_invites SET \
                status = 'declined', invited_user_id = $2, updated_at = NOW() \
             WHERE token = $1 AND status = 'pending' AND expires_at > NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, CollaborationInvite>(&query)
            .bind(token)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Cancel a pending invite (inviter/admin path).
    pub async fn cancel(
        pool: &PgPool,
        invite_id: DbId,
        space_id: DbId,
    ) -> Result<Option<CollaborationInvite>, sqlx::Error> {
        let query = format!(
            "UPDATE collaboration_invites SET status = 'cancelled', updated_at = NOW() \
             WHERE id = $1 AND space_id = $2 AND status = 'pending' \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, CollaborationInvite>(&query)
            .bind(invite_id)
            .bind(space_id)
            .fetch_optional(pool)
            .await
    }

    /// Flip a single pending-past-expiry invite to 'expired' (resolve path).
    pub async fn mark_expired(
        pool: &PgPool,
        token: &str,
    ) -> Result<Option<CollaborationInvite>, sqlx::Error> {
        let query = format!(
            "UPDATE collaboration_invites SET status = 'expired', updated_at = NOW() \
             WHERE token = $1 AND status = 'pending' AND expires_at <= NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, CollaborationInvite>(&query)
            .bind(token)
            .fetch_optional(pool)
            .await
    }

    /// Flip all pending-past-expiry invites to 'expired'. Returns the number
    /// of invites expired. Periodic sweep; the request paths re-check expiry
    /// themselves, so this is tidying, not correctness.
    pub async fn purge_expired(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE collaboration_invites SET status = 'expired', updated_at = NOW() \
             WHERE status = 'pending' AND expires_at <= NOW()",
        )
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
