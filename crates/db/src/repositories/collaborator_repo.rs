//! Repository for the `space_collaborators` table.

use sqlx::{PgConnection, PgPool};

use cospace_core::permissions::Permission;
use cospace_core::types::DbId;

use crate::models::space::SpaceCollaborator;
use crate::repositories::SpaceRepo;

/// Column list for `space_collaborators` queries.
const COLUMNS: &str = "id, space_id, user_id, email, permission, status, \
                       invited_by, joined_at, created_at, updated_at";

/// Provides membership operations for a space's collaborators.
pub struct CollaboratorRepo;

impl CollaboratorRepo {
    /// All collaborator rows for a space, history included, in display order.
    pub async fn list(pool: &PgPool, space_id: DbId) -> Result<Vec<SpaceCollaborator>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM space_collaborators WHERE space_id = $1 ORDER BY id");
        sqlx::query_as::<_, SpaceCollaborator>(&query)
            .bind(space_id)
            .fetch_all(pool)
            .await
    }

    /// The user's active collaborator row, if any.
    pub async fn get_active(
        pool: &PgPool,
        space_id: DbId,
        user_id: DbId,
    ) -> Result<Option<SpaceCollaborator>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM space_collaborators \
             WHERE space_id = $1 AND user_id = $2 AND status = 'active'"
        );
        sqlx::query_as::<_, SpaceCollaborator>(&query)
            .bind(space_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Whether the email belongs to an active collaborator of the space.
    pub async fn email_is_active(
        pool: &PgPool,
        space_id: DbId,
        email: &str,
    ) -> Result<bool, sqlx::Error> {
        let row: Option<(DbId,)> = sqlx::query_as(
            "SELECT id FROM space_collaborators \
             WHERE space_id = $1 AND email = $2 AND status = 'active' LIMIT 1",
        )
        .bind(space_id)
        .bind(email)
        .fetch_optional(pool)
        .await?;
        Ok(row.is_some())
    }

    /// Add an active collaborator row.
    ///
    /// Uses `INSERT ... ON CONFLICT DO NOTHING` against the partial unique
    /// index on active rows: `None` means the user is already an active
    /// collaborator. Historical 'inactive' rows are left untouched. Runs on
    /// the caller's connection so it can join an invite-accept or
    /// join-approve transaction.
    pub async fn add(
        conn: &mut PgConnection,
        space_id: DbId,
        user_id: DbId,
        email: &str,
        permission: Permission,
        invited_by: DbId,
    ) -> Result<Option<SpaceCollaborator>, sqlx::Error> {
        let query = format!(
            "INSERT INTO space_collaborators \
                (space_id, user_id, email, permission, status, invited_by) \
             VALUES ($1, $2, $3, $4, 'active', $5) \
             ON CONFLICT (space_id, user_id) WHERE status = 'active' \
             DO NOTHING \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SpaceCollaborator>(&query)
            .bind(space_id)
            .bind(user_id)
            .bind(email)
            .bind(permission.as_str())
            .bind(invited_by)
            .fetch_optional(conn)
            .await
    }

    /// Change an active collaborator's permission grade. Returns `None` if
    /// the user has no active row.
    pub async fn update_permission(
        pool: &PgPool,
        space_id: DbId,
        user_id: DbId,
        permission: Permission,
    ) -> Result<Option<SpaceCollaborator>, sqlx::Error> {
        let query = format!(
            "UPDATE space_collaborators SET permission = $3, updated_at = NOW() \
             WHERE space_id = $1 AND user_id = $2 AND status = 'active' \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SpaceCollaborator>(&query)
            .bind(space_id)
            .bind(user_id)
            .bind(permission.as_str())
            .fetch_optional(pool)
            .await
    }

    /// Soft-remove a collaborator: status → 'inactive', stats recomputed in
    /// the same transaction. Returns `false` if the user had no active row.
    pub async fn remove(pool: &PgPool, space_id: DbId, user_id: DbId) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let result = sqlx::query(
            "UPDATE space_collaborators SET status = 'inactive', updated_at = NOW() \
             WHERE space_id = $1 AND user_id = $2 AND status = 'active'",
        )
        .bind(space_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Ok(false);
        }
        SpaceRepo::recompute_stats(&mut tx, space_id).await?;
        tx.commit().await?;
        Ok(true)
    }
}
