//! Repository for the `spaces` table and its denormalized stats.

use sqlx::{PgConnection, PgPool};

use cospace_core::membership::CollaboratorStatus;
use cospace_core::permissions::{Permission, SpaceSnapshot};
use cospace_core::types::DbId;

use crate::models::space::{
    build_snapshot, CreateSpaceRequest, Space, SpaceCollaborator, UpdateSpaceRequest,
};

/// Column list for `spaces` queries.
const SPACE_COLUMNS: &str = "id, title, description, owner_id, privacy, \
                             allow_guest_view, require_approval_for_join, \
                             auto_approve_join_requests, total_collaborators, \
                             pending_join_requests, pending_change_requests, \
                             last_activity, is_active, created_at, updated_at";

const COLLABORATOR_COLUMNS: &str = "id, space_id, user_id, email, permission, \
                                    status, invited_by, joined_at, created_at, \
                                    updated_at";

/// Provides CRUD operations for collaboration spaces.
pub struct SpaceRepo;

impl SpaceRepo {
    /// Create a space and seed the owner's active admin collaborator row.
    pub async fn create(
        pool: &PgPool,
        owner_id: DbId,
        owner_email: &str,
        input: &CreateSpaceRequest,
    ) -> Result<Space, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "INSERT INTO spaces \
                (title, description, owner_id, privacy, allow_guest_view, \
                 require_approval_for_join, auto_approve_join_requests) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {SPACE_COLUMNS}"
        );
        let space = sqlx::query_as::<_, Space>(&query)
            .bind(&input.title)
            .bind(&input.description)
            .bind(owner_id)
            .bind(input.privacy.as_str())
            .bind(input.allow_guest_view)
            .bind(input.require_approval_for_join)
            .bind(input.auto_approve_join_requests)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO space_collaborators \
                (space_id, user_id, email, permission, status, invited_by) \
             VALUES ($1, $2, $3, $4, $5, $2)",
        )
        .bind(space.id)
        .bind(owner_id)
        .bind(owner_email)
        .bind(Permission::Admin.as_str())
        .bind(CollaboratorStatus::Active.as_str())
        .execute(&mut *tx)
        .await?;

        Self::recompute_stats(&mut tx, space.id).await?;
        let space = Self::fetch_in_tx(&mut tx, space.id).await?;
        tx.commit().await?;
        Ok(space)
    }

    /// Get an active space by id.
    pub async fn get(pool: &PgPool, id: DbId) -> Result<Option<Space>, sqlx::Error> {
        let query = format!("SELECT {SPACE_COLUMNS} FROM spaces WHERE id = $1 AND is_active = true");
        sqlx::query_as::<_, Space>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List spaces the user owns or actively collaborates in, most recently
    /// active first.
    pub async fn list_for_user(pool: &PgPool, user_id: DbId) -> Result<Vec<Space>, sqlx::Error> {
        let query = format!(
            "SELECT {SPACE_COLUMNS} FROM spaces s \
             WHERE s.is_active = true \
               AND (s.owner_id = $1 OR EXISTS ( \
                    SELECT 1 FROM space_collaborators c \
                    WHERE c.space_id = s.id AND c.user_id = $1 AND c.status = 'active')) \
             ORDER BY s.last_activity DESC"
        );
        sqlx::query_as::<_, Space>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Patch a space's editable fields. Returns `None` if the space does not
    /// exist or is deleted.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateSpaceRequest,
    ) -> Result<Option<Space>, sqlx::Error> {
        let query = format!(
            "UPDATE spaces SET \
                title = COALESCE($2, title), \
                description = COALESCE($3, description), \
                privacy = COALESCE($4, privacy), \
                allow_guest_view = COALESCE($5, allow_guest_view), \
                require_approval_for_join = COALESCE($6, require_approval_for_join), \
                auto_approve_join_requests = COALESCE($7, auto_approve_join_requests), \
                last_activity = NOW(), \
                updated_at = NOW() \
             WHERE id = $1 AND is_active = true \
             RETURNING {SPACE_COLUMNS}"
        );
        sqlx::query_as::<_, Space>(&query)
            .bind(id)
            .bind(input.title.as_deref())
            .bind(input.description.as_deref())
            .bind(input.privacy.map(|p| p.as_str()))
            .bind(input.allow_guest_view)
            .bind(input.require_approval_for_join)
            .bind(input.auto_approve_join_requests)
            .fetch_optional(pool)
            .await
    }

    /// Soft-delete a space. Returns `true` if a live space was deleted.
    pub async fn soft_delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE spaces SET is_active = false, updated_at = NOW() \
             WHERE id = $1 AND is_active = true",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Bump `last_activity`, e.g. after a content mutation.
    pub async fn touch_activity(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE spaces SET last_activity = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Load an active space together with the permission engine's snapshot
    /// of it.
    pub async fn load_snapshot(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<(Space, SpaceSnapshot)>, sqlx::Error> {
        let Some(space) = Self::get(pool, id).await? else {
            return Ok(None);
        };
        let query = format!(
            "SELECT {COLLABORATOR_COLUMNS} FROM space_collaborators \
             WHERE space_id = $1 ORDER BY id"
        );
        let collaborators = sqlx::query_as::<_, SpaceCollaborator>(&query)
            .bind(id)
            .fetch_all(pool)
            .await?;
        let snapshot = build_snapshot(&space, &collaborators);
        Ok(Some((space, snapshot)))
    }

    /// Recompute the denormalized stats columns from their source tables.
    ///
    /// Must run inside the same transaction as the structural change it
    /// reflects, before commit.
    pub async fn recompute_stats(
        conn: &mut PgConnection,
        space_id: DbId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE spaces SET \
                total_collaborators = (SELECT COUNT(*) FROM space_collaborators \
                                       WHERE space_id = $1 AND status = 'active'), \
                pending_join_requests = (SELECT COUNT(*) FROM join_requests \
                                         WHERE space_id = $1 AND status = 'pending'), \
                pending_change_requests = (SELECT COUNT(*) FROM change_requests \
                                           WHERE space_id = $1 AND status = 'pending'), \
                last_activity = NOW(), \
                updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(space_id)
        .execute(conn)
        .await?;
        Ok(())
    }

    async fn fetch_in_tx(conn: &mut PgConnection, id: DbId) -> Result<Space, sqlx::Error> {
        let query = format!("SELECT {SPACE_COLUMNS} FROM spaces WHERE id = $1");
        sqlx::query_as::<_, Space>(&query)
            .bind(id)
            .fetch_one(conn)
            .await
    }
}
