//! Repository for `shared_content`, its version history, and the advisory
//! lock fields.
//!
//! Every lock transition is a single conditional update; expiry is checked
//! inside the UPDATE guard, never read-then-write, so the periodic sweep and
//! a racing `acquire` cannot disagree about who holds a lock.

use serde_json::Value;
use sqlx::PgPool;

use cospace_core::types::DbId;

use crate::models::content::{
    AcquiredLock, ContentVersion, CreateContentRequest, ExpiredLock, SharedContent,
};

/// Column list for `shared_content` queries.
const CONTENT_COLUMNS: &str = "id, space_id, title, body, version, status, \
                               locked_by, locked_at, lock_expiry, created_by, \
                               last_modified_by, created_at, updated_at";

const VERSION_COLUMNS: &str = "id, content_id, version, body, modified_by, modified_at";

/// Guard clause shared by every write that must respect the advisory lock:
/// unlocked, expired, or held by the caller.
const LOCK_GUARD: &str = "(locked_by IS NULL OR lock_expiry <= NOW() OR locked_by = $2)";

/// Provides content CRUD, version history, and lock operations.
pub struct ContentRepo;

impl ContentRepo {
    /// Create content in a space, bumping the space's activity timestamp.
    pub async fn create(
        pool: &PgPool,
        space_id: DbId,
        created_by: DbId,
        input: &CreateContentRequest,
    ) -> Result<SharedContent, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let query = format!(
            "INSERT INTO shared_content (space_id, title, body, created_by, last_modified_by) \
             VALUES ($1, $2, $3, $4, $4) \
             RETURNING {CONTENT_COLUMNS}"
        );
        let content = sqlx::query_as::<_, SharedContent>(&query)
            .bind(space_id)
            .bind(&input.title)
            .bind(&input.body)
            .bind(created_by)
            .fetch_one(&mut *tx)
            .await?;
        sqlx::query("UPDATE spaces SET last_activity = NOW() WHERE id = $1")
            .bind(space_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(content)
    }

    pub async fn get(pool: &PgPool, id: DbId) -> Result<Option<SharedContent>, sqlx::Error> {
        let query = format!("SELECT {CONTENT_COLUMNS} FROM shared_content WHERE id = $1");
        sqlx::query_as::<_, SharedContent>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_for_space(
        pool: &PgPool,
        space_id: DbId,
    ) -> Result<Vec<SharedContent>, sqlx::Error> {
        let query = format!(
            "SELECT {CONTENT_COLUMNS} FROM shared_content \
             WHERE space_id = $1 ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, SharedContent>(&query)
            .bind(space_id)
            .fetch_all(pool)
            .await
    }

    /// Direct edit, respecting the advisory lock.
    ///
    /// When the body is replaced the pre-change body is appended to
    /// `content_versions` and `version` is incremented, all in one
    /// transaction. Returns `None` when the row is missing or the lock is
    /// held by someone else; the caller disambiguates with [`Self::get`].
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        user_id: DbId,
        title: Option<&str>,
        body: Option<&Value>,
    ) -> Result<Option<SharedContent>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        if body.is_some() {
            sqlx::query(
                &format!(
                    "INSERT INTO content_versions (content_id, version, body, modified_by) \
                     SELECT id, version, body, $2 FROM shared_content \
                     WHERE id = $1 AND {LOCK_GUARD}"
                ),
            )
            .bind(id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }

        let query = format!(
            "UPDATE shared_content SET \
                title = COALESCE($3, title), \
                body = COALESCE($4, body), \
                version = version + CASE WHEN $4::jsonb IS NULL THEN 0 ELSE 1 END, \
                last_modified_by = $2, \
                updated_at = NOW() \
             WHERE id = $1 AND {LOCK_GUARD} \
             RETURNING {CONTENT_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, SharedContent>(&query)
            .bind(id)
            .bind(user_id)
            .bind(title)
            .bind(body)
            .fetch_optional(&mut *tx)
            .await?;

        if updated.is_some() {
            sqlx::query(
                "UPDATE spaces SET last_activity = NOW() \
                 WHERE id = (SELECT space_id FROM shared_content WHERE id = $1)",
            )
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(updated)
    }

    /// Version history, newest first.
    pub async fn list_versions(
        pool: &PgPool,
        content_id: DbId,
    ) -> Result<Vec<ContentVersion>, sqlx::Error> {
        let query = format!(
            "SELECT {VERSION_COLUMNS} FROM content_versions \
             WHERE content_id = $1 ORDER BY version DESC"
        );
        sqlx::query_as::<_, ContentVersion>(&query)
            .bind(content_id)
            .fetch_all(pool)
            .await
    }

    // -----------------------------------------------------------------------
    // Locks
    // -----------------------------------------------------------------------

    /// Attempt to acquire (or re-acquire and extend) the advisory lock.
    ///
    /// One conditional update: succeeds when the lock is free, expired, or
    /// already held by the caller. `previous_holder` is populated when an
    /// expired lock was reclaimed from another user. Returns `None` when the
    /// lock is live in someone else's hands.
    pub async fn acquire_lock(
        pool: &PgPool,
        content_id: DbId,
        user_id: DbId,
        ttl_secs: i64,
    ) -> Result<Option<AcquiredLock>, sqlx::Error> {
        sqlx::query_as::<_, AcquiredLock>(
            "WITH prev AS ( \
                 SELECT id, locked_by FROM shared_content WHERE id = $1 \
             ) \
             UPDATE shared_content c SET \
                 locked_by = $2, \
                 locked_at = NOW(), \
                 lock_expiry = NOW() + ($3 || ' seconds')::interval, \
                 updated_at = NOW() \
             FROM prev \
             WHERE c.id = prev.id \
               AND (c.locked_by IS NULL OR c.lock_expiry <= NOW() OR c.locked_by = $2) \
             RETURNING c.id AS content_id, c.space_id, c.locked_by, c.lock_expiry, \
                       CASE WHEN prev.locked_by IS DISTINCT FROM $2 \
                            THEN prev.locked_by END AS previous_holder",
        )
        .bind(content_id)
        .bind(user_id)
        .bind(ttl_secs.to_string())
        .fetch_optional(pool)
        .await
    }

    /// Release the lock. Only the holder releases; returns `false` when the
    /// caller does not hold it.
    pub async fn release_lock(
        pool: &PgPool,
        content_id: DbId,
        user_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE shared_content SET \
                 locked_by = NULL, locked_at = NULL, lock_expiry = NULL, updated_at = NOW() \
             WHERE id = $1 AND locked_by = $2",
        )
        .bind(content_id)
        .bind(user_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Clear the lock regardless of holder (admin path). Returns the
    /// displaced holder so the caller can notify them, or `None` if the
    /// content was not locked.
    pub async fn force_release_lock(
        pool: &PgPool,
        content_id: DbId,
    ) -> Result<Option<ExpiredLock>, sqlx::Error> {
        sqlx::query_as::<_, ExpiredLock>(
            "WITH prev AS ( \
                 SELECT id, space_id, locked_by AS holder FROM shared_content \
                 WHERE id = $1 AND locked_by IS NOT NULL \
             ) \
             UPDATE shared_content c SET \
                 locked_by = NULL, locked_at = NULL, lock_expiry = NULL, updated_at = NOW() \
             FROM prev \
             WHERE c.id = prev.id \
             RETURNING prev.id AS content_id, prev.space_id, prev.holder",
        )
        .bind(content_id)
        .fetch_optional(pool)
        .await
    }

    /// Clear all expired locks, returning the displaced holders for
    /// notification. Safe to race with `acquire`: both re-check expiry in
    /// their UPDATE guards.
    pub async fn sweep_expired_locks(pool: &PgPool) -> Result<Vec<ExpiredLock>, sqlx::Error> {
        sqlx::query_as::<_, ExpiredLock>(
            "WITH expired AS ( \
                 SELECT id, space_id, locked_by AS holder FROM shared_content \
                 WHERE locked_by IS NOT NULL AND lock_expiry <= NOW() \
                 FOR UPDATE SKIP LOCKED \
             ) \
             UPDATE shared_content c SET \
                 locked_by = NULL, locked_at = NULL, lock_expiry = NULL, updated_at = NOW() \
             FROM expired e \
             WHERE c.id = e.id \
             RETURNING e.id AS content_id, e.space_id, e.holder",
        )
        .fetch_all(pool)
        .await
    }
}
