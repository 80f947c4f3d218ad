//! Handlers for advisory content locks: acquire, release, force-release.
//!
//! Locks are time-boxed and advisory; every transition is a single
//! conditional UPDATE in the repository, so these handlers only check
//! permissions, pick a TTL, and report the outcome.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;

use cospace_core::error::CoreError;
use cospace_core::locks::validate_ttl;
use cospace_core::permissions::{self, SpaceAction};
use cospace_core::realtime::EventKind;
use cospace_core::types::DbId;
use cospace_db::models::content::AcquireLockRequest;
use cospace_db::repositories::ContentRepo;
use cospace_events::SpaceEvent;

use crate::error::{AppError, AppResult};
use crate::handlers::load_space;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/contents/{id}/lock
///
/// Acquire (or re-acquire and extend) the advisory lock. Returns 409 when a
/// live lock is held by another user. Reclaiming an expired lock notifies
/// the displaced holder.
pub async fn acquire_lock(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(content_id): Path<DbId>,
    Json(input): Json<AcquireLockRequest>,
) -> AppResult<impl IntoResponse> {
    let content = ContentRepo::get(&state.pool, content_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "content",
            id: content_id,
        })?;
    let space_id = content.space_id;
    let (_, snapshot) = load_space(&state.pool, space_id).await?;
    if !permissions::is_allowed(&snapshot, auth.user_id, SpaceAction::EditContent) {
        return Err(AppError::Core(CoreError::PermissionDenied(
            "Edit permission required to lock content".into(),
        )));
    }

    let ttl_secs = input.ttl_secs.unwrap_or(state.config.default_lock_ttl_secs);
    validate_ttl(ttl_secs)?;

    let lock = ContentRepo::acquire_lock(&state.pool, content_id, auth.user_id, ttl_secs).await?;

    let Some(lock) = lock else {
        // Lock is live in someone else's hands -- fetch the holder for the
        // error message.
        let holder = ContentRepo::get(&state.pool, content_id)
            .await?
            .and_then(|c| c.locked_by);
        return match holder {
            Some(holder) => Err(AppError::Core(CoreError::Conflict(format!(
                "Content is locked by user {holder}"
            )))),
            // The lock was released between our update and this read.
            None => Err(AppError::InternalError(
                "Lock conflict detected but no active lock found".into(),
            )),
        };
    };

    state.event_bus.publish(
        SpaceEvent::to_space(
            space_id,
            EventKind::ContentLocked,
            serde_json::json!({
                "space_id": space_id,
                "content_id": content_id,
                "locked_by": auth.user_id,
                "lock_expiry": lock.lock_expiry,
            }),
        )
        .excluding(auth.user_id),
    );
    if let Some(displaced) = lock.previous_holder {
        // Their expired lock was reclaimed; tell them directly.
        state.event_bus.publish(SpaceEvent::to_user(
            displaced,
            EventKind::ContentUnlocked,
            serde_json::json!({
                "space_id": space_id,
                "content_id": content_id,
                "reason": "expired",
            }),
        ));
    }

    tracing::info!(content_id, user_id = auth.user_id, ttl_secs, "Lock acquired");
    Ok(Json(DataResponse { data: lock }))
}

/// DELETE /api/v1/contents/{id}/lock
///
/// Release a held lock. Only the holder can release; admins use force.
pub async fn release_lock(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(content_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let content = ContentRepo::get(&state.pool, content_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "content",
            id: content_id,
        })?;

    let released = ContentRepo::release_lock(&state.pool, content_id, auth.user_id).await?;
    if !released {
        return Err(AppError::Core(CoreError::PermissionDenied(
            "You do not hold the lock on this content".into(),
        )));
    }

    state.event_bus.publish(
        SpaceEvent::to_space(
            content.space_id,
            EventKind::ContentUnlocked,
            serde_json::json!({
                "space_id": content.space_id,
                "content_id": content_id,
                "reason": "released",
            }),
        )
        .excluding(auth.user_id),
    );

    tracing::info!(content_id, user_id = auth.user_id, "Lock released");
    Ok(Json(DataResponse {
        data: serde_json::json!({ "released": true }),
    }))
}

/// DELETE /api/v1/contents/{id}/lock/force
///
/// Clear the lock regardless of holder. Admin path; the displaced holder is
/// notified.
pub async fn force_release_lock(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(content_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let content = ContentRepo::get(&state.pool, content_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "content",
            id: content_id,
        })?;
    let space_id = content.space_id;
    let (_, snapshot) = load_space(&state.pool, space_id).await?;
    if !permissions::is_allowed(&snapshot, auth.user_id, SpaceAction::ManagePermissions) {
        return Err(AppError::Core(CoreError::PermissionDenied(
            "Only owners and admins can force-release a lock".into(),
        )));
    }

    let displaced = ContentRepo::force_release_lock(&state.pool, content_id).await?;
    let Some(displaced) = displaced else {
        return Err(AppError::Core(CoreError::InvalidState(
            "Content is not locked".into(),
        )));
    };

    state.event_bus.publish(SpaceEvent::to_space(
        space_id,
        EventKind::ContentUnlocked,
        serde_json::json!({
            "space_id": space_id,
            "content_id": content_id,
            "reason": "force-released",
        }),
    ));
    state.event_bus.publish(SpaceEvent::to_user(
        displaced.holder,
        EventKind::ContentUnlocked,
        serde_json::json!({
            "space_id": space_id,
            "content_id": content_id,
            "reason": "force-released",
            "released_by": auth.user_id,
        }),
    ));

    tracing::info!(
        content_id,
        holder = displaced.holder,
        released_by = auth.user_id,
        "Lock force-released"
    );
    Ok(Json(DataResponse {
        data: serde_json::json!({ "released": true, "previous_holder": displaced.holder }),
    }))
}
