//! Handlers for shared content: create, read, direct edit, version history.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;

use cospace_core::error::CoreError;
use cospace_core::permissions::{self, SpaceAction};
use cospace_core::realtime::EventKind;
use cospace_core::types::DbId;
use cospace_db::models::content::{CreateContentRequest, UpdateContentRequest};
use cospace_db::repositories::ContentRepo;
use cospace_events::SpaceEvent;

use crate::error::{AppError, AppResult};
use crate::handlers::load_space;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/spaces/{id}/contents
pub async fn create_content(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(space_id): Path<DbId>,
    Json(input): Json<CreateContentRequest>,
) -> AppResult<impl IntoResponse> {
    let (_, snapshot) = load_space(&state.pool, space_id).await?;
    if !permissions::is_allowed(&snapshot, auth.user_id, SpaceAction::CreateContent) {
        return Err(AppError::Core(CoreError::PermissionDenied(
            "Edit permission required to create content".into(),
        )));
    }
    if input.title.trim().is_empty() {
        return Err(AppError::Core(CoreError::Validation(
            "Content title must not be empty".into(),
        )));
    }

    let content = ContentRepo::create(&state.pool, space_id, auth.user_id, &input).await?;

    state.event_bus.publish(
        SpaceEvent::to_space(
            space_id,
            EventKind::ContentCreated,
            serde_json::json!({
                "space_id": space_id,
                "content_id": content.id,
                "title": content.title,
                "created_by": auth.user_id,
            }),
        )
        .excluding(auth.user_id),
    );
    tracing::info!(space_id, content_id = content.id, user_id = auth.user_id, "Content created");
    Ok(Json(DataResponse { data: content }))
}

/// GET /api/v1/spaces/{id}/contents
pub async fn list_contents(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(space_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let (_, snapshot) = load_space(&state.pool, space_id).await?;
    if !permissions::has_access(&snapshot, auth.user_id) {
        return Err(AppError::Core(CoreError::PermissionDenied(
            "No access to this space".into(),
        )));
    }

    let contents = ContentRepo::list_for_space(&state.pool, space_id).await?;
    Ok(Json(DataResponse { data: contents }))
}

/// GET /api/v1/contents/{id}
pub async fn get_content(
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
    let (_, snapshot) = load_space(&state.pool, content.space_id).await?;
    if !permissions::has_access(&snapshot, auth.user_id) {
        return Err(AppError::Core(CoreError::PermissionDenied(
            "No access to this space".into(),
        )));
    }
    Ok(Json(DataResponse { data: content }))
}

/// PATCH /api/v1/contents/{id}
///
/// Direct edit, respecting the advisory lock: a live lock held by someone
/// else rejects the write with 409. Body changes snapshot the previous
/// version.
pub async fn update_content(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(content_id): Path<DbId>,
    Json(input): Json<UpdateContentRequest>,
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
            "Edit permission required".into(),
        )));
    }

    let body_changed = input.body.is_some();
    let updated = ContentRepo::update(
        &state.pool,
        content_id,
        auth.user_id,
        input.title.as_deref(),
        input.body.as_ref(),
    )
    .await?;

    let Some(updated) = updated else {
        // The row existed above, so the zero-row update means a live lock.
        let holder = ContentRepo::get(&state.pool, content_id)
            .await?
            .and_then(|c| c.locked_by);
        return match holder {
            Some(holder) => Err(AppError::Core(CoreError::Conflict(format!(
                "Content is locked by user {holder}"
            )))),
            None => Err(AppError::Core(CoreError::NotFound {
                entity: "content",
                id: content_id,
            })),
        };
    };

    state.event_bus.publish(
        SpaceEvent::to_space(
            space_id,
            EventKind::ContentUpdated,
            serde_json::json!({
                "space_id": space_id,
                "content_id": content_id,
                "user_id": auth.user_id,
                "version": updated.version,
            }),
        )
        .excluding(auth.user_id),
    );
    if body_changed {
        state.event_bus.publish(SpaceEvent::to_space(
            space_id,
            EventKind::ContentVersionSaved,
            serde_json::json!({
                "space_id": space_id,
                "content_id": content_id,
                "version": updated.version,
            }),
        ));
    }

    tracing::info!(content_id, user_id = auth.user_id, version = updated.version, "Content updated");
    Ok(Json(DataResponse { data: updated }))
}

/// GET /api/v1/contents/{id}/versions
///
/// Version history, newest first. Each row captures the body as it was
/// *before* the change that produced it.
pub async fn list_versions(
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
    let (_, snapshot) = load_space(&state.pool, content.space_id).await?;
    if !permissions::has_access(&snapshot, auth.user_id) {
        return Err(AppError::Core(CoreError::PermissionDenied(
            "No access to this space".into(),
        )));
    }

    let versions = ContentRepo::list_versions(&state.pool, content_id).await?;
    Ok(Json(DataResponse { data: versions }))
}
