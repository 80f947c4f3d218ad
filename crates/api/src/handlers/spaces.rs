//! Handlers for space CRUD and membership-aware reads.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;

use cospace_core::error::CoreError;
use cospace_core::permissions::{self, SpaceAction};
use cospace_core::realtime::EventKind;
use cospace_core::types::DbId;
use cospace_db::models::space::{CreateSpaceRequest, UpdateSpaceRequest};
use cospace_db::repositories::SpaceRepo;
use cospace_events::SpaceEvent;

use crate::error::{AppError, AppResult};
use crate::handlers::load_space;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/spaces
///
/// Create a space. The creator becomes the owner and is seeded as an active
/// admin collaborator.
pub async fn create_space(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateSpaceRequest>,
) -> AppResult<impl IntoResponse> {
    if input.title.trim().is_empty() {
        return Err(AppError::Core(CoreError::Validation(
            "Space title must not be empty".into(),
        )));
    }

    let space = SpaceRepo::create(&state.pool, auth.user_id, &auth.email, &input).await?;
    tracing::info!(space_id = space.id, owner_id = auth.user_id, "Space created");
    Ok(Json(DataResponse { data: space }))
}

/// GET /api/v1/spaces
///
/// List spaces the caller owns or actively collaborates in, most recently
/// active first.
pub async fn list_spaces(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let spaces = SpaceRepo::list_for_user(&state.pool, auth.user_id).await?;
    Ok(Json(DataResponse { data: spaces }))
}

/// GET /api/v1/spaces/{id}
pub async fn get_space(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(space_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let (space, snapshot) = load_space(&state.pool, space_id).await?;
    if !permissions::has_access(&snapshot, auth.user_id) {
        return Err(AppError::Core(CoreError::PermissionDenied(
            "No access to this space".into(),
        )));
    }
    Ok(Json(DataResponse { data: space }))
}

/// PATCH /api/v1/spaces/{id}
///
/// Update title, description, privacy, or join settings. Requires
/// manage-permissions rank.
pub async fn update_space(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(space_id): Path<DbId>,
    Json(input): Json<UpdateSpaceRequest>,
) -> AppResult<impl IntoResponse> {
    let (_, snapshot) = load_space(&state.pool, space_id).await?;
    if !permissions::is_allowed(&snapshot, auth.user_id, SpaceAction::ManagePermissions) {
        return Err(AppError::Core(CoreError::PermissionDenied(
            "Only owners and admins can update the space".into(),
        )));
    }

    let space = SpaceRepo::update(&state.pool, space_id, &input)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "space",
            id: space_id,
        })?;

    state.event_bus.publish(
        SpaceEvent::to_space(
            space_id,
            EventKind::SpaceUpdated,
            serde_json::json!({ "space_id": space_id, "updated_by": auth.user_id }),
        )
        .excluding(auth.user_id),
    );
    tracing::info!(space_id, user_id = auth.user_id, "Space updated");
    Ok(Json(DataResponse { data: space }))
}

/// DELETE /api/v1/spaces/{id}
///
/// Soft-delete a space. Owner only.
pub async fn delete_space(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(space_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let (space, _) = load_space(&state.pool, space_id).await?;
    if space.owner_id != auth.user_id {
        return Err(AppError::Core(CoreError::PermissionDenied(
            "Only the owner can delete a space".into(),
        )));
    }

    let deleted = SpaceRepo::soft_delete(&state.pool, space_id).await?;
    if !deleted {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "space",
            id: space_id,
        }));
    }

    tracing::info!(space_id, owner_id = auth.user_id, "Space deleted");
    Ok(Json(DataResponse {
        data: serde_json::json!({ "deleted": true }),
    }))
}
