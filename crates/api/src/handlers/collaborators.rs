//! Handlers for collaborator membership: list, permission changes, removal.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;

use cospace_core::error::CoreError;
use cospace_core::membership::{ensure_can_remove, ensure_can_update_permission};
use cospace_core::permissions;
use cospace_core::realtime::EventKind;
use cospace_core::types::DbId;
use cospace_db::models::space::UpdateCollaboratorRequest;
use cospace_db::repositories::CollaboratorRepo;
use cospace_events::SpaceEvent;

use crate::error::{AppError, AppResult};
use crate::handlers::load_space;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/spaces/{id}/collaborators
pub async fn list_collaborators(
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

    let collaborators = CollaboratorRepo::list(&state.pool, space_id).await?;
    Ok(Json(DataResponse {
        data: collaborators,
    }))
}

/// PATCH /api/v1/spaces/{id}/collaborators/{uid}
///
/// Change an active collaborator's permission grade. Requires
/// manage-permissions; the owner's implicit admin grade cannot be altered.
pub async fn update_collaborator(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((space_id, user_id)): Path<(DbId, DbId)>,
    Json(input): Json<UpdateCollaboratorRequest>,
) -> AppResult<impl IntoResponse> {
    let (_, snapshot) = load_space(&state.pool, space_id).await?;
    ensure_can_update_permission(&snapshot, auth.user_id, user_id)?;

    let collaborator =
        CollaboratorRepo::update_permission(&state.pool, space_id, user_id, input.permission)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "collaborator",
                id: user_id,
            })?;

    // Tell the affected user directly, and the room that the roster changed.
    state.event_bus.publish(SpaceEvent::to_user(
        user_id,
        EventKind::PermissionUpdated,
        serde_json::json!({
            "space_id": space_id,
            "permission": input.permission.as_str(),
        }),
    ));
    state.event_bus.publish(
        SpaceEvent::to_space(
            space_id,
            EventKind::MemberPermissionUpdated,
            serde_json::json!({
                "space_id": space_id,
                "user_id": user_id,
                "permission": input.permission.as_str(),
                "updated_by": auth.user_id,
            }),
        )
        .excluding(user_id),
    );

    tracing::info!(
        space_id,
        user_id,
        permission = input.permission.as_str(),
        updated_by = auth.user_id,
        "Collaborator permission updated"
    );
    Ok(Json(DataResponse { data: collaborator }))
}

/// DELETE /api/v1/spaces/{id}/collaborators/{uid}
///
/// Remove a collaborator (soft: status becomes 'inactive'). Allowed for the
/// collaborator themselves, an admin, or the owner; never the owner.
pub async fn remove_collaborator(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((space_id, user_id)): Path<(DbId, DbId)>,
) -> AppResult<impl IntoResponse> {
    let (_, snapshot) = load_space(&state.pool, space_id).await?;
    ensure_can_remove(&snapshot, auth.user_id, user_id)?;

    let removed = CollaboratorRepo::remove(&state.pool, space_id, user_id).await?;
    if !removed {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "collaborator",
            id: user_id,
        }));
    }

    state.event_bus.publish(SpaceEvent::to_space(
        space_id,
        EventKind::MemberRemoved,
        serde_json::json!({
            "space_id": space_id,
            "user_id": user_id,
            "removed_by": auth.user_id,
        }),
    ));

    tracing::info!(space_id, user_id, removed_by = auth.user_id, "Collaborator removed");
    Ok(Json(DataResponse {
        data: serde_json::json!({ "removed": true }),
    }))
}
