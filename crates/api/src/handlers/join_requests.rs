//! Handlers for join requests: ask to enter a space, owner review.
//!
//! Admin grade cannot be requested, only granted. When the space allows it
//! (`auto_approve_join_requests`, or approval not required at all), the
//! request is inserted already approved and the collaborator added in the
//! same transaction.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;

use cospace_core::error::CoreError;
use cospace_core::join_request::validate_requested_permission;
use cospace_core::realtime::EventKind;
use cospace_core::types::DbId;
use cospace_db::models::join_request::{CreateJoinRequest, ReviewJoinRequest};
use cospace_db::repositories::JoinRequestRepo;
use cospace_events::SpaceEvent;

use crate::error::{AppError, AppResult};
use crate::handlers::load_space;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/spaces/{id}/join-requests
pub async fn create_join_request(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(space_id): Path<DbId>,
    Json(input): Json<CreateJoinRequest>,
) -> AppResult<impl IntoResponse> {
    let (space, snapshot) = load_space(&state.pool, space_id).await?;
    validate_requested_permission(input.requested_permission)?;

    if snapshot.owner_id == auth.user_id
        || snapshot.active_collaborator(auth.user_id).is_some()
    {
        return Err(AppError::Core(CoreError::Conflict(
            "You are already a collaborator in this space".into(),
        )));
    }

    let auto_approve = space.auto_approve_join_requests || !space.require_approval_for_join;
    let request = JoinRequestRepo::create(
        &state.pool,
        space_id,
        auth.user_id,
        &auth.email,
        input.requested_permission,
        &input.message,
        auto_approve,
    )
    .await?
    .ok_or_else(|| {
        CoreError::Conflict("You already have a pending join request for this space".into())
    })?;

    if auto_approve {
        state.event_bus.publish(
            SpaceEvent::to_space(
                space_id,
                EventKind::MemberAdded,
                serde_json::json!({
                    "space_id": space_id,
                    "user_id": auth.user_id,
                    "permission": request.requested_permission,
                }),
            )
            .excluding(auth.user_id),
        );
    }

    tracing::info!(
        join_request_id = request.id,
        space_id,
        requester_id = auth.user_id,
        auto_approved = auto_approve,
        "Join request created"
    );
    Ok(Json(DataResponse { data: request }))
}

/// GET /api/v1/spaces/{id}/join-requests
///
/// Pending requests for a space, oldest first. Owner only.
pub async fn list_join_requests(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(space_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let (space, _) = load_space(&state.pool, space_id).await?;
    if space.owner_id != auth.user_id {
        return Err(AppError::Core(CoreError::PermissionDenied(
            "Only the owner can review join requests".into(),
        )));
    }

    let requests = JoinRequestRepo::list_pending_for_space(&state.pool, space_id).await?;
    Ok(Json(DataResponse { data: requests }))
}

/// GET /api/v1/join-requests
///
/// The caller's own join requests across spaces.
pub async fn list_my_join_requests(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let requests = JoinRequestRepo::list_for_requester(&state.pool, auth.user_id).await?;
    Ok(Json(DataResponse { data: requests }))
}

/// POST /api/v1/join-requests/{id}/approve
pub async fn approve_join_request(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<ReviewJoinRequest>,
) -> AppResult<impl IntoResponse> {
    let request = JoinRequestRepo::get(&state.pool, id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "join_request",
            id,
        })?;
    let (space, _) = load_space(&state.pool, request.space_id).await?;
    if space.owner_id != auth.user_id {
        return Err(AppError::Core(CoreError::PermissionDenied(
            "Only the owner can review join requests".into(),
        )));
    }

    let (request, _collaborator) =
        JoinRequestRepo::approve(&state.pool, id, auth.user_id, input.message.as_deref())
            .await?
            .ok_or_else(|| CoreError::InvalidState("Join request is no longer pending".into()))?;

    state.event_bus.publish(SpaceEvent::to_user(
        request.requester_id,
        EventKind::PermissionUpdated,
        serde_json::json!({
            "space_id": request.space_id,
            "join_request_id": request.id,
            "status": request.status,
            "permission": request.requested_permission,
        }),
    ));
    state.event_bus.publish(
        SpaceEvent::to_space(
            request.space_id,
            EventKind::MemberAdded,
            serde_json::json!({
                "space_id": request.space_id,
                "user_id": request.requester_id,
                "permission": request.requested_permission,
            }),
        )
        .excluding(request.requester_id),
    );

    tracing::info!(
        join_request_id = id,
        space_id = request.space_id,
        requester_id = request.requester_id,
        approved_by = auth.user_id,
        "Join request approved"
    );
    Ok(Json(DataResponse { data: request }))
}

/// POST /api/v1/join-requests/{id}/reject
pub async fn reject_join_request(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<ReviewJoinRequest>,
) -> AppResult<impl IntoResponse> {
    let request = JoinRequestRepo::get(&state.pool, id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "join_request",
            id,
        })?;
    let (space, _) = load_space(&state.pool, request.space_id).await?;
    if space.owner_id != auth.user_id {
        return Err(AppError::Core(CoreError::PermissionDenied(
            "Only the owner can review join requests".into(),
        )));
    }

    let request = JoinRequestRepo::reject(&state.pool, id, auth.user_id, input.message.as_deref())
        .await?
        .ok_or_else(|| CoreError::InvalidState("Join request is no longer pending".into()))?;

    tracing::info!(
        join_request_id = id,
        requester_id = request.requester_id,
        rejected_by = auth.user_id,
        "Join request rejected"
    );
    Ok(Json(DataResponse { data: request }))
}
