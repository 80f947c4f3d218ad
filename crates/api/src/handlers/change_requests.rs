//! Handlers for the propose-review-apply change workflow.
//!
//! Lifecycle legality lives in `cospace-core::change_request`; the
//! repository enforces it with CAS guards so two concurrent reviews can
//! never both land. Handlers check visibility and the reviewer rules, then
//! publish events after the transaction commits.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;

use cospace_core::change_request::{
    can_view_request, ensure_can_cancel, ensure_reviewer_allowed, ReviewDecision,
};
use cospace_core::error::CoreError;
use cospace_core::permissions::{self, SpaceAction};
use cospace_core::realtime::EventKind;
use cospace_core::types::DbId;
use cospace_db::models::change_request::{
    AddCommentRequest, ChangeRequestFilter, CreateChangeRequest, ReviewChangeRequest,
};
use cospace_db::repositories::{ChangeRequestRepo, ContentRepo};
use cospace_events::SpaceEvent;

use crate::error::{AppError, AppResult};
use crate::handlers::load_space;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/contents/{id}/change-requests
///
/// Propose a change to a content's body. One pending request per
/// (content, requester); the current body is snapshotted for later diffing.
pub async fn create_change_request(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(content_id): Path<DbId>,
    Json(input): Json<CreateChangeRequest>,
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
            "Edit permission required to propose changes".into(),
        )));
    }

    let request = ChangeRequestRepo::create(
        &state.pool,
        content_id,
        space_id,
        auth.user_id,
        &input.proposed_content,
    )
    .await?
    .ok_or_else(|| {
        CoreError::Conflict("You already have a pending change request for this content".into())
    })?;

    // Reviewers (admins and the owner) get a direct notification.
    for admin in snapshot.admin_user_ids() {
        if admin == auth.user_id {
            continue;
        }
        state.event_bus.publish(SpaceEvent::to_user(
            admin,
            EventKind::ChangeRequestCreated,
            serde_json::json!({
                "space_id": space_id,
                "content_id": content_id,
                "change_request_id": request.id,
                "requested_by": auth.user_id,
            }),
        ));
    }

    tracing::info!(
        change_request_id = request.id,
        content_id,
        user_id = auth.user_id,
        "Change request created"
    );
    Ok(Json(DataResponse { data: request }))
}

/// GET /api/v1/spaces/{id}/change-requests?status=
///
/// List a space's change requests. Admins see everything; others see only
/// requests they created or reviewed.
pub async fn list_change_requests(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(space_id): Path<DbId>,
    Query(filter): Query<ChangeRequestFilter>,
) -> AppResult<impl IntoResponse> {
    let (_, snapshot) = load_space(&state.pool, space_id).await?;
    if !permissions::has_access(&snapshot, auth.user_id) {
        return Err(AppError::Core(CoreError::PermissionDenied(
            "No access to this space".into(),
        )));
    }

    let mut requests = ChangeRequestRepo::list_for_space(&state.pool, space_id, filter.status).await?;
    requests.retain(|r| can_view_request(&snapshot, r.requested_by, r.reviewed_by, auth.user_id));
    Ok(Json(DataResponse { data: requests }))
}

/// GET /api/v1/change-requests/{id}
pub async fn get_change_request(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let request = ChangeRequestRepo::get(&state.pool, id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "change_request",
            id,
        })?;
    let (_, snapshot) = load_space(&state.pool, request.space_id).await?;
    if !can_view_request(&snapshot, request.requested_by, request.reviewed_by, auth.user_id) {
        return Err(AppError::Core(CoreError::PermissionDenied(
            "You cannot view this change request".into(),
        )));
    }
    Ok(Json(DataResponse { data: request }))
}

/// POST /api/v1/change-requests/{id}/review
///
/// Approve or reject a pending request. Requires approve-changes; only the
/// space owner may review their own request. With `apply: true` an approval
/// chains straight into apply.
pub async fn review_change_request(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<ReviewChangeRequest>,
) -> AppResult<impl IntoResponse> {
    let request = ChangeRequestRepo::get(&state.pool, id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "change_request",
            id,
        })?;
    let space_id = request.space_id;
    let (_, snapshot) = load_space(&state.pool, space_id).await?;
    ensure_reviewer_allowed(&snapshot, request.requested_by, auth.user_id)?;

    let verdict = input.decision.as_status();
    let reviewed = ChangeRequestRepo::review(
        &state.pool,
        id,
        auth.user_id,
        verdict,
        input.comments.as_deref(),
    )
    .await?
    .ok_or_else(|| {
        CoreError::InvalidState("Change request is no longer pending".into())
    })?;

    state.event_bus.publish(SpaceEvent::to_user(
        reviewed.requested_by,
        EventKind::ChangeRequestReviewed,
        serde_json::json!({
            "space_id": space_id,
            "change_request_id": id,
            "status": reviewed.status,
            "reviewed_by": auth.user_id,
            "comments": reviewed.review_comments,
        }),
    ));

    tracing::info!(
        change_request_id = id,
        verdict = verdict.as_str(),
        reviewed_by = auth.user_id,
        "Change request reviewed"
    );

    if input.apply && input.decision == ReviewDecision::Approved {
        let reviewed = apply_inner(&state, space_id, id, auth.user_id).await?;
        return Ok(Json(DataResponse { data: reviewed }));
    }

    Ok(Json(DataResponse { data: reviewed }))
}

/// POST /api/v1/change-requests/{id}/apply
///
/// Apply an approved request to its content: body overwritten, version
/// bumped, pre-change body archived, all in one transaction.
pub async fn apply_change_request(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let request = ChangeRequestRepo::get(&state.pool, id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "change_request",
            id,
        })?;
    let (_, snapshot) = load_space(&state.pool, request.space_id).await?;
    if !permissions::is_allowed(&snapshot, auth.user_id, SpaceAction::ApproveChanges) {
        return Err(AppError::Core(CoreError::PermissionDenied(
            "You cannot apply change requests in this space".into(),
        )));
    }

    let applied = apply_inner(&state, request.space_id, id, auth.user_id).await?;
    Ok(Json(DataResponse { data: applied }))
}

/// Shared apply path for the review-with-apply and standalone-apply routes.
/// Events go out strictly after the transaction commits.
async fn apply_inner(
    state: &AppState,
    space_id: DbId,
    id: DbId,
    applied_by: DbId,
) -> AppResult<cospace_db::models::change_request::ChangeRequest> {
    let (request, content) = ChangeRequestRepo::apply(&state.pool, id, applied_by)
        .await?
        .ok_or_else(|| {
            CoreError::InvalidState("Only approved change requests can be applied".into())
        })?;

    state.event_bus.publish(SpaceEvent::to_space(
        space_id,
        EventKind::ChangeRequestApplied,
        serde_json::json!({
            "space_id": space_id,
            "change_request_id": request.id,
            "content_id": content.id,
            "version": content.version,
            "applied_by": applied_by,
        }),
    ));
    state.event_bus.publish(SpaceEvent::to_space(
        space_id,
        EventKind::ContentUpdated,
        serde_json::json!({
            "space_id": space_id,
            "content_id": content.id,
            "user_id": request.requested_by,
            "version": content.version,
        }),
    ));

    tracing::info!(
        change_request_id = request.id,
        content_id = content.id,
        version = content.version,
        applied_by,
        "Change request applied"
    );
    Ok(request)
}

/// DELETE /api/v1/change-requests/{id}
///
/// Cancel a pending or rejected request. Requester or admin only;
/// approved/applied requests are immutable history.
pub async fn cancel_change_request(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let request = ChangeRequestRepo::get(&state.pool, id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "change_request",
            id,
        })?;
    let (_, snapshot) = load_space(&state.pool, request.space_id).await?;
    ensure_can_cancel(
        &snapshot,
        request.requested_by,
        request.lifecycle_status(),
        auth.user_id,
    )?;

    let cancelled = ChangeRequestRepo::cancel(&state.pool, id)
        .await?
        .ok_or_else(|| {
            // Lost a race with a review between our read and the guard.
            CoreError::InvalidState("Change request can no longer be cancelled".into())
        })?;

    tracing::info!(change_request_id = id, user_id = auth.user_id, "Change request cancelled");
    Ok(Json(DataResponse { data: cancelled }))
}

/// POST /api/v1/change-requests/{id}/comments
///
/// Append a discussion comment. Visible-to-you is the only requirement
/// beyond comment rank.
pub async fn add_comment(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<AddCommentRequest>,
) -> AppResult<impl IntoResponse> {
    if input.content.trim().is_empty() {
        return Err(AppError::Core(CoreError::Validation(
            "Comment must not be empty".into(),
        )));
    }

    let request = ChangeRequestRepo::get(&state.pool, id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "change_request",
            id,
        })?;
    let (_, snapshot) = load_space(&state.pool, request.space_id).await?;
    if !can_view_request(&snapshot, request.requested_by, request.reviewed_by, auth.user_id) {
        return Err(AppError::Core(CoreError::PermissionDenied(
            "You cannot comment on this change request".into(),
        )));
    }

    let updated = ChangeRequestRepo::add_comment(&state.pool, id, auth.user_id, &input.content)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "change_request",
            id,
        })?;

    Ok(Json(DataResponse { data: updated }))
}
