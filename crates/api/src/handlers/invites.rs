//! Handlers for the invite lifecycle: create, resolve, accept, decline,
//! cancel.
//!
//! Invite delivery (email) is an external concern; the create response
//! carries the invite URL and the server logs it. Expiry is inclusive:
//! `expires_at <= now` means expired, and the repository's CAS guards
//! re-check it so a sweep racing an accept is harmless.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;

use cospace_core::error::CoreError;
use cospace_core::invite::{generate_invite_token, InviteStatus};
use cospace_core::permissions::{self, SpaceAction};
use cospace_core::realtime::EventKind;
use cospace_core::types::DbId;
use cospace_db::models::invite::{CollaborationInvite, CreateInviteRequest};
use cospace_db::repositories::{CollaboratorRepo, InviteRepo};
use cospace_events::SpaceEvent;

use crate::error::{AppError, AppResult};
use crate::handlers::load_space;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/spaces/{id}/invites
///
/// Invite an email address into the space. Requires invite-users rank; one
/// still-valid pending invite per (space, email). An expired pending invite
/// for the pair is replaced.
pub async fn create_invite(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(space_id): Path<DbId>,
    Json(input): Json<CreateInviteRequest>,
) -> AppResult<impl IntoResponse> {
    let (_, snapshot) = load_space(&state.pool, space_id).await?;
    if !permissions::is_allowed(&snapshot, auth.user_id, SpaceAction::InviteUsers) {
        return Err(AppError::Core(CoreError::PermissionDenied(
            "Only owners and admins can invite users".into(),
        )));
    }

    let email = input.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::Core(CoreError::Validation(
            "A valid email address is required".into(),
        )));
    }
    if CollaboratorRepo::email_is_active(&state.pool, space_id, &email).await? {
        return Err(AppError::Core(CoreError::Conflict(
            "This email already belongs to an active collaborator".into(),
        )));
    }

    let token = generate_invite_token();
    let invite = InviteRepo::create(
        &state.pool,
        space_id,
        &email,
        input.permission,
        auth.user_id,
        &input.message,
        &token,
        state.config.invite_ttl_days,
    )
    .await?
    .ok_or_else(|| {
        CoreError::Conflict("A pending invite for this email already exists".into())
    })?;

    let invite_url = state.config.invite_url(&invite.token);
    // Email delivery is handled out of process; surface the link here.
    tracing::info!(
        invite_id = invite.id,
        space_id,
        email = %email,
        url = %invite_url,
        "Invite created"
    );

    Ok(Json(DataResponse {
        data: serde_json::json!({ "invite": invite, "invite_url": invite_url }),
    }))
}

/// GET /api/v1/spaces/{id}/invites
pub async fn list_invites(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(space_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let (_, snapshot) = load_space(&state.pool, space_id).await?;
    if !permissions::is_allowed(&snapshot, auth.user_id, SpaceAction::InviteUsers) {
        return Err(AppError::Core(CoreError::PermissionDenied(
            "Only owners and admins can view invites".into(),
        )));
    }

    let invites = InviteRepo::list_pending_for_space(&state.pool, space_id).await?;
    Ok(Json(DataResponse { data: invites }))
}

/// DELETE /api/v1/spaces/{id}/invites/{invite_id}
pub async fn cancel_invite(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((space_id, invite_id)): Path<(DbId, DbId)>,
) -> AppResult<impl IntoResponse> {
    let (_, snapshot) = load_space(&state.pool, space_id).await?;
    if !permissions::is_allowed(&snapshot, auth.user_id, SpaceAction::InviteUsers) {
        return Err(AppError::Core(CoreError::PermissionDenied(
            "Only owners and admins can cancel invites".into(),
        )));
    }

    let cancelled = InviteRepo::cancel(&state.pool, invite_id, space_id).await?;
    let Some(invite) = cancelled else {
        return match InviteRepo::get(&state.pool, invite_id).await? {
            Some(_) => Err(AppError::Core(CoreError::InvalidState(
                "Invite is no longer pending".into(),
            ))),
            None => Err(AppError::Core(CoreError::NotFound {
                entity: "invite",
                id: invite_id,
            })),
        };
    };

    tracing::info!(invite_id, space_id, cancelled_by = auth.user_id, "Invite cancelled");
    Ok(Json(DataResponse { data: invite }))
}

/// GET /api/v1/invites/{token}
///
/// Resolve an invite token, flipping a pending-past-expiry invite to
/// 'expired' on the way (410).
pub async fn resolve_invite(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> AppResult<impl IntoResponse> {
    let invite = resolve_pending(&state, &token).await?;
    Ok(Json(DataResponse { data: invite }))
}

/// POST /api/v1/invites/{token}/accept
///
/// Accept an invite: the caller's email must match, and the collaborator is
/// added with the invite's permission in one transaction.
pub async fn accept_invite(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> AppResult<impl IntoResponse> {
    let invite = resolve_pending(&state, &token).await?;
    ensure_addressed_to(&invite, &auth)?;

    if CollaboratorRepo::get_active(&state.pool, invite.space_id, auth.user_id)
        .await?
        .is_some()
    {
        return Err(AppError::Core(CoreError::Conflict(
            "You are already a collaborator in this space".into(),
        )));
    }

    let (invite, collaborator) = InviteRepo::accept(&state.pool, &token, auth.user_id, &auth.email)
        .await?
        .ok_or_else(|| {
            // Lost a race with a cancel or the expiry sweep.
            CoreError::InvalidState("Invite is no longer pending".into())
        })?;

    state.event_bus.publish(
        SpaceEvent::to_space(
            invite.space_id,
            EventKind::MemberAdded,
            serde_json::json!({
                "space_id": invite.space_id,
                "user_id": auth.user_id,
                "permission": invite.permission,
            }),
        )
        .excluding(auth.user_id),
    );

    tracing::info!(
        invite_id = invite.id,
        space_id = invite.space_id,
        user_id = auth.user_id,
        "Invite accepted"
    );
    Ok(Json(DataResponse {
        data: serde_json::json!({ "invite": invite, "collaborator": collaborator }),
    }))
}

/// POST /api/v1/invites/{token}/decline
pub async fn decline_invite(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> AppResult<impl IntoResponse> {
    let invite = resolve_pending(&state, &token).await?;
    ensure_addressed_to(&invite, &auth)?;

    let invite = InviteRepo::decline(&state.pool, &token, auth.user_id)
        .await?
        .ok_or_else(|| CoreError::InvalidState("Invite is no longer pending".into()))?;

    tracing::info!(invite_id = invite.id, user_id = auth.user_id, "Invite declined");
    Ok(Json(DataResponse { data: invite }))
}

/// Fetch an invite by token and require it to be pending and unexpired.
/// A pending invite past its deadline is flipped to 'expired' here.
async fn resolve_pending(state: &AppState, token: &str) -> AppResult<CollaborationInvite> {
    let invite = InviteRepo::get_by_token(&state.pool, token)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "invite",
            id: 0,
        })?;

    match invite.lifecycle_status() {
        InviteStatus::Pending => {
            if cospace_core::invite::is_expired(invite.expires_at, chrono::Utc::now()) {
                InviteRepo::mark_expired(&state.pool, token).await?;
                return Err(AppError::Core(CoreError::Expired(
                    "This invite has expired".into(),
                )));
            }
            Ok(invite)
        }
        InviteStatus::Expired => Err(AppError::Core(CoreError::Expired(
            "This invite has expired".into(),
        ))),
        other => Err(AppError::Core(CoreError::InvalidState(format!(
            "Invite is already {}",
            other.as_str()
        )))),
    }
}

/// The invite is addressed to an email, not a user id; the accepting or
/// declining caller must present that email in their token.
fn ensure_addressed_to(invite: &CollaborationInvite, auth: &AuthUser) -> AppResult<()> {
    if !invite.invited_email.eq_ignore_ascii_case(&auth.email) {
        return Err(AppError::Core(CoreError::PermissionDenied(
            "This invite was issued to a different email address".into(),
        )));
    }
    Ok(())
}
