pub mod health;

use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /ws                                    WebSocket upgrade (?token=)
///
/// /spaces                                list mine, create
/// /spaces/{id}                           get, update, soft-delete
/// /spaces/{id}/collaborators             list
/// /spaces/{id}/collaborators/{uid}       change permission, remove
/// /spaces/{id}/invites                   list pending, create
/// /spaces/{id}/invites/{invite_id}       cancel
/// /spaces/{id}/join-requests             list pending (owner), create
/// /spaces/{id}/change-requests           list (visibility-filtered)
/// /spaces/{id}/contents                  list, create
///
/// /invites/{token}                       resolve
/// /invites/{token}/accept                accept (POST)
/// /invites/{token}/decline               decline (POST)
///
/// /join-requests                         list mine
/// /join-requests/{id}/approve            approve (owner, POST)
/// /join-requests/{id}/reject             reject (owner, POST)
///
/// /contents/{id}                         get, direct edit (lock-respecting)
/// /contents/{id}/versions                version history
/// /contents/{id}/change-requests         propose a change (POST)
/// /contents/{id}/lock                    acquire (POST), release (DELETE)
/// /contents/{id}/lock/force              force-release (DELETE, admin)
///
/// /change-requests/{id}                  get, cancel (DELETE)
/// /change-requests/{id}/review           approve/reject (POST)
/// /change-requests/{id}/apply            apply approved (POST)
/// /change-requests/{id}/comments         add comment (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // WebSocket endpoint.
        .route("/ws", get(ws::ws_handler))
        // Spaces and space-scoped sub-resources.
        .route(
            "/spaces",
            get(handlers::spaces::list_spaces).post(handlers::spaces::create_space),
        )
        .route(
            "/spaces/{id}",
            get(handlers::spaces::get_space)
                .patch(handlers::spaces::update_space)
                .delete(handlers::spaces::delete_space),
        )
        .route(
            "/spaces/{id}/collaborators",
            get(handlers::collaborators::list_collaborators),
        )
        .route(
            "/spaces/{id}/collaborators/{uid}",
            axum::routing::patch(handlers::collaborators::update_collaborator)
                .delete(handlers::collaborators::remove_collaborator),
        )
        .route(
            "/spaces/{id}/invites",
            get(handlers::invites::list_invites).post(handlers::invites::create_invite),
        )
        .route(
            "/spaces/{id}/invites/{invite_id}",
            delete(handlers::invites::cancel_invite),
        )
        .route(
            "/spaces/{id}/join-requests",
            get(handlers::join_requests::list_join_requests)
                .post(handlers::join_requests::create_join_request),
        )
        .route(
            "/spaces/{id}/change-requests",
            get(handlers::change_requests::list_change_requests),
        )
        .route(
            "/spaces/{id}/contents",
            get(handlers::contents::list_contents).post(handlers::contents::create_content),
        )
        // Invite token routes (the token is the capability).
        .route("/invites/{token}", get(handlers::invites::resolve_invite))
        .route(
            "/invites/{token}/accept",
            post(handlers::invites::accept_invite),
        )
        .route(
            "/invites/{token}/decline",
            post(handlers::invites::decline_invite),
        )
        // Join requests.
        .route(
            "/join-requests",
            get(handlers::join_requests::list_my_join_requests),
        )
        .route(
            "/join-requests/{id}/approve",
            post(handlers::join_requests::approve_join_request),
        )
        .route(
            "/join-requests/{id}/reject",
            post(handlers::join_requests::reject_join_request),
        )
        // Content and locks.
        .route(
            "/contents/{id}",
            get(handlers::contents::get_content).patch(handlers::contents::update_content),
        )
        .route(
            "/contents/{id}/versions",
            get(handlers::contents::list_versions),
        )
        .route(
            "/contents/{id}/change-requests",
            post(handlers::change_requests::create_change_request),
        )
        .route(
            "/contents/{id}/lock",
            post(handlers::locks::acquire_lock).delete(handlers::locks::release_lock),
        )
        .route(
            "/contents/{id}/lock/force",
            delete(handlers::locks::force_release_lock),
        )
        // Change request lifecycle.
        .route(
            "/change-requests/{id}",
            get(handlers::change_requests::get_change_request)
                .delete(handlers::change_requests::cancel_change_request),
        )
        .route(
            "/change-requests/{id}/review",
            post(handlers::change_requests::review_change_request),
        )
        .route(
            "/change-requests/{id}/apply",
            post(handlers::change_requests::apply_change_request),
        )
        .route(
            "/change-requests/{id}/comments",
            post(handlers::change_requests::add_comment),
        )
}
