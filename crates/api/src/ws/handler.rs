//! WebSocket upgrade handler and per-connection command dispatch.
//!
//! Connections authenticate during the upgrade via a `?token=` query
//! parameter (browsers cannot set headers on WebSocket requests). After the
//! upgrade each inbound frame is parsed as a [`ClientCommand`] and
//! dispatched; failures are reported back on the same connection as an
//! `error` event rather than closing the socket.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};

use cospace_core::error::CoreError;
use cospace_core::permissions::{self, SpaceAction};
use cospace_core::realtime::{ClientCommand, EventKind, ServerMessage};
use cospace_core::types::DbId;
use cospace_db::repositories::{ContentRepo, SpaceRepo};
use cospace_events::SpaceEvent;

use crate::auth::jwt::validate_token;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: String,
}

/// HTTP handler that authenticates and upgrades the connection to WebSocket.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let claims = validate_token(&query.token, &state.config.jwt)
        .map_err(|_| AppError::Core(CoreError::Unauthorized("Invalid or expired token".into())))?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, claims.sub)))
}

/// Manage a single WebSocket connection after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Registers the connection with `WsManager`.
///   2. Spawns a sender task that forwards messages from the manager channel.
///   3. Dispatches inbound commands on the current task.
///   4. Cleans up presence and connection state on disconnect.
async fn handle_socket(socket: WebSocket, state: AppState, user_id: DbId) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, user_id, "WebSocket connected");

    let mut rx = state.ws_manager.add(conn_id.clone(), user_id).await;

    let (mut sink, mut stream) = socket.split();

    // Sender task: forward channel messages to the WebSocket sink.
    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
        }
    });

    // Receiver loop: parse and dispatch inbound commands.
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(Message::Text(text)) => {
                let command: ClientCommand = match serde_json::from_str(&text) {
                    Ok(command) => command,
                    Err(e) => {
                        send_error(&state, &conn_id, &format!("Unrecognized command: {e}")).await;
                        continue;
                    }
                };
                if let Err(e) = dispatch(&state, &conn_id, user_id, command).await {
                    send_error(&state, &conn_id, &e.to_string()).await;
                }
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    // Clean up: leave all rooms, announce departures, drop the connection.
    for (space_id, left_user) in state.presence.disconnect(&conn_id).await {
        state.event_bus.publish(SpaceEvent::to_space(
            space_id,
            EventKind::UserLeft,
            json!({ "space_id": space_id, "user_id": left_user }),
        ));
    }
    state.ws_manager.remove(&conn_id).await;
    send_task.abort();
    tracing::info!(conn_id = %conn_id, user_id, "WebSocket disconnected");
}

/// Send an `error` event directly to one connection.
async fn send_error(state: &AppState, conn_id: &str, message: &str) {
    let frame = ServerMessage::new(EventKind::Error, json!({ "message": message }));
    if let Ok(text) = serde_json::to_string(&frame) {
        state
            .ws_manager
            .send_to_connection(conn_id, Message::Text(text.into()))
            .await;
    }
}

/// Send a server message directly to one connection.
async fn send_direct(state: &AppState, conn_id: &str, event: EventKind, data: Value) {
    let frame = ServerMessage::new(event, data);
    if let Ok(text) = serde_json::to_string(&frame) {
        state
            .ws_manager
            .send_to_connection(conn_id, Message::Text(text.into()))
            .await;
    }
}

/// Route one client command.
async fn dispatch(
    state: &AppState,
    conn_id: &str,
    user_id: DbId,
    command: ClientCommand,
) -> AppResult<()> {
    match command {
        ClientCommand::JoinSpace { space_id } => join_space(state, conn_id, user_id, space_id).await,
        ClientCommand::LeaveSpace { space_id } => {
            if let Some(left_user) = state.presence.leave(space_id, conn_id).await {
                state.event_bus.publish(SpaceEvent::to_space(
                    space_id,
                    EventKind::UserLeft,
                    json!({ "space_id": space_id, "user_id": left_user }),
                ));
            }
            Ok(())
        }
        ClientCommand::ContentEdit {
            space_id,
            content_id,
            changes,
        } => content_edit(state, user_id, space_id, content_id, changes).await,
        ClientCommand::CursorUpdate {
            space_id,
            content_id,
            position,
            selection,
        } => {
            rebroadcast(
                state,
                conn_id,
                user_id,
                space_id,
                EventKind::CursorUpdated,
                json!({
                    "space_id": space_id,
                    "content_id": content_id,
                    "user_id": user_id,
                    "position": position,
                    "selection": selection,
                }),
            )
            .await
        }
        ClientCommand::TypingStart { space_id, content_id } => {
            rebroadcast(
                state,
                conn_id,
                user_id,
                space_id,
                EventKind::UserTyping,
                json!({
                    "space_id": space_id,
                    "content_id": content_id,
                    "user_id": user_id,
                    "typing": true,
                }),
            )
            .await
        }
        ClientCommand::TypingStop { space_id, content_id } => {
            rebroadcast(
                state,
                conn_id,
                user_id,
                space_id,
                EventKind::UserTyping,
                json!({
                    "space_id": space_id,
                    "content_id": content_id,
                    "user_id": user_id,
                    "typing": false,
                }),
            )
            .await
        }
        ClientCommand::ContentGeneration { space_id, options } => {
            let (_, snapshot) = SpaceRepo::load_snapshot(&state.pool, space_id)
                .await?
                .ok_or(CoreError::NotFound {
                    entity: "space",
                    id: space_id,
                })?;
            if !permissions::is_allowed(&snapshot, user_id, SpaceAction::CreateContent) {
                return Err(CoreError::PermissionDenied(
                    "Edit permission required to generate content".into(),
                )
                .into());
            }
            // The generation pipeline runs out of process; this only records
            // the request.
            tracing::info!(space_id, user_id, ?options, "Content generation requested");
            Ok(())
        }
    }
}

/// Enter a space's room: access check, presence registration, a direct
/// `space-joined` reply listing who is present, and a `user-joined`
/// broadcast to the rest of the room when this user just became present.
async fn join_space(
    state: &AppState,
    conn_id: &str,
    user_id: DbId,
    space_id: DbId,
) -> AppResult<()> {
    let (_, snapshot) = SpaceRepo::load_snapshot(&state.pool, space_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "space",
            id: space_id,
        })?;
    if !permissions::has_access(&snapshot, user_id) {
        return Err(CoreError::PermissionDenied("No access to this space".into()).into());
    }

    let newly_present = state.presence.join(space_id, conn_id, user_id).await;
    let active_users = state.presence.list_active(space_id).await;

    send_direct(
        state,
        conn_id,
        EventKind::SpaceJoined,
        json!({ "space_id": space_id, "active_users": active_users }),
    )
    .await;

    if newly_present {
        state.event_bus.publish(
            SpaceEvent::to_space(
                space_id,
                EventKind::UserJoined,
                json!({ "space_id": space_id, "user_id": user_id }),
            )
            .excluding(user_id),
        );
    }
    Ok(())
}

/// Apply a live edit and broadcast the result to the room.
///
/// The edit respects the advisory lock: a live lock held by someone else
/// rejects the write. Every body change snapshots the previous version, so
/// both `content-updated` and `content-version-saved` go out.
async fn content_edit(
    state: &AppState,
    user_id: DbId,
    space_id: DbId,
    content_id: DbId,
    changes: Value,
) -> AppResult<()> {
    let (_, snapshot) = SpaceRepo::load_snapshot(&state.pool, space_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "space",
            id: space_id,
        })?;
    if !permissions::is_allowed(&snapshot, user_id, SpaceAction::EditContent) {
        return Err(
            CoreError::PermissionDenied("Edit permission required".into()).into(),
        );
    }

    let Some(updated) = ContentRepo::update(&state.pool, content_id, user_id, None, Some(&changes))
        .await?
    else {
        // Missing row or a live lock held by another user.
        let current = ContentRepo::get(&state.pool, content_id).await?;
        return match current {
            Some(content) => Err(CoreError::Conflict(format!(
                "Content is locked by user {}",
                content.locked_by.unwrap_or_default()
            ))
            .into()),
            None => Err(CoreError::NotFound {
                entity: "content",
                id: content_id,
            }
            .into()),
        };
    };

    state.event_bus.publish(
        SpaceEvent::to_space(
            space_id,
            EventKind::ContentUpdated,
            json!({
                "space_id": space_id,
                "content_id": content_id,
                "user_id": user_id,
                "version": updated.version,
                "changes": changes,
            }),
        )
        .excluding(user_id),
    );
    state.event_bus.publish(SpaceEvent::to_space(
        space_id,
        EventKind::ContentVersionSaved,
        json!({
            "space_id": space_id,
            "content_id": content_id,
            "version": updated.version,
        }),
    ));
    Ok(())
}

/// Forward an ephemeral signal (cursor, typing) to the rest of the room.
///
/// No persistence and no permission ladder: being in the room is the only
/// requirement, and the sender never hears their own echo.
async fn rebroadcast(
    state: &AppState,
    conn_id: &str,
    user_id: DbId,
    space_id: DbId,
    event: EventKind,
    payload: Value,
) -> AppResult<()> {
    if !state.presence.is_member(space_id, conn_id).await {
        return Err(
            CoreError::InvalidState("Join the space before sending signals".into()).into(),
        );
    }
    state
        .event_bus
        .publish(SpaceEvent::to_space(space_id, event, payload).excluding(user_id));
    Ok(())
}
