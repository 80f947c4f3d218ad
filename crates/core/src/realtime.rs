//! Real-time wire protocol shared by the WebSocket layer and the fan-out.
//!
//! Inbound client commands are an internally-tagged JSON enum so the
//! connection handler can route on the `"type"` string. Outbound traffic is
//! a fixed set of domain event kinds wrapped in a [`ServerMessage`]
//! envelope; this is not a general-purpose pub/sub surface.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Client → server commands
// ---------------------------------------------------------------------------

/// Commands a connected client may send over the WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ClientCommand {
    /// Enter a space's room (requires access to the space).
    #[serde(rename = "join-space")]
    JoinSpace { space_id: DbId },

    /// Leave a space's room.
    #[serde(rename = "leave-space")]
    LeaveSpace { space_id: DbId },

    /// A live edit to shared content (requires edit permission).
    #[serde(rename = "content-edit")]
    ContentEdit {
        space_id: DbId,
        content_id: DbId,
        changes: Value,
    },

    /// Cursor position/selection for collaborative editing overlays.
    #[serde(rename = "cursor-update")]
    CursorUpdate {
        space_id: DbId,
        content_id: DbId,
        position: Value,
        #[serde(default)]
        selection: Option<Value>,
    },

    #[serde(rename = "typing-start")]
    TypingStart { space_id: DbId, content_id: DbId },

    #[serde(rename = "typing-stop")]
    TypingStop { space_id: DbId, content_id: DbId },

    /// Kick off content generation in the space (requires edit permission;
    /// the generation pipeline itself is an external collaborator).
    #[serde(rename = "content-generation")]
    ContentGeneration {
        space_id: DbId,
        #[serde(default)]
        options: Value,
    },
}

// ---------------------------------------------------------------------------
// Server → client events
// ---------------------------------------------------------------------------

/// The fixed set of domain events delivered to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "space-joined")]
    SpaceJoined,
    #[serde(rename = "user-joined")]
    UserJoined,
    #[serde(rename = "user-left")]
    UserLeft,
    #[serde(rename = "content-updated")]
    ContentUpdated,
    #[serde(rename = "cursor-updated")]
    CursorUpdated,
    #[serde(rename = "user-typing")]
    UserTyping,
    #[serde(rename = "change-request-created")]
    ChangeRequestCreated,
    #[serde(rename = "change-request-reviewed")]
    ChangeRequestReviewed,
    #[serde(rename = "change-request-applied")]
    ChangeRequestApplied,
    #[serde(rename = "permission-updated")]
    PermissionUpdated,
    #[serde(rename = "member-permission-updated")]
    MemberPermissionUpdated,
    #[serde(rename = "content-created")]
    ContentCreated,
    #[serde(rename = "content-locked")]
    ContentLocked,
    #[serde(rename = "content-unlocked")]
    ContentUnlocked,
    #[serde(rename = "space-updated")]
    SpaceUpdated,
    #[serde(rename = "member-added")]
    MemberAdded,
    #[serde(rename = "member-removed")]
    MemberRemoved,
    #[serde(rename = "content-version-saved")]
    ContentVersionSaved,
    #[serde(rename = "error")]
    Error,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::SpaceJoined => "space-joined",
            EventKind::UserJoined => "user-joined",
            EventKind::UserLeft => "user-left",
            EventKind::ContentUpdated => "content-updated",
            EventKind::CursorUpdated => "cursor-updated",
            EventKind::UserTyping => "user-typing",
            EventKind::ChangeRequestCreated => "change-request-created",
            EventKind::ChangeRequestReviewed => "change-request-reviewed",
            EventKind::ChangeRequestApplied => "change-request-applied",
            EventKind::PermissionUpdated => "permission-updated",
            EventKind::MemberPermissionUpdated => "member-permission-updated",
            EventKind::ContentCreated => "content-created",
            EventKind::ContentLocked => "content-locked",
            EventKind::ContentUnlocked => "content-unlocked",
            EventKind::SpaceUpdated => "space-updated",
            EventKind::MemberAdded => "member-added",
            EventKind::MemberRemoved => "member-removed",
            EventKind::ContentVersionSaved => "content-version-saved",
            EventKind::Error => "error",
        }
    }
}

/// Envelope for every outbound WebSocket frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerMessage {
    pub event: EventKind,
    pub data: Value,
    pub timestamp: Timestamp,
}

impl ServerMessage {
    pub fn new(event: EventKind, data: Value) -> Self {
        Self {
            event,
            data,
            timestamp: chrono::Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn join_space_round_trip() {
        let cmd = ClientCommand::JoinSpace { space_id: 42 };
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains(r#""type":"join-space"#));

        let parsed: ClientCommand = serde_json::from_str(&json).unwrap();
        assert_eq!(cmd, parsed);
    }

    #[test]
    fn content_edit_round_trip() {
        let cmd = ClientCommand::ContentEdit {
            space_id: 1,
            content_id: 2,
            changes: json!({"body": "new text"}),
        };
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains(r#""type":"content-edit"#));

        let parsed: ClientCommand = serde_json::from_str(&json).unwrap();
        assert_eq!(cmd, parsed);
    }

    #[test]
    fn cursor_update_selection_defaults_to_none() {
        let parsed: ClientCommand = serde_json::from_str(
            r#"{"type":"cursor-update","space_id":1,"content_id":2,"position":{"line":3}}"#,
        )
        .unwrap();
        assert_eq!(
            parsed,
            ClientCommand::CursorUpdate {
                space_id: 1,
                content_id: 2,
                position: json!({"line": 3}),
                selection: None,
            }
        );
    }

    #[test]
    fn unknown_command_type_is_rejected() {
        let result: Result<ClientCommand, _> =
            serde_json::from_str(r#"{"type":"subscribe","topic":"anything"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn event_kind_serializes_to_wire_name() {
        let msg = ServerMessage::new(EventKind::UserJoined, json!({"user_id": 5}));
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""event":"user-joined"#));
        assert!(json.contains(r#""user_id":5"#));
    }

    #[test]
    fn event_kind_strings_match_serde_names() {
        for kind in [
            EventKind::UserJoined,
            EventKind::ChangeRequestApplied,
            EventKind::MemberPermissionUpdated,
            EventKind::ContentVersionSaved,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }
}
