//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub for [`SpaceEvent`]s. It is
//! shared via `Arc<EventBus>` across the application.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use cospace_core::realtime::EventKind;
use cospace_core::types::DbId;

// ---------------------------------------------------------------------------
// SpaceEvent
// ---------------------------------------------------------------------------

/// Who should receive an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Audience {
    /// Every live connection belonging to one user.
    User(DbId),
    /// Every live connection in a space's room, optionally excluding the
    /// originator so actors do not echo their own actions back.
    Space { space_id: DbId, exclude: Option<DbId> },
}

/// A domain event to be fanned out to connected clients.
///
/// Delivery is best-effort and at-most-once: an offline audience silently
/// misses the event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpaceEvent {
    pub kind: EventKind,
    pub audience: Audience,

    /// Event-specific JSON data, forwarded verbatim to clients.
    pub payload: serde_json::Value,

    /// When the event was created (UTC).
    pub timestamp: DateTime<Utc>,
}

impl SpaceEvent {
    /// An event addressed to a single user's connections.
    pub fn to_user(user_id: DbId, kind: EventKind, payload: serde_json::Value) -> Self {
        Self {
            kind,
            audience: Audience::User(user_id),
            payload,
            timestamp: Utc::now(),
        }
    }

    /// An event addressed to everyone in a space's room.
    pub fn to_space(space_id: DbId, kind: EventKind, payload: serde_json::Value) -> Self {
        Self {
            kind,
            audience: Audience::Space {
                space_id,
                exclude: None,
            },
            payload,
            timestamp: Utc::now(),
        }
    }

    /// Exclude the originator from a space-addressed event.
    pub fn excluding(mut self, user_id: DbId) -> Self {
        if let Audience::Space { ref mut exclude, .. } = self.audience {
            *exclude = Some(user_id);
        }
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published [`SpaceEvent`].
pub struct EventBus {
    sender: broadcast::Sender<SpaceEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped;
    /// notifications are transient by design.
    pub fn publish(&self, event: SpaceEvent) {
        // Ignore the SendError — it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<SpaceEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(SpaceEvent::to_user(
            7,
            EventKind::ChangeRequestReviewed,
            json!({"change_request_id": 3}),
        ));

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.kind, EventKind::ChangeRequestReviewed);
        assert_eq!(received.audience, Audience::User(7));
        assert_eq!(received.payload["change_request_id"], 3);
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(SpaceEvent::to_space(1, EventKind::SpaceUpdated, json!({})));

        let e1 = rx1.recv().await.expect("subscriber 1 should receive");
        let e2 = rx2.recv().await.expect("subscriber 2 should receive");

        assert_eq!(e1.kind, EventKind::SpaceUpdated);
        assert_eq!(e2.kind, EventKind::SpaceUpdated);
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(SpaceEvent::to_space(1, EventKind::UserJoined, json!({})));
    }

    #[test]
    fn excluding_targets_only_space_audiences() {
        let event =
            SpaceEvent::to_space(1, EventKind::ContentUpdated, json!({})).excluding(9);
        assert_eq!(
            event.audience,
            Audience::Space {
                space_id: 1,
                exclude: Some(9)
            }
        );

        // A user audience is unchanged.
        let direct = SpaceEvent::to_user(2, EventKind::ContentLocked, json!({})).excluding(9);
        assert_eq!(direct.audience, Audience::User(2));
    }
}
