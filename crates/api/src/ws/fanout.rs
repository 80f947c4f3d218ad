//! Bus-to-socket notification fan-out.
//!
//! A single consumer task subscribes to the [`EventBus`] and resolves each
//! event's audience to live connections: user-addressed events go to every
//! connection of that user, space-addressed events to every connection in
//! the space's room (optionally minus the originator). Delivery is
//! best-effort; offline audiences silently miss events.

use std::sync::Arc;

use axum::extract::ws::Message;
use tokio::sync::broadcast;

use cospace_core::realtime::ServerMessage;
use cospace_events::{Audience, SpaceEvent};

use crate::ws::manager::WsManager;
use crate::ws::presence::PresenceTracker;

pub struct NotificationFanout {
    ws: Arc<WsManager>,
    presence: Arc<PresenceTracker>,
}

impl NotificationFanout {
    pub fn new(ws: Arc<WsManager>, presence: Arc<PresenceTracker>) -> Self {
        Self { ws, presence }
    }

    /// Consume events from the bus until it closes.
    ///
    /// Lagging (the broadcast buffer overflowing under burst load) drops the
    /// oldest events and continues; notifications are transient.
    pub async fn run(self, mut rx: broadcast::Receiver<SpaceEvent>) {
        loop {
            match rx.recv().await {
                Ok(event) => self.deliver(event).await,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Notification fan-out lagged; events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed; notification fan-out stopping");
                    break;
                }
            }
        }
    }

    async fn deliver(&self, event: SpaceEvent) {
        let message = ServerMessage::new(event.kind, event.payload);
        let text = match serde_json::to_string(&message) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize outbound event");
                return;
            }
        };
        let frame = Message::Text(text.into());

        match event.audience {
            Audience::User(user_id) => {
                let sent = self.ws.send_to_user(user_id, frame).await;
                tracing::debug!(user_id, sent, event = message.event.as_str(), "Event delivered");
            }
            Audience::Space { space_id, exclude } => {
                let mut sent = 0;
                for (conn_id, user_id) in self.presence.connections_in(space_id).await {
                    if exclude == Some(user_id) {
                        continue;
                    }
                    if self.ws.send_to_connection(&conn_id, frame.clone()).await {
                        sent += 1;
                    }
                }
                tracing::debug!(space_id, sent, event = message.event.as_str(), "Event delivered");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cospace_core::realtime::EventKind;
    use serde_json::json;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn expect_event(rx: &mut UnboundedReceiver<Message>, kind: &str) {
        let msg = rx.try_recv().expect("a frame should have been delivered");
        let Message::Text(text) = msg else {
            panic!("expected a text frame");
        };
        let parsed: ServerMessage = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.event.as_str(), kind);
    }

    #[tokio::test]
    async fn user_audience_reaches_every_connection_of_that_user() {
        let ws = Arc::new(WsManager::new());
        let presence = Arc::new(PresenceTracker::new());
        let fanout = NotificationFanout::new(ws.clone(), presence);

        let mut rx_a = ws.add("conn-a".into(), 10).await;
        let mut rx_b = ws.add("conn-b".into(), 10).await;
        let mut rx_other = ws.add("conn-c".into(), 20).await;

        fanout
            .deliver(SpaceEvent::to_user(
                10,
                EventKind::ChangeRequestReviewed,
                json!({"change_request_id": 3}),
            ))
            .await;

        expect_event(&mut rx_a, "change-request-reviewed");
        expect_event(&mut rx_b, "change-request-reviewed");
        assert!(rx_other.try_recv().is_err());
    }

    #[tokio::test]
    async fn space_audience_is_scoped_to_the_room() {
        let ws = Arc::new(WsManager::new());
        let presence = Arc::new(PresenceTracker::new());
        let fanout = NotificationFanout::new(ws.clone(), presence.clone());

        let mut rx_in = ws.add("conn-a".into(), 10).await;
        let mut rx_out = ws.add("conn-b".into(), 20).await;
        presence.join(1, "conn-a", 10).await;
        // conn-b is connected but never joined the room.

        fanout
            .deliver(SpaceEvent::to_space(1, EventKind::ContentUpdated, json!({})))
            .await;

        expect_event(&mut rx_in, "content-updated");
        assert!(rx_out.try_recv().is_err());
    }

    #[tokio::test]
    async fn excluded_originator_does_not_echo() {
        let ws = Arc::new(WsManager::new());
        let presence = Arc::new(PresenceTracker::new());
        let fanout = NotificationFanout::new(ws.clone(), presence.clone());

        let mut rx_actor = ws.add("conn-a".into(), 10).await;
        let mut rx_peer = ws.add("conn-b".into(), 20).await;
        presence.join(1, "conn-a", 10).await;
        presence.join(1, "conn-b", 20).await;

        fanout
            .deliver(
                SpaceEvent::to_space(1, EventKind::CursorUpdated, json!({"line": 3}))
                    .excluding(10),
            )
            .await;

        assert!(rx_actor.try_recv().is_err());
        expect_event(&mut rx_peer, "cursor-updated");
    }
}
