//! In-memory presence registry: which connections are in which space room.
//!
//! Presence is connection-scoped, not user-scoped: a user with two tabs has
//! two entries in a room, and only leaves the room (for notification
//! purposes) when the *last* of their connections does. State lives only in
//! memory and is rebuilt naturally as clients reconnect after a restart.

use std::collections::HashMap;

use tokio::sync::RwLock;

use cospace_core::types::DbId;

/// Tracks room membership for all live WebSocket connections.
///
/// Shared via `Arc` between the connection handlers and the fan-out.
pub struct PresenceTracker {
    /// space_id -> (conn_id -> user_id)
    rooms: RwLock<HashMap<DbId, HashMap<String, DbId>>>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Add a connection to a space's room.
    ///
    /// Returns `true` when this is the user's *first* connection in the
    /// room, i.e. the user just became present and others should be told.
    pub async fn join(&self, space_id: DbId, conn_id: &str, user_id: DbId) -> bool {
        let mut rooms = self.rooms.write().await;
        let room = rooms.entry(space_id).or_default();
        let already_present = room.values().any(|&uid| uid == user_id);
        room.insert(conn_id.to_string(), user_id);
        !already_present
    }

    /// Remove a connection from a space's room.
    ///
    /// Returns `Some(user_id)` when the user has no remaining connections
    /// in the room, i.e. the user just became absent.
    pub async fn leave(&self, space_id: DbId, conn_id: &str) -> Option<DbId> {
        let mut rooms = self.rooms.write().await;
        let room = rooms.get_mut(&space_id)?;
        let user_id = room.remove(conn_id)?;
        let fully_left = !room.values().any(|&uid| uid == user_id);
        if room.is_empty() {
            rooms.remove(&space_id);
        }
        fully_left.then_some(user_id)
    }

    /// Remove a connection from every room it is in (on disconnect).
    ///
    /// Returns the `(space_id, user_id)` pairs where the user thereby left
    /// the room entirely.
    pub async fn disconnect(&self, conn_id: &str) -> Vec<(DbId, DbId)> {
        let mut rooms = self.rooms.write().await;
        let mut departures = Vec::new();

        rooms.retain(|&space_id, room| {
            if let Some(user_id) = room.remove(conn_id) {
                if !room.values().any(|&uid| uid == user_id) {
                    departures.push((space_id, user_id));
                }
            }
            !room.is_empty()
        });

        departures
    }

    /// Distinct user ids currently present in a space's room.
    pub async fn list_active(&self, space_id: DbId) -> Vec<DbId> {
        let rooms = self.rooms.read().await;
        let Some(room) = rooms.get(&space_id) else {
            return Vec::new();
        };
        let mut users: Vec<DbId> = room.values().copied().collect();
        users.sort_unstable();
        users.dedup();
        users
    }

    /// All `(conn_id, user_id)` pairs in a space's room.
    pub async fn connections_in(&self, space_id: DbId) -> Vec<(String, DbId)> {
        let rooms = self.rooms.read().await;
        rooms
            .get(&space_id)
            .map(|room| room.iter().map(|(c, &u)| (c.clone(), u)).collect())
            .unwrap_or_default()
    }

    /// Whether a connection is currently in a space's room.
    pub async fn is_member(&self, space_id: DbId, conn_id: &str) -> bool {
        let rooms = self.rooms.read().await;
        rooms
            .get(&space_id)
            .is_some_and(|room| room.contains_key(conn_id))
    }
}

impl Default for PresenceTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_join_reports_new_presence() {
        let presence = PresenceTracker::new();
        assert!(presence.join(1, "conn-a", 10).await);
        assert_eq!(presence.list_active(1).await, vec![10]);
    }

    #[tokio::test]
    async fn second_tab_is_not_a_new_presence() {
        let presence = PresenceTracker::new();
        assert!(presence.join(1, "conn-a", 10).await);
        assert!(!presence.join(1, "conn-b", 10).await);

        // Closing one tab does not remove the user from the room.
        assert_eq!(presence.leave(1, "conn-a").await, None);
        assert_eq!(presence.list_active(1).await, vec![10]);

        // Closing the last tab does.
        assert_eq!(presence.leave(1, "conn-b").await, Some(10));
        assert!(presence.list_active(1).await.is_empty());
    }

    #[tokio::test]
    async fn leave_unknown_room_or_connection_is_a_no_op() {
        let presence = PresenceTracker::new();
        assert_eq!(presence.leave(1, "conn-a").await, None);

        presence.join(1, "conn-a", 10).await;
        assert_eq!(presence.leave(1, "conn-b").await, None);
        assert_eq!(presence.list_active(1).await, vec![10]);
    }

    #[tokio::test]
    async fn disconnect_sweeps_all_rooms() {
        let presence = PresenceTracker::new();
        presence.join(1, "conn-a", 10).await;
        presence.join(2, "conn-a", 10).await;
        presence.join(2, "conn-b", 10).await;

        let mut departures = presence.disconnect("conn-a").await;
        departures.sort_unstable();

        // Fully left space 1; still present in space 2 via conn-b.
        assert_eq!(departures, vec![(1, 10)]);
        assert!(presence.list_active(1).await.is_empty());
        assert_eq!(presence.list_active(2).await, vec![10]);
    }

    #[tokio::test]
    async fn connections_and_membership_track_the_room() {
        let presence = PresenceTracker::new();
        presence.join(1, "conn-a", 10).await;
        presence.join(1, "conn-b", 20).await;

        let mut conns = presence.connections_in(1).await;
        conns.sort();
        assert_eq!(
            conns,
            vec![("conn-a".to_string(), 10), ("conn-b".to_string(), 20)]
        );

        assert!(presence.is_member(1, "conn-a").await);
        assert!(!presence.is_member(1, "conn-c").await);
        assert!(!presence.is_member(2, "conn-a").await);
    }
}
