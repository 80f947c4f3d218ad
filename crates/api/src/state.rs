use std::sync::Arc;

use crate::config::ServerConfig;
use crate::ws::presence::PresenceTracker;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: cospace_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// WebSocket connection manager.
    pub ws_manager: Arc<WsManager>,
    /// In-memory room/presence registry for connected users.
    pub presence: Arc<PresenceTracker>,
    /// Event bus feeding the notification fan-out.
    pub event_bus: Arc<cospace_events::EventBus>,
}
