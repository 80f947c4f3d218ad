//! WebSocket infrastructure for real-time collaboration.
//!
//! Provides connection management, per-space presence tracking, the
//! event-bus fan-out, heartbeat monitoring, and the HTTP upgrade handler
//! used by Axum routes.

mod fanout;
mod handler;
mod heartbeat;
pub mod manager;
pub mod presence;

pub use fanout::NotificationFanout;
pub use handler::ws_handler;
pub use heartbeat::start_heartbeat;
pub use manager::WsManager;
