//! Cospace event bus.
//!
//! Building blocks for real-time notification fan-out:
//!
//! - [`EventBus`] — in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`SpaceEvent`] — the canonical domain event envelope, carrying the
//!   resolved audience (a single user or a space room).
//!
//! Handlers publish strictly after their database transaction commits; the
//! API's fan-out task subscribes and delivers over live WebSocket
//! connections. Events are transient and never persisted.

pub mod bus;

pub use bus::{Audience, EventBus, SpaceEvent};
