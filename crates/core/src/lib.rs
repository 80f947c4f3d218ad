//! Pure domain layer for the collaboration coordination core.
//!
//! This crate has no internal dependencies and no I/O: it defines the shared
//! types, the typed error taxonomy, the permission engine, the lifecycle
//! state machines (change requests, invites, join requests, membership),
//! advisory-lock semantics, and the real-time wire protocol. The db and api
//! crates enforce these rules against the durable store and the connection
//! layer.

pub mod change_request;
pub mod error;
pub mod invite;
pub mod join_request;
pub mod locks;
pub mod membership;
pub mod permissions;
pub mod realtime;
pub mod types;
