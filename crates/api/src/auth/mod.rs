//! Authentication: JWT validation for HTTP requests and WebSocket upgrades.
//!
//! Identity is provided externally; callers arrive with a signed token and
//! there is no login or user store here.

pub mod jwt;
