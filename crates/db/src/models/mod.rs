//! Row models and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - `Deserialize` request DTOs for the operations that touch the table

pub mod change_request;
pub mod content;
pub mod invite;
pub mod join_request;
pub mod space;
