//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument. Every lifecycle transition is a
//! conditional update guarded on the expected current state, and every
//! structural membership change recomputes the space's stats columns inside
//! the same transaction.

pub mod change_request_repo;
pub mod collaborator_repo;
pub mod content_repo;
pub mod invite_repo;
pub mod join_request_repo;
pub mod space_repo;

pub use change_request_repo::ChangeRequestRepo;
pub use collaborator_repo::CollaboratorRepo;
pub use content_repo::ContentRepo;
pub use invite_repo::InviteRepo;
pub use join_request_repo::JoinRequestRepo;
pub use space_repo::SpaceRepo;
