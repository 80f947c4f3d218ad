//! HTTP request handlers, one module per resource.
//!
//! Handlers are a thin layer: auth extraction, permission checks against the
//! space snapshot, a repository call, and an event published after the
//! mutation commits.

pub mod change_requests;
pub mod collaborators;
pub mod contents;
pub mod invites;
pub mod join_requests;
pub mod locks;
pub mod spaces;

use cospace_core::error::CoreError;
use cospace_core::permissions::SpaceSnapshot;
use cospace_core::types::DbId;
use cospace_db::models::space::Space;
use cospace_db::repositories::SpaceRepo;
use cospace_db::DbPool;

use crate::error::AppResult;

/// Load an active space and its permission snapshot, or 404.
pub(crate) async fn load_space(pool: &DbPool, space_id: DbId) -> AppResult<(Space, SpaceSnapshot)> {
    Ok(SpaceRepo::load_snapshot(pool, space_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "space",
            id: space_id,
        })?)
}
