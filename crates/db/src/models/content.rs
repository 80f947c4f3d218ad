//! Shared content, version history, and lock models and DTOs.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

use cospace_core::locks::LockState;
use cospace_core::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// SharedContent
// ---------------------------------------------------------------------------

/// A row from the `shared_content` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SharedContent {
    pub id: DbId,
    pub space_id: DbId,
    pub title: String,
    pub body: Value,
    pub version: i64,
    pub status: String,
    pub locked_by: Option<DbId>,
    pub locked_at: Option<Timestamp>,
    pub lock_expiry: Option<Timestamp>,
    pub created_by: DbId,
    pub last_modified_by: DbId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl SharedContent {
    /// Effective lock state at `now`. A past-expiry lock reads as unlocked.
    pub fn lock_state(&self, now: Timestamp) -> LockState {
        LockState::evaluate(self.locked_by, self.lock_expiry, now)
    }
}

/// DTO for creating content in a space.
#[derive(Debug, Deserialize)]
pub struct CreateContentRequest {
    pub title: String,
    #[serde(default = "empty_body")]
    pub body: Value,
}

fn empty_body() -> Value {
    Value::Object(serde_json::Map::new())
}

/// DTO for a direct edit to content.
#[derive(Debug, Deserialize)]
pub struct UpdateContentRequest {
    pub title: Option<String>,
    pub body: Option<Value>,
}

/// DTO for acquiring a lock.
#[derive(Debug, Default, Deserialize)]
pub struct AcquireLockRequest {
    pub ttl_secs: Option<i64>,
}

// ---------------------------------------------------------------------------
// ContentVersion
// ---------------------------------------------------------------------------

/// A row from the `content_versions` table: the pre-change body snapshot
/// appended on every successful edit or applied change request.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ContentVersion {
    pub id: DbId,
    pub content_id: DbId,
    pub version: i64,
    pub body: Value,
    pub modified_by: DbId,
    pub modified_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Lock query results
// ---------------------------------------------------------------------------

/// Result of a successful lock acquisition. `previous_holder` is set when an
/// expired lock was reclaimed from another user, so the caller can notify
/// the involuntary release.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AcquiredLock {
    pub content_id: DbId,
    pub space_id: DbId,
    pub locked_by: DbId,
    pub lock_expiry: Timestamp,
    pub previous_holder: Option<DbId>,
}

/// An expired lock cleared by the periodic sweep.
#[derive(Debug, Clone, FromRow)]
pub struct ExpiredLock {
    pub content_id: DbId,
    pub space_id: DbId,
    pub holder: DbId,
}
