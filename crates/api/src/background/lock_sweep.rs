//! Periodic tidy of expired advisory locks.
//!
//! Expiry is lazy everywhere it matters: a past-expiry lock is already
//! treated as absent by reads and by `acquire`'s UPDATE guard, so this sweep
//! only clears stale rows and tells the displaced holders. Racing an
//! `acquire` is harmless; both sides re-check expiry in their guards.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use cospace_core::realtime::EventKind;
use cospace_db::repositories::ContentRepo;
use cospace_events::{EventBus, SpaceEvent};

/// Run the expired-lock sweep loop until `cancel` is triggered.
pub async fn run(
    pool: PgPool,
    event_bus: Arc<EventBus>,
    interval_secs: u64,
    cancel: CancellationToken,
) {
    tracing::info!(interval_secs, "Lock sweep job started");

    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Lock sweep job stopping");
                break;
            }
            _ = interval.tick() => {
                match ContentRepo::sweep_expired_locks(&pool).await {
                    Ok(expired) if expired.is_empty() => {
                        tracing::debug!("Lock sweep: nothing to clear");
                    }
                    Ok(expired) => {
                        tracing::info!(count = expired.len(), "Lock sweep: cleared expired locks");
                        for lock in expired {
                            event_bus.publish(SpaceEvent::to_space(
                                lock.space_id,
                                EventKind::ContentUnlocked,
                                serde_json::json!({
                                    "space_id": lock.space_id,
                                    "content_id": lock.content_id,
                                    "reason": "expired",
                                }),
                            ));
                            event_bus.publish(SpaceEvent::to_user(
                                lock.holder,
                                EventKind::ContentUnlocked,
                                serde_json::json!({
                                    "space_id": lock.space_id,
                                    "content_id": lock.content_id,
                                    "reason": "expired",
                                }),
                            ));
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Lock sweep failed");
                    }
                }
            }
        }
    }
}
