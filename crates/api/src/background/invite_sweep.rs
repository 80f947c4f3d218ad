//! Periodic expiry of stale pending invites.
//!
//! The accept/decline paths re-check `expires_at` in their own CAS guards,
//! so this sweep is tidying, not correctness: it flips pending-past-expiry
//! rows to 'expired' so listings and resolves stop offering them.

use std::time::Duration;

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use cospace_db::repositories::InviteRepo;

/// Run the invite expiry sweep loop until `cancel` is triggered.
pub async fn run(pool: PgPool, interval_secs: u64, cancel: CancellationToken) {
    tracing::info!(interval_secs, "Invite sweep job started");

    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Invite sweep job stopping");
                break;
            }
            _ = interval.tick() => {
                match InviteRepo::purge_expired(&pool).await {
                    Ok(0) => {
                        tracing::debug!("Invite sweep: nothing to expire");
                    }
                    Ok(expired) => {
                        tracing::info!(expired, "Invite sweep: expired stale invites");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Invite sweep failed");
                    }
                }
            }
        }
    }
}
