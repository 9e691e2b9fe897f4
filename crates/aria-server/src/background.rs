//! Background maintenance for the Aria server.
//!
//! One periodic task bounds the in-memory state: idle rate-limit buckets
//! are evicted and interaction logs of long-idle users are dropped.

use crate::AppState;
use std::sync::Arc;
use tokio::time::{sleep, Duration};

/// How often maintenance runs.
const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(300);

/// Rate-limit buckets idle longer than this are dropped.
const BUCKET_IDLE_TTL: Duration = Duration::from_secs(3600);

/// Interaction logs of users idle longer than this are dropped.
const USER_IDLE_TTL_SECS: i64 = 3600;

/// Runs the maintenance loop forever.
pub async fn start_maintenance_task(state: Arc<AppState>) {
    tracing::info!(
        interval_secs = MAINTENANCE_INTERVAL.as_secs(),
        "starting maintenance task"
    );

    loop {
        sleep(MAINTENANCE_INTERVAL).await;

        let evicted_buckets = state.rate_limiter.evict_idle(BUCKET_IDLE_TTL);
        let cutoff = chrono::Utc::now() - chrono::Duration::seconds(USER_IDLE_TTL_SECS);
        let evicted_users = state.interactions.evict_idle_users(cutoff);

        if evicted_buckets > 0 || evicted_users > 0 {
            tracing::info!(
                evicted_buckets,
                evicted_users,
                remaining_records = state.interactions.len(),
                "maintenance pass complete"
            );
        }
    }
}
