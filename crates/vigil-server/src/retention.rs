use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use vigil_storage::MetricStore;

const PURGE_INTERVAL: Duration = Duration::from_secs(3600);

/// Deletes metric points older than `retention_days` before `now`.
pub async fn purge_expired(
    store: &dyn MetricStore,
    retention_days: u32,
    now: DateTime<Utc>,
) -> vigil_storage::Result<u64> {
    let cutoff = now - chrono::Duration::days(i64::from(retention_days));
    store.purge_before(cutoff).await
}

/// Runs [`purge_expired`] every hour until the returned task is aborted.
pub fn spawn_purge_task(store: Arc<dyn MetricStore>, retention_days: u32) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = interval(PURGE_INTERVAL);
        loop {
            tick.tick().await;
            match purge_expired(store.as_ref(), retention_days, Utc::now()).await {
                Ok(removed) if removed > 0 => {
                    tracing::info!(removed, retention_days, "Purged expired metric points")
                }
                Err(e) => tracing::error!(error = %e, "Metric purge failed"),
                _ => {}
            }
        }
    })
}
