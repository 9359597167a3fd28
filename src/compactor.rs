use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::store::{Store, StoreError};

/// Compact once `threshold` appends have piled up since the last rewrite.
/// Returns whether a compaction ran.
pub async fn compact_if_due(store: &Store, threshold: u64) -> Result<bool, StoreError> {
    let stats = store.wal_stats().await?;
    if stats.appends_since_compact < threshold {
        return Ok(false);
    }
    store.compact_wal().await?;
    metrics::counter!(crate::observability::WAL_COMPACTIONS_TOTAL).increment(1);
    info!(
        "compacted WAL after {} appends ({} bytes)",
        stats.appends_since_compact, stats.bytes_since_compact
    );
    Ok(true)
}

/// Background task that checks the WAL every `every` and compacts it when due.
pub async fn run_compactor(store: Arc<Store>, threshold: u64, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        if let Err(e) = compact_if_due(&store, threshold).await {
            tracing::warn!("WAL compaction failed: {e}");
        }
    }
}
