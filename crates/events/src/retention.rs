//! Periodic purge of expired groups.
//!
//! Stores without native TTL keep expired rows around (hidden from reads)
//! until this sweeper deletes them.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use loggroup_db::GroupStore;
use tokio_util::sync::CancellationToken;

/// Run the retention sweep loop until `cancel` is triggered.
///
/// The first sweep runs immediately.
pub async fn run(store: Arc<dyn GroupStore>, interval: Duration, cancel: CancellationToken) {
    tracing::info!(
        interval_secs = interval.as_secs(),
        "Log group retention job started"
    );

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Log group retention job stopping");
                break;
            }
            _ = ticker.tick() => {
                match store.purge_expired(Utc::now()).await {
                    Ok(purged) => {
                        if purged > 0 {
                            tracing::info!(purged, "Log group retention: purged expired groups");
                        } else {
                            tracing::debug!("Log group retention: nothing to purge");
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Log group retention: purge failed");
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
