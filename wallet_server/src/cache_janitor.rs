use std::time::Duration;

use log::*;
use tokio::task::JoinHandle;
use wallet_engine::ReconciliationCache;

const MIN_JANITOR_PERIOD: Duration = Duration::from_secs(1);

/// Starts the cache janitor. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Expired entries are also dropped when they are read, so the janitor only bounds the memory held by keys that are
/// never asked for again.
pub fn start_cache_janitor(cache: ReconciliationCache, period: Duration) -> JoinHandle<()> {
    // `interval` panics on a zero period
    let period = period.max(MIN_JANITOR_PERIOD);
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(period);
        info!("🧹️ Reconciliation cache janitor started");
        loop {
            timer.tick().await;
            let purged = cache.purge_expired();
            debug!("🧹️ Purged {purged} expired reconciliation results. {} remain", cache.len());
        }
    })
}
