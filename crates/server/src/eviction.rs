use std::{sync::Arc, time::Duration};

use rate_limit::UsageTracker;
use tokio::{task::JoinHandle, time::MissedTickBehavior};

/// Periodically drops usage records that can no longer affect an admission.
pub(crate) fn spawn_sweeper(tracker: Arc<UsageTracker>, interval: Duration) -> JoinHandle<()> {
    log::debug!("Evicting stale usage records every {interval:?}");

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            tracker.evict_stale();
        }
    })
}
