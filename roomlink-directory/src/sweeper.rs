use crate::directory::Directory;
use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::warn;

/// Purge stale room records on a fixed interval, starting immediately
pub fn spawn_retention_sweeper(directory: Directory) -> JoinHandle<()> {
    let period = directory.config().sweep_interval;
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let directory = directory.clone();
            match tokio::task::spawn_blocking(move || directory.sweep(Utc::now())).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => warn!(error = %e, "Retention sweep failed"),
                Err(e) => warn!(error = %e, "Retention sweep task panicked"),
            }
        }
    })
}
