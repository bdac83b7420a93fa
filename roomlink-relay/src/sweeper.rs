use crate::relay::Relay;
use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

/// Force-close sessions that stopped heartbeating
pub fn spawn_heartbeat_watchdog(relay: Relay) -> JoinHandle<()> {
    let period = relay.config().watchdog_interval();
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match relay.sweep_stale_sessions(Utc::now()) {
                Ok(stale) if !stale.is_empty() => {
                    debug!(count = stale.len(), "Closed silent sessions")
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Heartbeat sweep failed"),
            }
        }
    })
}

/// Close rooms that saw no membership or signaling activity for too long
pub fn spawn_room_sweeper(relay: Relay) -> JoinHandle<()> {
    let period = relay.config().room_sweep_interval;
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick fires immediately; nothing can be stale yet
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = relay.sweep_inactive_rooms(Utc::now()) {
                warn!(error = %e, "Room sweep failed");
            }
        }
    })
}
