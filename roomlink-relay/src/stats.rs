use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Process-lifetime counters for `/api/stats`
#[derive(Debug, Default)]
pub struct RelayStats {
    sessions_opened: AtomicU64,
    rooms_opened: AtomicU64,
    signals_relayed: AtomicU64,
    signals_rejected: AtomicU64,
    connections_succeeded: AtomicU64,
    connections_failed: AtomicU64,
    nat_types: Mutex<HashMap<String, u64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub live_sessions: usize,
    pub live_rooms: usize,
    pub sessions_opened: u64,
    pub rooms_opened: u64,
    pub signals_relayed: u64,
    pub signals_rejected: u64,
    pub connections_succeeded: u64,
    pub connections_failed: u64,
    pub nat_types: HashMap<String, u64>,
}

impl RelayStats {
    pub fn session_opened(&self) {
        self.sessions_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn room_opened(&self) {
        self.rooms_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn signal_relayed(&self) {
        self.signals_relayed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn signal_rejected(&self) {
        self.signals_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_report(&self, success: bool, nat_type: Option<&str>) {
        if success {
            self.connections_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.connections_failed.fetch_add(1, Ordering::Relaxed);
        }

        let nat_type = nat_type.unwrap_or("unknown").to_lowercase();
        if let Ok(mut nat_types) = self.nat_types.lock() {
            *nat_types.entry(nat_type).or_insert(0) += 1;
        }
    }

    pub fn snapshot(&self, live_sessions: usize, live_rooms: usize) -> StatsSnapshot {
        StatsSnapshot {
            live_sessions,
            live_rooms,
            sessions_opened: self.sessions_opened.load(Ordering::Relaxed),
            rooms_opened: self.rooms_opened.load(Ordering::Relaxed),
            signals_relayed: self.signals_relayed.load(Ordering::Relaxed),
            signals_rejected: self.signals_rejected.load(Ordering::Relaxed),
            connections_succeeded: self.connections_succeeded.load(Ordering::Relaxed),
            connections_failed: self.connections_failed.load(Ordering::Relaxed),
            nat_types: self
                .nat_types
                .lock()
                .map(|n| n.clone())
                .unwrap_or_default(),
        }
    }
}
