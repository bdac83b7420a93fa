use crate::domain::Backoff;
use instant::Duration;

/// Client tunables
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Relay websocket endpoint, e.g. `ws://127.0.0.1:3000/ws`
    pub relay_url: String,

    /// Deadline for a link to reach `connected`
    pub negotiation_timeout: Duration,

    pub link_retry: Backoff,

    pub relay_reconnect: Backoff,

    /// Used until the relay announces its own interval
    pub heartbeat_interval: Duration,

    /// Relay silence after which the connection counts as dropped
    pub relay_silence_timeout: Duration,

    /// How often the runtime feeds clock ticks to the manager
    pub tick_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            relay_url: "ws://127.0.0.1:3000/ws".to_string(),
            negotiation_timeout: Duration::from_secs(15),
            link_retry: Backoff::link_retry(),
            relay_reconnect: Backoff::relay_reconnect(),
            heartbeat_interval: Duration::from_secs(30),
            relay_silence_timeout: Duration::from_secs(60),
            tick_interval: Duration::from_millis(250),
        }
    }
}

impl ClientConfig {
    pub fn new(relay_url: impl Into<String>) -> Self {
        Self {
            relay_url: relay_url.into(),
            ..Default::default()
        }
    }

    pub fn with_negotiation_timeout(mut self, timeout: Duration) -> Self {
        self.negotiation_timeout = timeout;
        self
    }

    pub fn with_link_retry(mut self, backoff: Backoff) -> Self {
        self.link_retry = backoff;
        self
    }

    pub fn with_relay_reconnect(mut self, backoff: Backoff) -> Self {
        self.relay_reconnect = backoff;
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_relay_silence_timeout(mut self, timeout: Duration) -> Self {
        self.relay_silence_timeout = timeout;
        self
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }
}
