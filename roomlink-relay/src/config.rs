use roomlink_core::IceServer;
use std::net::SocketAddr;
use std::time::Duration;

/// Relay configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub bind_addr: SocketAddr,

    /// Interval clients are told to heartbeat at
    pub heartbeat_interval: Duration,

    /// Sessions silent for longer than this are force-closed
    pub liveness_timeout: Duration,

    /// Rooms without membership or signaling activity for this long are closed
    pub room_inactivity: Duration,

    pub room_sweep_interval: Duration,

    pub ice_servers: Vec<IceServer>,

    /// Base URL of the directory service to mirror rooms into
    pub directory_url: Option<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            heartbeat_interval: Duration::from_secs(30),
            liveness_timeout: Duration::from_secs(60),
            room_inactivity: Duration::from_secs(60 * 60),
            room_sweep_interval: Duration::from_secs(30 * 60),
            ice_servers: IceServer::default_stun_servers(),
            directory_url: None,
        }
    }
}

impl RelayConfig {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Default::default()
        }
    }

    /// Set the heartbeat interval; the liveness timeout follows at 2x
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self.liveness_timeout = interval * 2;
        self
    }

    pub fn with_liveness_timeout(mut self, timeout: Duration) -> Self {
        self.liveness_timeout = timeout;
        self
    }

    pub fn with_room_inactivity(mut self, window: Duration) -> Self {
        self.room_inactivity = window;
        self
    }

    pub fn with_room_sweep_interval(mut self, interval: Duration) -> Self {
        self.room_sweep_interval = interval;
        self
    }

    pub fn with_ice_servers(mut self, servers: Vec<IceServer>) -> Self {
        self.ice_servers = servers;
        self
    }

    pub fn with_turn_server(mut self, url: String, username: String, credential: String) -> Self {
        self.ice_servers.push(IceServer::turn(url, username, credential));
        self
    }

    pub fn with_directory_url(mut self, url: impl Into<String>) -> Self {
        self.directory_url = Some(url.into());
        self
    }

    /// How often the heartbeat watchdog runs
    pub fn watchdog_interval(&self) -> Duration {
        (self.heartbeat_interval / 2).max(Duration::from_millis(100))
    }
}

pub(crate) fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::milliseconds(duration.as_millis().min(i64::MAX as u128) as i64)
}
