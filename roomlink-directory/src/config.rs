use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEV_JWT_SECRET: &str = "roomlink-dev-secret";

/// Directory service configuration
#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    pub bind_addr: SocketAddr,

    /// sled database directory
    pub db_path: PathBuf,

    /// HS256 signing secret for session tokens
    pub jwt_secret: String,

    pub token_ttl: Duration,

    /// Rooms idle for longer than this are purged
    pub retention: Duration,

    pub sweep_interval: Duration,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3001)),
            db_path: PathBuf::from("roomlink-directory.db"),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            token_ttl: Duration::from_secs(24 * 60 * 60),
            retention: Duration::from_secs(24 * 60 * 60),
            sweep_interval: Duration::from_secs(60 * 60),
        }
    }
}

impl DirectoryConfig {
    pub fn new(bind_addr: SocketAddr, db_path: impl Into<PathBuf>) -> Self {
        Self {
            bind_addr,
            db_path: db_path.into(),
            ..Default::default()
        }
    }

    pub fn with_jwt_secret(mut self, secret: impl Into<String>) -> Self {
        self.jwt_secret = secret.into();
        self
    }

    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }
}

pub(crate) fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::milliseconds(duration.as_millis().min(i64::MAX as u128) as i64)
}
