use super::error::{CliError, Result};
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const ROOMLINK_CRATES: [&str; 5] = [
    "roomlink_core",
    "roomlink_relay",
    "roomlink_directory",
    "roomlink_client",
    "roomlink_cli",
];

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Level for everything outside roomlink
    pub default_level: Level,
    /// Level for the roomlink crates
    pub crate_level: Level,
    pub json_format: bool,
    /// Log span close events with their timings
    pub show_spans: bool,
    pub show_thread_ids: bool,
    pub show_targets: bool,

    #[cfg(feature = "console")]
    pub enable_console: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_level: Level::INFO,
            crate_level: Level::INFO,
            json_format: false,
            show_spans: false,
            show_thread_ids: false,
            show_targets: true,
            #[cfg(feature = "console")]
            enable_console: false,
        }
    }
}

impl LogConfig {
    /// Development configuration (verbose roomlink crates, human-readable)
    pub fn dev() -> Self {
        Self {
            crate_level: Level::DEBUG,
            show_spans: true,
            show_thread_ids: true,
            ..Default::default()
        }
    }

    /// One JSON object per line, for log shippers
    pub fn with_json(mut self) -> Self {
        self.json_format = true;
        self
    }

    pub fn with_crate_level(mut self, level: Level) -> Self {
        self.crate_level = level;
        self
    }

    /// Enable tokio console
    #[cfg(feature = "console")]
    pub fn with_console(mut self) -> Self {
        self.enable_console = true;
        self
    }

    /// `RUST_LOG` wins; otherwise the configured levels
    pub fn filter_directives(&self) -> String {
        let mut directives = vec![self.default_level.to_string().to_lowercase()];
        let crate_level = self.crate_level.to_string().to_lowercase();
        directives.extend(
            ROOMLINK_CRATES
                .iter()
                .map(|name| format!("{}={}", name, crate_level)),
        );
        directives.join(",")
    }

    fn env_filter(&self) -> Result<EnvFilter> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => EnvFilter::try_new(self.filter_directives())
                .map_err(|e| CliError::Logging(e.to_string())),
        }
    }

    pub fn init(self) -> Result<()> {
        let env_filter = self.env_filter()?;
        let span_events = if self.show_spans {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        let json_layer = self.json_format.then(|| {
            fmt::layer()
                .json()
                .with_target(self.show_targets)
                .with_thread_ids(self.show_thread_ids)
                .with_span_events(span_events.clone())
        });
        let fmt_layer = (!self.json_format).then(|| {
            fmt::layer()
                .with_target(self.show_targets)
                .with_thread_ids(self.show_thread_ids)
                .with_span_events(span_events)
        });

        let registry = tracing_subscriber::registry()
            .with(env_filter)
            .with(json_layer)
            .with(fmt_layer);

        #[cfg(feature = "console")]
        if self.enable_console {
            let console_layer = console_subscriber::ConsoleLayer::builder()
                .server_addr(([127, 0, 0, 1], 6669))
                .spawn();
            return registry
                .with(console_layer)
                .try_init()
                .map_err(|e| CliError::Logging(e.to_string()));
        }

        registry
            .try_init()
            .map_err(|e| CliError::Logging(e.to_string()))
    }
}
