//! Logging setup for router processes

use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::RouterConfig;
use crate::error::{CallRouterError, Result};

/// Subscriber settings resolved from [`RouterConfig`]
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Floor for every target; `RUST_LOG` can add finer directives
    pub level: Level,
    /// One JSON object per line on stdout
    pub json: bool,
    /// Source file and line on each record
    pub file_info: bool,
    /// Records for routing spans opening and closing
    pub log_spans: bool,
    pub app_name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: Level::INFO,
            json: false,
            file_info: false,
            log_spans: false,
            app_name: "rvoip-call-router".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn new(level: Level, app_name: impl Into<String>) -> Self {
        LoggingConfig {
            level,
            app_name: app_name.into(),
            ..Default::default()
        }
    }

    /// Build from the `[logging]` and `[general]` sections of the router config
    pub fn from_router_config(config: &RouterConfig) -> Result<Self> {
        let mut logging = Self::new(parse_log_level(&config.logging.level)?, config.general.app_name.clone());
        logging.json = config.logging.json;
        logging.file_info = config.logging.file_info;
        logging.log_spans = config.logging.spans;
        Ok(logging)
    }
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` directives are honoured on top of the configured level. Fails if a
/// global subscriber is already installed.
pub fn setup_logging(config: LoggingConfig) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive(config.level.into());

    let span_events = if config.log_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_span_events(span_events)
        .with_file(config.file_info)
        .with_line_number(config.file_info);

    let installed = if config.json {
        builder.with_writer(std::io::stdout).json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| CallRouterError::configuration(format!("Failed to install logger: {}", e)))?;

    log_welcome(&config.app_name, env!("CARGO_PKG_VERSION"));
    Ok(())
}

/// Parse a log level from a string
pub fn parse_log_level(level: &str) -> Result<Level> {
    Level::from_str(level).map_err(|_| CallRouterError::configuration(format!("Invalid log level: {}", level)))
}

pub fn log_welcome(app_name: &str, version: &str) {
    tracing::info!("Starting {} v{}", app_name, version);
}
