//! Router configuration
//!
//! Settings are layered: built-in defaults, then an optional TOML or JSON file,
//! then `CALL_ROUTER__*` environment variables
//! (e.g. `CALL_ROUTER__GENERAL__DEVICE_WEBSOCKET_URL`).

use serde::{Deserialize, Serialize};

use crate::error::{CallRouterError, Result};
use crate::logging::parse_log_level;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "CALL_ROUTER";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    pub general: GeneralConfig,
    pub events: EventConfig,
    pub logging: LogSettings,
}

/// General router settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Application name used in log output
    pub app_name: String,
    /// WebRTC device endpoint handed to browsers when they come online
    pub device_websocket_url: Option<String>,
    /// How many ended calls are remembered before the oldest are forgotten
    pub ended_call_retention: usize,
}

/// Event plumbing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    /// Buffer size of the router event broadcast channel
    pub bus_capacity: usize,
    /// Buffer size of the inbound media / telephony event channels
    pub inbound_capacity: usize,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
    pub json: bool,
    /// Include source file and line
    pub file_info: bool,
    /// Log routing spans as they open and close
    pub spans: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            app_name: "rvoip-call-router".to_string(),
            device_websocket_url: None,
            ended_call_retention: 1000,
        }
    }
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            bus_capacity: 1000,
            inbound_capacity: 256,
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file_info: false,
            spans: false,
        }
    }
}

impl RouterConfig {
    /// Load configuration from defaults, an optional file and the environment
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&RouterConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path));
        }

        let config: RouterConfig = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.events.bus_capacity == 0 {
            return Err(CallRouterError::configuration("events.bus_capacity must be greater than zero"));
        }
        if self.events.inbound_capacity == 0 {
            return Err(CallRouterError::configuration("events.inbound_capacity must be greater than zero"));
        }
        if self.general.ended_call_retention == 0 {
            return Err(CallRouterError::configuration("general.ended_call_retention must be greater than zero"));
        }
        parse_log_level(&self.logging.level)?;
        Ok(())
    }
}
