//! Bridge Configuration
//!
//! Configuration types for the bridge, loaded from environment variables.

use std::time::Duration;

use uuid::Uuid;

use crate::application::services::scheduler::SchedulerSettings;

/// Vendor price plan. Plans below `Streamer` stream trades only; `Streamer`
/// and above also stream quotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum CoinApiProduct {
    /// Free plan.
    #[default]
    Free,
    /// Startup plan.
    Startup,
    /// Streamer plan.
    Streamer,
    /// Professional plan.
    Professional,
    /// Enterprise plan.
    Enterprise,
}

impl CoinApiProduct {
    /// Parse a plan name from string (case-insensitive, defaults to Free).
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "startup" => Self::Startup,
            "streamer" => Self::Streamer,
            "professional" => Self::Professional,
            "enterprise" => Self::Enterprise,
            _ => Self::Free,
        }
    }

    /// Get the plan name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Startup => "startup",
            Self::Streamer => "streamer",
            Self::Professional => "professional",
            Self::Enterprise => "enterprise",
        }
    }

    /// Whether the plan includes streaming quotes.
    #[must_use]
    pub fn streams_quotes(&self) -> bool {
        *self >= Self::Streamer
    }

    /// Data types the hello message should request under this plan.
    #[must_use]
    pub fn data_types(&self) -> Vec<String> {
        if self.streams_quotes() {
            vec!["trade".to_string(), "quote".to_string()]
        } else {
            vec!["trade".to_string()]
        }
    }
}

/// Complete bridge configuration.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Vendor API key.
    pub api_key: Uuid,
    /// Vendor price plan.
    pub product: CoinApiProduct,
    /// Streaming endpoint URL.
    pub ws_url: String,
    /// REST endpoint base URL.
    pub rest_url: String,
    /// Coalescing cycle timing.
    pub scheduler: SchedulerSettings,
    /// Capacity of the inbound stream event channel.
    pub event_channel_capacity: usize,
}

impl BridgeConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `COINAPI_API_KEY` is missing or not a UUID.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("COINAPI_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("COINAPI_API_KEY".to_string()))?;

        if api_key.is_empty() {
            return Err(ConfigError::EmptyValue("COINAPI_API_KEY".to_string()));
        }

        let api_key = Uuid::parse_str(&api_key).map_err(|_| ConfigError::InvalidValue {
            var: "COINAPI_API_KEY".to_string(),
            expected: "a UUID",
        })?;

        let product = std::env::var("COINAPI_PRODUCT")
            .map(|s| CoinApiProduct::from_str_case_insensitive(&s))
            .unwrap_or_default();

        let ws_url = std::env::var("COINAPI_WS_URL")
            .unwrap_or_else(|_| "wss://ws.coinapi.io/v1/".to_string());

        let rest_url = std::env::var("COINAPI_REST_URL")
            .unwrap_or_else(|_| "https://rest.coinapi.io".to_string());

        let defaults = SchedulerSettings::default();
        let scheduler = SchedulerSettings {
            debounce: parse_env_duration_millis("COINAPI_SUBSCRIBE_DEBOUNCE_MS", defaults.debounce),
            min_hello_interval: parse_env_duration_secs(
                "COINAPI_MIN_HELLO_INTERVAL_SECS",
                defaults.min_hello_interval,
            ),
            connect_timeout: parse_env_duration_secs(
                "COINAPI_CONNECT_TIMEOUT_SECS",
                defaults.connect_timeout,
            ),
        };

        let event_channel_capacity = parse_env_usize("COINAPI_EVENT_CHANNEL_CAPACITY", 4096);

        Ok(Self {
            api_key,
            product,
            ws_url,
            rest_url,
            scheduler,
            event_channel_capacity,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable has an unparseable value.
    #[error("environment variable {var} must be {expected}")]
    InvalidValue {
        /// Variable name.
        var: String,
        /// What the value should have been.
        expected: &'static str,
    },
}

fn parse_env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_env_duration_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}
