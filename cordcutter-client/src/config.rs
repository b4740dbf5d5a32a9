//! Client configuration for Cordcutter
//!
//! [`ClientOptions`] are fixed for the life of a [`Client`](crate::Client);
//! [`ConnectOptions`] are supplied to each connect call. Both start from
//! defaults, take chained setters, and deserialize from partial documents
//! with missing keys filled from the defaults.

use cordcutter_core::codec::{Codec, Encoding, COMPRESSION_AVAILABLE};
use cordcutter_core::error::ConfigError;
use cordcutter_core::payload::{Identify, IdentifyProperties};
use cordcutter_core::protocol::constants;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::level_filters::LevelFilter;

/// Verbosity of the client's own log output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Everything down to debug output
    All,
    /// Warnings and errors only
    #[default]
    Quiet,
    /// Nothing
    None,
}

impl LogLevel {
    /// Level filter for this verbosity
    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::All => LevelFilter::DEBUG,
            LogLevel::Quiet => LevelFilter::WARN,
            LogLevel::None => LevelFilter::OFF,
        }
    }
}

/// Options fixed when the client is built
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    /// Timeout for the gateway URL lookup
    #[serde(with = "duration_ms")]
    pub endpoint_timeout: Duration,
    /// Log verbosity
    pub log_level: LogLevel,
    /// Authentication token
    pub token: String,
    /// Base URL of the HTTP API
    pub api_url: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            endpoint_timeout: constants::DEFAULT_ENDPOINT_TIMEOUT,
            log_level: LogLevel::default(),
            token: String::new(),
            api_url: constants::API_BASE_URL.to_string(),
        }
    }
}

impl ClientOptions {
    /// Options with the given token and everything else defaulted
    pub fn new(token: impl Into<String>) -> Self {
        Self::default().token(token)
    }

    /// Validate the options
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "token".to_string(),
            });
        }

        if self.endpoint_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "endpoint_timeout".to_string(),
                value: "0ms".to_string(),
            });
        }

        if self.api_url.is_empty() {
            return Err(ConfigError::MissingField {
                field: "api_url".to_string(),
            });
        }

        Ok(())
    }

    /// Set the authentication token
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }

    /// Set the gateway lookup timeout
    pub fn endpoint_timeout(mut self, timeout: Duration) -> Self {
        self.endpoint_timeout = timeout;
        self
    }

    /// Set log verbosity
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    /// Set the HTTP API base URL
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("endpoint_timeout", &self.endpoint_timeout)
            .field("log_level", &self.log_level)
            .field("token", &"<redacted>")
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// Handshake and encoding options
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GatewayOptions {
    /// Compress JSON payloads with zlib
    pub compress: bool,
    /// Wire encoding
    pub encoding: Encoding,
    /// Member count above which offline members are not sent
    pub large_threshold: u32,
    /// Properties reported in Identify
    pub properties: IdentifyProperties,
    /// `[shard_id, shard_count]`; a count of 0 disables sharding
    pub shard: [u32; 2],
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            compress: COMPRESSION_AVAILABLE,
            encoding: Encoding::default(),
            large_threshold: constants::DEFAULT_LARGE_THRESHOLD,
            properties: IdentifyProperties::default(),
            shard: [0, 0],
        }
    }
}

impl GatewayOptions {
    /// Validate the options against the protocol limits and this build's features
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(constants::MIN_LARGE_THRESHOLD..=constants::MAX_LARGE_THRESHOLD)
            .contains(&self.large_threshold)
        {
            return Err(ConfigError::InvalidValue {
                field: "gateway.large_threshold".to_string(),
                value: self.large_threshold.to_string(),
            });
        }

        let [shard_id, shard_count] = self.shard;
        if shard_count > 0 && shard_id >= shard_count {
            return Err(ConfigError::InvalidValue {
                field: "gateway.shard".to_string(),
                value: format!("[{}, {}]", shard_id, shard_count),
            });
        }

        self.codec().map(|_| ())
    }

    /// Codec for these settings
    pub fn codec(&self) -> Result<Codec, ConfigError> {
        Codec::new(self.encoding, self.compress)
    }

    /// Identify data for a new session
    pub fn identify(&self, token: &str) -> Identify {
        Identify {
            token: token.to_string(),
            properties: self.properties.clone(),
            compress: self.compress,
            large_threshold: self.large_threshold,
            shard: Identify::shard_field(self.shard[0], self.shard[1]),
        }
    }

    /// Enable or disable compression
    pub fn compress(mut self, enabled: bool) -> Self {
        self.compress = enabled;
        self
    }

    /// Set the wire encoding
    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Set the large threshold
    pub fn large_threshold(mut self, threshold: u32) -> Self {
        self.large_threshold = threshold;
        self
    }

    /// Set the identify properties
    pub fn properties(mut self, properties: IdentifyProperties) -> Self {
        self.properties = properties;
        self
    }

    /// Set the shard pair
    pub fn shard(mut self, shard_id: u32, shard_count: u32) -> Self {
        self.shard = [shard_id, shard_count];
        self
    }
}

/// Options for one connect call
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectOptions {
    /// Handshake and encoding options
    pub gateway: GatewayOptions,
    /// Extra attempts after the first failed open
    pub reconnect_tries: u32,
    /// Time allowed for each open attempt
    #[serde(with = "duration_ms")]
    pub timeout: Duration,
    /// Reconnect when a heartbeat goes unacknowledged until the next one is due
    pub detect_zombies: bool,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            gateway: GatewayOptions::default(),
            reconnect_tries: constants::DEFAULT_RECONNECT_TRIES,
            timeout: constants::DEFAULT_CONNECT_TIMEOUT,
            detect_zombies: false,
        }
    }
}

impl ConnectOptions {
    /// Validate the options
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "timeout".to_string(),
                value: "0ms".to_string(),
            });
        }

        self.gateway.validate()
    }

    /// Set the gateway options
    pub fn gateway(mut self, gateway: GatewayOptions) -> Self {
        self.gateway = gateway;
        self
    }

    /// Set the number of extra connect attempts
    pub fn reconnect_tries(mut self, tries: u32) -> Self {
        self.reconnect_tries = tries;
        self
    }

    /// Set the per-attempt timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enable or disable zombie connection detection
    pub fn detect_zombies(mut self, enabled: bool) -> Self {
        self.detect_zombies = enabled;
        self
    }
}

/// Durations written as integer milliseconds
mod duration_ms {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
