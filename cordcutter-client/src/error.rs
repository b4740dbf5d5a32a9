//! Error types for the gateway client
//!
//! Only the connect call surfaces errors to the caller. Everything that goes
//! wrong after the first successful open is retried inside the session and
//! reported through logs.

use cordcutter_core::error::{CodecError, ConfigError, ProtocolError};
use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Gateway client errors
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The gateway URL could not be resolved
    #[error("Gateway resolution failed: {0}")]
    Resolution(String),

    /// The transport failed to open or broke
    #[error("{0}")]
    Transport(String),

    /// A connect attempt did not open in time
    #[error("timeout")]
    Timeout,

    /// Invalid options
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A payload could not be encoded
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// The session task is gone
    #[error("Gateway session closed")]
    Closed,

    /// Other core errors
    #[error("Core error: {0}")]
    Core(#[from] cordcutter_core::Error),
}

impl GatewayError {
    /// Check if this error came from an attempt running out of time
    pub fn is_timeout(&self) -> bool {
        matches!(self, GatewayError::Timeout)
    }
}

impl From<ProtocolError> for GatewayError {
    fn from(err: ProtocolError) -> Self {
        GatewayError::Core(err.into())
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Resolution("timeout".to_string())
        } else {
            GatewayError::Resolution(err.to_string())
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for GatewayError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        GatewayError::Transport(err.to_string())
    }
}
