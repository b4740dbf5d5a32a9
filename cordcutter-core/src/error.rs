//! Error types for Cordcutter
//!
//! This module defines the error types shared by the payload model and the
//! wire codecs. The session client wraps these in its own error type.

#![allow(missing_docs)]

use crate::protocol::OpCode;
use thiserror::Error;

/// Result type alias for Cordcutter core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Codec errors
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Protocol errors
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Failures turning a payload into wire bytes or back
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The payload could not be serialized
    #[error("failed to encode payload: {0}")]
    Encode(String),

    /// The frame could not be parsed into a payload
    #[error("failed to decode payload: {0}")]
    Decode(String),

    /// The requested encoding was not compiled into this build
    #[error("unsupported encoding: {0}")]
    Unsupported(String),
}

/// Gateway protocol violations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Op code outside the known table
    #[error("Unknown op code: {0}")]
    UnknownOpCode(u64),

    /// A payload's `d` did not have the shape its op code requires
    #[error("Malformed {op} payload: {reason}")]
    MalformedPayload { op: OpCode, reason: String },

    /// Sequence or event name on a payload that is not a dispatch
    #[error("{op} payload carries dispatch-only fields")]
    UnexpectedDispatchFields { op: OpCode },

    /// A dispatch without its sequence number or event name
    #[error("Dispatch payload is missing {field}")]
    IncompleteDispatch { field: &'static str },

    /// An op code only the gateway may send
    #[error("{op} cannot be sent by a client")]
    NotClientOp { op: OpCode },
}

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    /// Missing required configuration
    #[error("Missing required configuration: {field}")]
    MissingField { field: String },

    /// Option needs a cargo feature this build does not have
    #[error("{option} requires the `{feature}` feature")]
    FeatureDisabled {
        option: &'static str,
        feature: &'static str,
    },
}
