//! Gateway payloads
//!
//! Every gateway message is an envelope `{op, d, s, t}`. The shape of `d` is
//! decided by `op`; `s` and `t` only appear on dispatches. The envelope keeps
//! `d` as a JSON value so unknown dispatch events pass through untouched, and
//! the typed structs below give the handshake payloads their exact wire shape.

use crate::error::{CodecError, ProtocolError};
use crate::protocol::{constants, OpCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Gateway payload envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    /// Op code for the payload
    pub op: OpCode,
    /// Event data
    #[serde(default)]
    pub d: Value,
    /// Sequence number, dispatch only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,
    /// Event name, dispatch only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

impl Payload {
    /// Create a non-dispatch payload
    pub fn new(op: OpCode, d: Value) -> Self {
        Self {
            op,
            d,
            s: None,
            t: None,
        }
    }

    /// Create a payload from any serializable data
    pub fn with_data<T: Serialize>(op: OpCode, data: &T) -> Result<Self, CodecError> {
        let d = serde_json::to_value(data).map_err(|e| CodecError::Encode(e.to_string()))?;
        Ok(Self::new(op, d))
    }

    /// Create a dispatch payload
    pub fn dispatch(event: impl Into<String>, sequence: u64, d: Value) -> Self {
        Self {
            op: OpCode::Dispatch,
            d,
            s: Some(sequence),
            t: Some(event.into()),
        }
    }

    /// Heartbeat carrying the last seen sequence, or null before the first dispatch
    pub fn heartbeat(sequence: Option<u64>) -> Self {
        Self::new(OpCode::Heartbeat, sequence.map_or(Value::Null, Value::from))
    }

    /// Identify payload
    pub fn identify(identify: &Identify) -> Result<Self, CodecError> {
        Self::with_data(OpCode::Identify, identify)
    }

    /// Resume payload
    pub fn resume(resume: &Resume) -> Result<Self, CodecError> {
        Self::with_data(OpCode::Resume, resume)
    }

    /// Decode `d` into the type its op code calls for
    pub fn data<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        T::deserialize(&self.d).map_err(|e| ProtocolError::MalformedPayload {
            op: self.op,
            reason: e.to_string(),
        })
    }

    /// Event name of a dispatch
    pub fn event_name(&self) -> Option<&str> {
        self.t.as_deref()
    }

    /// Check the dispatch-only fields are where they belong
    pub fn validate(&self) -> Result<(), ProtocolError> {
        match self.op {
            OpCode::Dispatch if self.s.is_none() => {
                Err(ProtocolError::IncompleteDispatch { field: "s" })
            }
            OpCode::Dispatch if self.t.is_none() => {
                Err(ProtocolError::IncompleteDispatch { field: "t" })
            }
            OpCode::Dispatch => Ok(()),
            op if self.s.is_some() || self.t.is_some() => {
                Err(ProtocolError::UnexpectedDispatchFields { op })
            }
            _ => Ok(()),
        }
    }
}

/// `d` of a Hello payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hello {
    /// Interval in milliseconds the client should heartbeat with
    pub heartbeat_interval: u64,
    /// Servers the connection passed through
    #[serde(rename = "_trace", default, skip_serializing_if = "Vec::is_empty")]
    pub trace: Vec<String>,
}

/// Connection properties reported in Identify
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentifyProperties {
    /// Operating system
    #[serde(rename = "$os")]
    pub os: String,
    /// Library name
    #[serde(rename = "$browser")]
    pub browser: String,
    /// Library name
    #[serde(rename = "$device")]
    pub device: String,
    /// Referrer
    #[serde(rename = "$referrer")]
    pub referrer: String,
    /// Referring domain
    #[serde(rename = "$referring_domain")]
    pub referring_domain: String,
}

impl Default for IdentifyProperties {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            browser: constants::LIBRARY_NAME.to_string(),
            device: constants::LIBRARY_NAME.to_string(),
            referrer: String::new(),
            referring_domain: String::new(),
        }
    }
}

/// `d` of an Identify payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identify {
    /// Authentication token
    pub token: String,
    /// Connection properties
    pub properties: IdentifyProperties,
    /// Whether this connection supports compression
    pub compress: bool,
    /// Member count above which the gateway stops sending offline members
    pub large_threshold: u32,
    /// `[shard_id, shard_count]`, absent when unsharded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard: Option<[u32; 2]>,
}

impl Identify {
    /// Shard field for a shard pair; unsharded connections omit it.
    pub fn shard_field(shard_id: u32, shard_count: u32) -> Option<[u32; 2]> {
        (shard_count > 0).then_some([shard_id, shard_count])
    }
}

/// `d` of a Resume payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resume {
    /// Session token
    pub token: String,
    /// Session id from the ready event
    pub session_id: String,
    /// Last sequence number received
    pub seq: Option<u64>,
}

/// `d` of a StatusUpdate payload
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusUpdate {
    /// Unix time in milliseconds the client went idle, or null
    pub idle_since: Option<u64>,
    /// Game being played, or null
    pub game: Option<Game>,
}

/// Game shown in a status update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    /// Name of the game being played
    pub name: String,
}

/// `d` of a RequestGuildMembers payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestGuildMembers {
    /// Guild to get offline members for
    pub guild_id: String,
    /// Username prefix, empty for all members
    pub query: String,
    /// Maximum number of members to send, 0 for no limit
    pub limit: u32,
}

/// The part of the ready event the session needs
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Ready {
    /// Session id to resume with
    pub session_id: String,
}
