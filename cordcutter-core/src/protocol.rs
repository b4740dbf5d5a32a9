//! Gateway protocol constants and utilities
//!
//! This module contains the gateway op code table, the protocol constants the
//! client relies on, and the alias table used when routing dispatch events.

use crate::error::ProtocolError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Gateway op codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    /// Gateway dispatches an event
    Dispatch = 0,
    /// Keep the connection alive; also sent by the gateway to request one
    Heartbeat = 1,
    /// Start a new session
    Identify = 2,
    /// Presence or status update
    StatusUpdate = 3,
    /// Join, move or leave a voice channel
    VoiceStateUpdate = 4,
    /// Voice ping checking
    VoiceServerPing = 5,
    /// Reattach to a previous session
    Resume = 6,
    /// Gateway asks the client to reconnect and resume
    Reconnect = 7,
    /// Request offline members for a guild
    RequestGuildMembers = 8,
    /// The session is no longer valid
    InvalidSession = 9,
    /// First payload on a connection, carries the heartbeat interval
    Hello = 10,
    /// Acknowledges a heartbeat
    HeartbeatAck = 11,
}

impl OpCode {
    /// Create an OpCode from its wire value
    pub fn from_u64(value: u64) -> Option<Self> {
        match value {
            0 => Some(Self::Dispatch),
            1 => Some(Self::Heartbeat),
            2 => Some(Self::Identify),
            3 => Some(Self::StatusUpdate),
            4 => Some(Self::VoiceStateUpdate),
            5 => Some(Self::VoiceServerPing),
            6 => Some(Self::Resume),
            7 => Some(Self::Reconnect),
            8 => Some(Self::RequestGuildMembers),
            9 => Some(Self::InvalidSession),
            10 => Some(Self::Hello),
            11 => Some(Self::HeartbeatAck),
            _ => None,
        }
    }

    /// Get the wire value of the op code
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Check if the client is allowed to send this op code
    pub const fn is_client_op(self) -> bool {
        matches!(
            self,
            Self::Heartbeat
                | Self::Identify
                | Self::StatusUpdate
                | Self::VoiceStateUpdate
                | Self::VoiceServerPing
                | Self::Resume
                | Self::RequestGuildMembers
        )
    }

    /// Check if the gateway may send this op code
    pub const fn is_gateway_op(self) -> bool {
        matches!(
            self,
            Self::Dispatch
                | Self::Heartbeat
                | Self::Reconnect
                | Self::InvalidSession
                | Self::Hello
                | Self::HeartbeatAck
        )
    }

    /// Get the name of this op code
    pub const fn name(self) -> &'static str {
        match self {
            Self::Dispatch => "Dispatch",
            Self::Heartbeat => "Heartbeat",
            Self::Identify => "Identify",
            Self::StatusUpdate => "StatusUpdate",
            Self::VoiceStateUpdate => "VoiceStateUpdate",
            Self::VoiceServerPing => "VoiceServerPing",
            Self::Resume => "Resume",
            Self::Reconnect => "Reconnect",
            Self::RequestGuildMembers => "RequestGuildMembers",
            Self::InvalidSession => "InvalidSession",
            Self::Hello => "Hello",
            Self::HeartbeatAck => "HeartbeatAck",
        }
    }
}

impl TryFrom<u64> for OpCode {
    type Error = ProtocolError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::from_u64(value).ok_or(ProtocolError::UnknownOpCode(value))
    }
}

impl Serialize for OpCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for OpCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = u64::deserialize(deserializer)?;
        Self::try_from(value).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.as_u8())
    }
}

/// Gateway protocol constants
pub mod constants {
    use std::time::Duration;

    /// Gateway protocol version sent in the connection query string
    pub const GATEWAY_VERSION: u8 = 6;

    /// Base URL of the HTTP API used to discover the gateway
    pub const API_BASE_URL: &str = "https://discordapp.com/api";

    /// Name reported in the identify properties
    pub const LIBRARY_NAME: &str = "cordcutter";

    /// Default member count above which offline members are not sent
    pub const DEFAULT_LARGE_THRESHOLD: u32 = 250;

    /// Smallest accepted large threshold
    pub const MIN_LARGE_THRESHOLD: u32 = 50;

    /// Largest accepted large threshold
    pub const MAX_LARGE_THRESHOLD: u32 = 250;

    /// Default number of extra connect attempts after the first failure
    pub const DEFAULT_RECONNECT_TRIES: u32 = 3;

    /// Default per-attempt connect timeout
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(3000);

    /// Default timeout for the gateway URL lookup
    pub const DEFAULT_ENDPOINT_TIMEOUT: Duration = Duration::from_millis(2000);

    /// Close code sent on an explicit disconnect; the session ends with it
    pub const CLOSE_NORMAL: u16 = 1000;

    /// Close code sent when dropping a connection to resume on a new one.
    /// Codes 1000 and 1001 would invalidate the session.
    pub const CLOSE_RECONNECT: u16 = 4000;
}

/// Dispatch event names
pub mod events {
    /// Raw gateway event names and the names they are delivered under
    pub const ALIASES: &[(&str, &str)] = &[
        ("READY", "ready"),
        ("RESUMED", "resumed"),
        ("GUILD_CREATE", "guildCreate"),
        ("GUILD_UPDATE", "guildUpdate"),
        ("GUILD_DELETE", "guildDelete"),
        ("MESSAGE_CREATE", "message"),
        ("MESSAGE_UPDATE", "messageUpdate"),
        ("MESSAGE_DELETE", "messageDelete"),
        ("PRESENCE_UPDATE", "presenceUpdate"),
        ("TYPING_START", "typingStart"),
    ];

    /// Event carrying the new session id
    pub const READY: &str = "READY";

    /// Event confirming a successful resume
    pub const RESUMED: &str = "RESUMED";

    /// Map a raw event name to the name delivered to event sinks.
    ///
    /// Names without an alias pass through unchanged.
    pub fn sink_name(raw: &str) -> &str {
        ALIASES
            .iter()
            .find(|(from, _)| *from == raw)
            .map_or(raw, |(_, to)| to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_roundtrip_values() {
        for value in 0..=11u64 {
            let op = OpCode::from_u64(value).unwrap();
            assert_eq!(op.as_u8() as u64, value);
        }
        assert_eq!(OpCode::from_u64(12), None);
        assert_eq!(
            OpCode::try_from(42),
            Err(ProtocolError::UnknownOpCode(42))
        );
    }

    #[test]
    fn test_opcode_direction() {
        assert!(OpCode::Identify.is_client_op());
        assert!(!OpCode::Identify.is_gateway_op());
        assert!(OpCode::Hello.is_gateway_op());
        assert!(!OpCode::Hello.is_client_op());
        assert!(OpCode::Heartbeat.is_client_op() && OpCode::Heartbeat.is_gateway_op());
    }

    #[test]
    fn test_opcode_serde() {
        assert_eq!(serde_json::to_string(&OpCode::Resume).unwrap(), "6");
        let op: OpCode = serde_json::from_str("10").unwrap();
        assert_eq!(op, OpCode::Hello);
        assert!(serde_json::from_str::<OpCode>("99").is_err());
    }

    #[test]
    fn test_event_aliases() {
        assert_eq!(events::sink_name("READY"), "ready");
        assert_eq!(events::sink_name("MESSAGE_CREATE"), "message");
        assert_eq!(events::sink_name("CHANNEL_PINS_UPDATE"), "CHANNEL_PINS_UPDATE");
    }

    #[test]
    fn test_opcode_display() {
        assert_eq!(OpCode::InvalidSession.to_string(), "InvalidSession (9)");
    }
}
