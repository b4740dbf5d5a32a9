//! Transport-level messages
//!
//! A gateway connection exchanges whole text or binary messages; control
//! traffic other than close is handled below this layer by the transport.

use bytes::Bytes;
use std::fmt;

/// A complete message as seen by the gateway client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Text message (JSON payloads)
    Text(String),
    /// Binary message (ETF or compressed JSON payloads)
    Binary(Bytes),
    /// The peer closed the connection
    Close(Option<CloseFrame>),
}

/// Close code and reason carried by a close message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFrame {
    /// Close code
    pub code: u16,
    /// Close reason
    pub reason: String,
}

impl Message {
    /// Create a text message
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Create a binary message
    pub fn binary(data: impl Into<Bytes>) -> Self {
        Self::Binary(data.into())
    }

    /// Create a close message
    pub fn close(code: u16, reason: impl Into<String>) -> Self {
        Self::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        }))
    }

    /// Get the message kind
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Text(_) => MessageKind::Text,
            Message::Binary(_) => MessageKind::Binary,
            Message::Close(_) => MessageKind::Close,
        }
    }

    /// Check if this message carries a payload
    pub fn is_data(&self) -> bool {
        matches!(self, Message::Text(_) | Message::Binary(_))
    }

    /// Get the message body as bytes
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Message::Text(text) => text.as_bytes(),
            Message::Binary(data) => data,
            Message::Close(Some(frame)) => frame.reason.as_bytes(),
            Message::Close(None) => &[],
        }
    }

    /// Length of the message body in bytes
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Check if the message body is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Text(text) => write!(f, "Text({} bytes)", text.len()),
            Message::Binary(data) => write!(f, "Binary({} bytes)", data.len()),
            Message::Close(Some(frame)) => write!(f, "Close({} {})", frame.code, frame.reason),
            Message::Close(None) => write!(f, "Close"),
        }
    }
}

/// Message kind for easier matching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Text message
    Text,
    /// Binary message
    Binary,
    /// Close message
    Close,
}
