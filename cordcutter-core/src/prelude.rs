//! Prelude module for Cordcutter Core
//!
//! This module re-exports commonly used types so payload-handling code can
//! pull them in with a single import.

pub use crate::codec::{Codec, Encoding};
pub use crate::error::{CodecError, ConfigError, Error, ProtocolError, Result};
pub use crate::message::{CloseFrame, Message, MessageKind};
pub use crate::payload::{
    Game, Hello, Identify, IdentifyProperties, Payload, Ready, RequestGuildMembers, Resume,
    StatusUpdate,
};
pub use crate::permissions::Permissions;
pub use crate::protocol::{constants, events, OpCode};

// Re-export commonly used external dependencies
pub use bytes::Bytes;
pub use serde_json::{json, Value};
