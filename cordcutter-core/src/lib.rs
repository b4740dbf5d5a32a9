//! # Cordcutter Core
//!
//! Gateway payload model and wire codecs for the Cordcutter gateway client.
//!
//! This crate has no I/O. It includes:
//!
//! - Error handling and types
//! - Op codes, protocol constants and dispatch event aliases
//! - The `{op, d, s, t}` payload envelope and typed handshake payloads
//! - JSON, zlib-compressed JSON and binary-term (ETF) codecs
//! - Permission bit flags

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]
#![doc(html_root_url = "https://docs.rs/cordcutter-core/")]

// Core modules
pub mod codec;
pub mod error;
pub mod message;
pub mod payload;
pub mod permissions;
pub mod protocol;

#[cfg(feature = "etf")]
#[cfg_attr(docsrs, doc(cfg(feature = "etf")))]
pub mod etf;

// Prelude module with common imports
pub mod prelude;

// Re-export key types for convenience
pub use codec::{Codec, Encoding};
pub use error::{Error, Result};
pub use message::{CloseFrame, Message, MessageKind};
pub use payload::Payload;
pub use permissions::Permissions;
pub use protocol::OpCode;
