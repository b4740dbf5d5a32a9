//! Prelude module for Cordcutter Client
//!
//! This module re-exports commonly used types and traits to make them
//! easily accessible for users of the client library.

pub use crate::client::{Client, ClientBuilder, Gateway};
pub use crate::config::{ClientOptions, ConnectOptions, GatewayOptions, LogLevel};
pub use crate::error::GatewayError;
pub use crate::logging::init_logging;
pub use crate::resolver::{HttpResolver, Resolver, StaticResolver};
pub use crate::session::ConnectionState;
pub use crate::sink::{from_fn, ChannelSink, EventSink, FnSink, GatewayEvent, NullSink};
pub use crate::transport::{Connector, Socket, WsConnector};

// Re-export core types for convenience
pub use cordcutter_core::prelude::*;

// Re-export commonly used external dependencies
pub use std::time::Duration;
