//! Cordcutter Client
//!
//! Gateway session client: resolves the gateway endpoint, opens a WebSocket
//! with a bounded retry policy, performs the Identify/Resume handshake,
//! keeps the connection alive with heartbeats and delivers dispatch events
//! to an [`EventSink`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cordcutter_client::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> cordcutter_client::Result<()> {
//!     let (sink, mut events) = ChannelSink::new();
//!     let client = Client::builder(ClientOptions::new("my-token"))
//!         .sink(sink)
//!         .build()?;
//!
//!     let gateway = client.connect(ConnectOptions::default()).await?;
//!
//!     while let Some(event) = events.recv().await {
//!         println!("event: {:?}", event);
//!         break;
//!     }
//!
//!     gateway.disconnect().await?;
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]
#![doc(html_root_url = "https://docs.rs/cordcutter-client/")]

// Public modules
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod resolver;
pub mod retry;
pub mod session;
pub mod sink;
pub mod transport;

mod heartbeat;

// Prelude module
pub mod prelude;

// Re-export key types for convenience
pub use client::{Client, ClientBuilder, Gateway};
pub use config::{ClientOptions, ConnectOptions, GatewayOptions, LogLevel};
pub use error::{GatewayError, Result};
pub use resolver::{HttpResolver, Resolver, StaticResolver};
pub use session::ConnectionState;
pub use sink::{ChannelSink, EventSink, FnSink, GatewayEvent, NullSink};
pub use transport::{Connector, Socket, WsConnector, WsSocket};
