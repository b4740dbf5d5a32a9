//! # Cordcutter
//!
//! **Gateway session client with heartbeats, resume, and JSON/ETF payload codecs**
//!
//! Cordcutter connects to a real-time gateway over WebSocket, identifies (or
//! resumes a previous session), keeps the connection alive with heartbeats
//! and reconnects on its own when the transport drops.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cordcutter::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> cordcutter::client::Result<()> {
//!     let client = Client::builder(ClientOptions::new("my-token"))
//!         .sink(from_fn(|event: &str, data: &Value| {
//!             println!("{event}: {data}");
//!         }))
//!         .build()?;
//!
//!     let options = ConnectOptions::default()
//!         .gateway(GatewayOptions::default().encoding(Encoding::Json))
//!         .reconnect_tries(5);
//!     let gateway = client.connect(options).await?;
//!
//!     gateway.wait_for_state(ConnectionState::Active).await?;
//!     gateway.disconnect().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `etf` (default): binary term format encoding
//! - `compression` (default): zlib-compressed JSON payloads
//! - `metrics`: connection counters through the `metrics` facade

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]
#![doc(html_root_url = "https://docs.rs/cordcutter/")]

// Re-export core components
pub use cordcutter_core::*;

pub use cordcutter_client as client;

pub use cordcutter_client::{
    Client, ClientBuilder, ClientOptions, ConnectOptions, ConnectionState, Gateway,
    GatewayError, GatewayOptions,
};

/// Prelude module with common imports
pub mod prelude {
    pub use cordcutter_client::prelude::*;
}
