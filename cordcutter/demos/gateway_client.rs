//! Connect to the gateway and print every dispatch event.
//!
//! ```text
//! CORDCUTTER_TOKEN=... cargo run --example gateway_client
//! ```

use cordcutter::client::sink::from_fn;
use cordcutter::client::LogLevel;
use cordcutter::{Client, ClientOptions, ConnectOptions};
use serde_json::Value;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let token = std::env::var("CORDCUTTER_TOKEN")?;

    let client = Client::builder(ClientOptions::new(token).log_level(LogLevel::All))
        .sink(from_fn(|event: &str, data: &Value| {
            println!("{event}: {data}");
        }))
        .build()?;
    client.init_logging()?;

    let gateway = client.connect(ConnectOptions::default()).await?;
    tracing::info!("connected, press ctrl-c to stop");

    tokio::signal::ctrl_c().await?;
    gateway.disconnect().await?;
    Ok(())
}
