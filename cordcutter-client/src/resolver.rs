//! Gateway endpoint resolution
//!
//! The gateway URL is looked up once per connect call with `GET /gateway`.
//! The resolved base URL is then extended with the protocol version and
//! encoding query parameters.

use crate::config::ClientOptions;
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use cordcutter_core::codec::Encoding;
use cordcutter_core::protocol::constants::GATEWAY_VERSION;
use serde::Deserialize;
use std::fmt;

/// Resolves the base URL of the gateway
#[async_trait]
pub trait Resolver: Send + Sync + 'static {
    /// Look up the gateway URL
    async fn resolve(&self) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct GatewayResponse {
    url: String,
}

/// Resolver asking the HTTP API for the gateway URL
pub struct HttpResolver {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpResolver {
    /// Create a resolver using the API URL and endpoint timeout from the options
    pub fn new(options: &ClientOptions) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(options.endpoint_timeout)
            .user_agent(concat!("cordcutter/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            endpoint: format!("{}/gateway", options.api_url.trim_end_matches('/')),
        })
    }

    /// URL this resolver queries
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl fmt::Debug for HttpResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResolver")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

#[async_trait]
impl Resolver for HttpResolver {
    async fn resolve(&self) -> Result<String> {
        tracing::debug!(endpoint = %self.endpoint, "resolving gateway url");
        let response = self
            .http
            .get(&self.endpoint)
            .send()
            .await?
            .error_for_status()?;
        let body: GatewayResponse = response.json().await?;
        if body.url.is_empty() {
            return Err(GatewayError::Resolution(
                "gateway response carried an empty url".to_string(),
            ));
        }
        Ok(body.url)
    }
}

/// Resolver returning a fixed URL
#[derive(Debug, Clone)]
pub struct StaticResolver {
    url: String,
}

impl StaticResolver {
    /// Create a resolver that always yields `url`
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Resolver for StaticResolver {
    async fn resolve(&self) -> Result<String> {
        Ok(self.url.clone())
    }
}

/// Full connection URL for a resolved gateway base URL
pub fn gateway_url(base: &str, encoding: Encoding) -> String {
    format!(
        "{}/?v={}&encoding={}",
        base.trim_end_matches('/'),
        GATEWAY_VERSION,
        encoding.as_str()
    )
}
