//! Connect retry policy
//!
//! Each attempt gets its own timeout; failed attempts are retried
//! immediately until the budget runs out.

use crate::config::ConnectOptions;
use crate::error::{GatewayError, Result};
use crate::transport::Connector;
use std::time::Duration;
use tracing::{debug, warn};

/// How many times to try opening a socket, and how long each try may take
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts allowed after the first one fails
    pub extra_tries: u32,
    /// Time allowed for each attempt
    pub timeout: Duration,
}

impl RetryPolicy {
    /// Total number of attempts this policy allows
    pub fn max_attempts(&self) -> u32 {
        self.extra_tries.saturating_add(1)
    }
}

impl From<&ConnectOptions> for RetryPolicy {
    fn from(options: &ConnectOptions) -> Self {
        Self {
            extra_tries: options.reconnect_tries,
            timeout: options.timeout,
        }
    }
}

/// Open a socket, retrying failed or timed-out attempts.
///
/// Returns the last attempt's error once every attempt has failed;
/// [`GatewayError::Timeout`] when that attempt ran out of time.
pub async fn open_with_retry<C: Connector>(
    connector: &C,
    url: &str,
    policy: RetryPolicy,
) -> Result<C::Socket> {
    let max_attempts = policy.max_attempts();
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        #[cfg(feature = "metrics")]
        metrics::counter!("cordcutter_connect_attempts_total").increment(1);

        let err = match tokio::time::timeout(policy.timeout, connector.open(url)).await {
            Ok(Ok(socket)) => {
                debug!(url, attempt, "transport open");
                return Ok(socket);
            }
            Ok(Err(err)) => err,
            Err(_) => GatewayError::Timeout,
        };

        if attempt >= max_attempts {
            return Err(err);
        }

        warn!(
            url,
            attempt,
            remaining = max_attempts - attempt,
            error = %err,
            "connect attempt failed, retrying"
        );
    }
}
