//! GET with bounded retries and exponential backoff, shared by every network call.

use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

use crate::fetch::transport::{HttpRequest, HttpResponse, HttpTransport};
use crate::fetch::FetchError;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_millis(DEFAULT_BACKOFF_BASE_MS),
        }
    }
}

impl RetryPolicy {
    pub fn no_delay(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay before the `retry`-th retry (0-based): base × 2^retry.
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(retry))
    }
}

/// Sends `request`, retrying 5xx responses and transport failures. Any other
/// response is handed back for the caller to interpret.
pub async fn get_with_retry(
    transport: &dyn HttpTransport,
    request: &HttpRequest,
    policy: &RetryPolicy,
) -> Result<HttpResponse, FetchError> {
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        let failure = match transport.get(request).await {
            Ok(response) if response.is_server_error() => {
                format!("server error (HTTP {})", response.status)
            }
            Ok(response) => return Ok(response),
            Err(err) => err.message,
        };

        let retry = attempt - 1;
        if retry >= policy.max_retries {
            return Err(FetchError::FetchFailed {
                url: request.display_url(),
                attempts: attempt,
                last: failure,
            });
        }

        let delay = policy.backoff_delay(retry);
        warn!(
            url = %request.display_url(),
            attempt,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "{failure}; retrying"
        );
        sleep(delay).await;
    }
}
