//! HTTP helpers shared by the BunnyCDN and GitHub clients

use crate::config::schema::RetryConfig;
use crate::domain::errors::BackendError;
use reqwest::{Client, ClientBuilder, Response};
use std::future::Future;
use std::time::Duration;

/// User agent sent with every request
pub const USER_AGENT: &str = concat!("sitepush/", env!("CARGO_PKG_VERSION"));

/// Build a reqwest client with the given request timeout
pub fn build_client(timeout_seconds: u64) -> Result<Client, BackendError> {
    ClientBuilder::new()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(timeout_seconds))
        .connect_timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| BackendError::ConnectionFailed(format!("Failed to build HTTP client: {e}")))
}

/// Turn a non-2xx response into a [`BackendError`] carrying the body
pub async fn error_for_status(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(BackendError::from_status(status.as_u16(), body))
}

/// Delay before retry number `attempt` (1-based), capped at `max_delay_ms`
pub fn backoff_delay(retry: &RetryConfig, attempt: usize) -> Duration {
    let factor = retry
        .backoff_multiplier
        .powi(attempt.saturating_sub(1) as i32);
    let delay_ms = (retry.initial_delay_ms as f64 * factor) as u64;
    Duration::from_millis(delay_ms.min(retry.max_delay_ms))
}

/// Retry a request with exponential backoff
///
/// Only transient errors are retried; the operation runs at most
/// `max_retries + 1` times.
pub async fn retry_request<F, T, Fut>(retry: &RetryConfig, operation: F) -> Result<T, BackendError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, BackendError>>,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                attempt += 1;
                if attempt > retry.max_retries || !e.is_transient() {
                    return Err(e);
                }

                let delay = backoff_delay(retry, attempt);
                crate::log_retry_attempt!(attempt, retry.max_retries, e);
                tokio::time::sleep(delay).await;
            }
        }
    }
}
