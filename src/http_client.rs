//! Retryable HTTP client shared by the alert feeds.
//!
//! Transient upstream failures (network errors, rate limiting, 5xx) are
//! retried with exponential backoff inside the middleware, so feed code
//! only ever sees a request that has already exhausted its attempts.

use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{Jitter, RetryTransientMiddleware, policies::ExponentialBackoff};

use crate::config::{HttpRetryConfig, JitterSetting};

/// Builds the feeds' HTTP client from the configured retry policy.
///
/// The per-request timeout lives on the base client; the retry policy wraps
/// it, so each attempt gets the full timeout budget.
pub fn build_feed_http_client(
    config: &HttpRetryConfig,
) -> Result<ClientWithMiddleware, reqwest::Error> {
    let base_client = reqwest::Client::builder().timeout(config.request_timeout_secs).build()?;

    let policy_builder = match config.jitter {
        JitterSetting::None => ExponentialBackoff::builder().jitter(Jitter::None),
        JitterSetting::Full => ExponentialBackoff::builder().jitter(Jitter::Full),
    };
    let retry_policy = policy_builder
        .base(config.base_for_backoff)
        .retry_bounds(config.initial_backoff_ms, config.max_backoff_secs)
        .build_with_max_retries(config.max_retries);

    Ok(ClientBuilder::new(base_client)
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build())
}
