use std::time::Duration;

use serde::Deserialize;

use super::{deserialize_duration_from_ms, deserialize_duration_from_seconds};

fn default_max_retries() -> u32 {
    3
}

fn default_base_for_backoff() -> u32 {
    2
}

fn default_initial_backoff_ms() -> Duration {
    Duration::from_millis(2_000)
}

fn default_max_backoff_secs() -> Duration {
    Duration::from_secs(10)
}

fn default_request_timeout_secs() -> Duration {
    Duration::from_secs(15)
}

/// Jitter setting for the feed retry policy.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JitterSetting {
    /// No jitter applied to the backoff duration.
    None,
    /// Full jitter, randomizing each backoff duration.
    #[default]
    Full,
}

/// Retry policy for the feed HTTP clients.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct HttpRetryConfig {
    /// Maximum number of retries for transient errors.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base for the exponential backoff calculation.
    #[serde(default = "default_base_for_backoff")]
    pub base_for_backoff: u32,

    /// Backoff before the first retry.
    #[serde(
        default = "default_initial_backoff_ms",
        deserialize_with = "deserialize_duration_from_ms"
    )]
    pub initial_backoff_ms: Duration,

    /// Upper bound on any single backoff.
    #[serde(
        default = "default_max_backoff_secs",
        deserialize_with = "deserialize_duration_from_seconds"
    )]
    pub max_backoff_secs: Duration,

    /// Per-attempt request timeout.
    #[serde(
        default = "default_request_timeout_secs",
        deserialize_with = "deserialize_duration_from_seconds"
    )]
    pub request_timeout_secs: Duration,

    /// Jitter applied to each backoff.
    #[serde(default)]
    pub jitter: JitterSetting,
}

impl Default for HttpRetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_for_backoff: default_base_for_backoff(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_secs: default_max_backoff_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            jitter: JitterSetting::default(),
        }
    }
}
