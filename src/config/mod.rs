//! Configuration for meshwarn.

mod app_config;
mod helpers;
mod http_retry;

pub use app_config::{
    AppConfig, DedupConfig, FeedsConfig, RadioConfig, RestartConfig, SmhiFeedConfig,
    VmaFeedConfig,
};
pub use helpers::{deserialize_duration_from_ms, deserialize_duration_from_seconds};
pub use http_retry::{HttpRetryConfig, JitterSetting};
