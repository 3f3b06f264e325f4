use std::{net::Ipv4Addr, time::Duration};

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use url::Url;

use super::{HttpRetryConfig, deserialize_duration_from_seconds};

fn default_multicast_group() -> Ipv4Addr {
    Ipv4Addr::new(224, 0, 0, 69)
}

fn default_multicast_port() -> u16 {
    4403
}

fn default_node_id() -> String {
    "!112".to_string()
}

fn default_long_name() -> String {
    "VMA ROBOT".to_string()
}

fn default_short_name() -> String {
    "VMA".to_string()
}

fn default_hop_limit() -> u32 {
    5
}

fn default_max_bytes() -> usize {
    200
}

fn default_max_messages() -> usize {
    2
}

/// 12 hours.
fn default_presence_interval() -> Duration {
    Duration::from_secs(43_200)
}

/// 24 hours. Sources with long-standing alerts repeat them every TTL.
fn default_seen_ttl() -> Duration {
    Duration::from_secs(86_400)
}

fn default_seen_capacity() -> usize {
    5_000
}

fn default_hold_window() -> Duration {
    Duration::from_secs(60)
}

fn default_restart_history() -> usize {
    5
}

fn default_max_restart_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_warmup() -> bool {
    true
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_feed_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_enabled() -> bool {
    true
}

fn default_vma_url() -> Url {
    Url::parse("https://vmaapi.sr.se/api/v3/alerts").expect("static default URL is valid")
}

fn default_vma_geocode() -> String {
    // 01 is Stockholm county.
    "01".to_string()
}

fn default_smhi_url() -> Url {
    Url::parse("https://opendata-download-warnings.smhi.se/ibww/api/version/1/warning.json")
        .expect("static default URL is valid")
}

fn default_smhi_geocode() -> i64 {
    // 1 is Stockholm in the SMHI area metadata.
    1
}

/// Radio channel and node identity settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RadioConfig {
    /// Multicast group shared by all instances on the channel.
    pub multicast_group: Ipv4Addr,

    /// UDP port of the multicast group.
    pub multicast_port: u16,

    /// Node identifier stamped on every outbound envelope.
    pub node_id: String,

    /// Human-readable node name announced in presence frames.
    pub long_name: String,

    /// Short node name announced in presence frames.
    pub short_name: String,

    /// Multicast TTL for outbound datagrams.
    pub hop_limit: u32,

    /// Per-frame byte budget, numbering suffix included.
    pub max_bytes: usize,

    /// Maximum frames emitted per alert.
    pub max_messages: usize,

    /// Interval between presence announcements.
    #[serde(deserialize_with = "deserialize_duration_from_seconds")]
    pub presence_interval_secs: Duration,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            multicast_group: default_multicast_group(),
            multicast_port: default_multicast_port(),
            node_id: default_node_id(),
            long_name: default_long_name(),
            short_name: default_short_name(),
            hop_limit: default_hop_limit(),
            max_bytes: default_max_bytes(),
            max_messages: default_max_messages(),
            presence_interval_secs: default_presence_interval(),
        }
    }
}

/// Deduplication and hold-off coordination settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// How long a transmitted or overheard fingerprint is remembered.
    #[serde(deserialize_with = "deserialize_duration_from_seconds")]
    pub seen_ttl_secs: Duration,

    /// Hard cap on remembered fingerprints; the oldest are evicted first.
    pub seen_capacity: usize,

    /// Width of the hold-off delay window. Zero disables coordination and
    /// sends cold fingerprints immediately.
    #[serde(deserialize_with = "deserialize_duration_from_seconds")]
    pub hold_window_secs: Duration,

    /// Overrides the machine-derived salt that keys this instance's
    /// hold-off delays.
    pub instance_salt: Option<String>,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            seen_ttl_secs: default_seen_ttl(),
            seen_capacity: default_seen_capacity(),
            hold_window_secs: default_hold_window(),
            instance_salt: None,
        }
    }
}

/// Crash-loop sensitivity of the restart supervisor.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RestartConfig {
    /// Number of task starts kept in the rolling window.
    pub history: usize,

    /// The task is declared crash-looping when every recorded start falls
    /// within this interval.
    #[serde(deserialize_with = "deserialize_duration_from_seconds")]
    pub max_interval_secs: Duration,
}

impl Default for RestartConfig {
    fn default() -> Self {
        Self {
            history: default_restart_history(),
            max_interval_secs: default_max_restart_interval(),
        }
    }
}

/// VMA feed endpoint settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VmaFeedConfig {
    /// Whether the feed is polled at all.
    pub enabled: bool,

    /// Alert API endpoint.
    pub url: Url,

    /// Poll interval.
    #[serde(deserialize_with = "deserialize_duration_from_seconds")]
    pub interval_secs: Duration,

    /// Geocode the alerts are filtered by upstream.
    pub geocode: String,
}

impl Default for VmaFeedConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            url: default_vma_url(),
            interval_secs: default_feed_interval(),
            geocode: default_vma_geocode(),
        }
    }
}

/// SMHI feed endpoint settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SmhiFeedConfig {
    /// Whether the feed is polled at all.
    pub enabled: bool,

    /// Warnings API endpoint.
    pub url: Url,

    /// Poll interval.
    #[serde(deserialize_with = "deserialize_duration_from_seconds")]
    pub interval_secs: Duration,

    /// District id warnings are filtered against locally.
    pub geocode: i64,
}

impl Default for SmhiFeedConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            url: default_smhi_url(),
            interval_secs: default_feed_interval(),
            geocode: default_smhi_geocode(),
        }
    }
}

/// The configured set of alert feeds.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FeedsConfig {
    /// VMA (national alert) feed.
    pub vma: VmaFeedConfig,

    /// SMHI (weather warning) feed.
    pub smhi: SmhiFeedConfig,
}

/// Application configuration, constructed once at startup and shared
/// immutably.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Radio channel and node identity.
    pub radio: RadioConfig,

    /// Deduplication and hold-off coordination.
    pub dedup: DedupConfig,

    /// Crash-loop sensitivity for supervised tasks.
    pub restart: RestartConfig,

    /// Alert feed endpoints.
    pub feeds: FeedsConfig,

    /// Retry policy for feed HTTP requests.
    pub http_retry: HttpRetryConfig,

    /// When set, the first fetch of each feed only marks alerts as seen, so
    /// a restart does not re-broadcast the standing snapshot.
    pub warmup: bool,

    /// Maximum time to wait for tasks to stop on shutdown.
    #[serde(deserialize_with = "deserialize_duration_from_seconds")]
    pub shutdown_timeout_secs: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            radio: RadioConfig::default(),
            dedup: DedupConfig::default(),
            restart: RestartConfig::default(),
            feeds: FeedsConfig::default(),
            http_retry: HttpRetryConfig::default(),
            warmup: default_warmup(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl AppConfig {
    /// Creates an `AppConfig` by layering `app.yaml` from the configuration
    /// directory (optional) under `MESHWARN__`-prefixed environment
    /// variables.
    pub fn new(config_dir: Option<&str>) -> Result<Self, ConfigError> {
        let config_dir = config_dir.unwrap_or("configs");
        let settings = Config::builder()
            .add_source(File::with_name(&format!("{config_dir}/app.yaml")).required(false))
            .add_source(Environment::with_prefix("MESHWARN").separator("__"))
            .build()?;
        settings.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_mirror_the_documented_values() {
        let config = AppConfig::default();

        assert_eq!(config.radio.multicast_group, Ipv4Addr::new(224, 0, 0, 69));
        assert_eq!(config.radio.multicast_port, 4403);
        assert_eq!(config.radio.max_bytes, 200);
        assert_eq!(config.radio.max_messages, 2);
        assert_eq!(config.dedup.seen_ttl_secs, Duration::from_secs(86_400));
        assert_eq!(config.dedup.hold_window_secs, Duration::from_secs(60));
        assert!(config.dedup.instance_salt.is_none());
        assert_eq!(config.restart.history, 5);
        assert_eq!(config.restart.max_interval_secs, Duration::from_secs(60));
        assert!(config.warmup);
        assert!(config.feeds.vma.enabled);
        assert!(config.feeds.smhi.enabled);
    }

    #[test]
    fn missing_config_file_falls_back_to_defaults() {
        let temp_dir = tempfile::tempdir().unwrap();

        let config = AppConfig::new(Some(temp_dir.path().to_str().unwrap())).unwrap();

        assert_eq!(config.radio.multicast_port, 4403);
        assert_eq!(config.dedup.seen_capacity, 5_000);
    }

    #[test]
    fn config_file_overrides_defaults() {
        let config_content = r#"
        radio:
          node_id: "!42"
          max_messages: 4
        dedup:
          seen_ttl_secs: 3600
          hold_window_secs: 0
          instance_salt: "bench-3"
        feeds:
          smhi:
            enabled: false
            geocode: 14
        warmup: false
        "#;
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(temp_dir.path().join("app.yaml"), config_content).unwrap();

        let config = AppConfig::new(Some(temp_dir.path().to_str().unwrap())).unwrap();

        assert_eq!(config.radio.node_id, "!42");
        assert_eq!(config.radio.max_messages, 4);
        // Untouched radio fields keep their defaults.
        assert_eq!(config.radio.multicast_port, 4403);
        assert_eq!(config.dedup.seen_ttl_secs, Duration::from_secs(3_600));
        assert_eq!(config.dedup.hold_window_secs, Duration::ZERO);
        assert_eq!(config.dedup.instance_salt.as_deref(), Some("bench-3"));
        assert!(!config.feeds.smhi.enabled);
        assert_eq!(config.feeds.smhi.geocode, 14);
        assert!(config.feeds.vma.enabled);
        assert!(!config.warmup);
    }

    #[test]
    fn environment_variables_override_the_file() {
        let config_content = r#"
        dedup:
          hold_window_secs: 60
        "#;
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(temp_dir.path().join("app.yaml"), config_content).unwrap();

        unsafe {
            std::env::set_var("MESHWARN__DEDUP__HOLD_WINDOW_SECS", "120");
        }
        let config = AppConfig::new(Some(temp_dir.path().to_str().unwrap())).unwrap();
        unsafe {
            std::env::remove_var("MESHWARN__DEDUP__HOLD_WINDOW_SECS");
        }

        assert_eq!(config.dedup.hold_window_secs, Duration::from_secs(120));
    }
}
