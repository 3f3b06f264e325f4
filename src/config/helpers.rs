use std::time::Duration;

use serde::{Deserialize, Deserializer};

/// Custom deserializer for `Duration` from milliseconds.
pub fn deserialize_duration_from_ms<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let ms = u64::deserialize(deserializer)?;
    Ok(Duration::from_millis(ms))
}

/// Custom deserializer for `Duration` from seconds.
pub fn deserialize_duration_from_seconds<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = u64::deserialize(deserializer)?;
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct TestDurationMs {
        #[serde(deserialize_with = "deserialize_duration_from_ms")]
        duration: Duration,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct TestDurationSecs {
        #[serde(deserialize_with = "deserialize_duration_from_seconds")]
        duration: Duration,
    }

    #[test]
    fn duration_from_ms() {
        let actual: TestDurationMs = serde_json::from_str(r#"{"duration": 5000}"#).unwrap();
        assert_eq!(actual, TestDurationMs { duration: Duration::from_millis(5000) });
    }

    #[test]
    fn duration_from_seconds() {
        let actual: TestDurationSecs = serde_json::from_str(r#"{"duration": 5}"#).unwrap();
        assert_eq!(actual, TestDurationSecs { duration: Duration::from_secs(5) });
    }
}
