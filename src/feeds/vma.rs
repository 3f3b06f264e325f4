//! The VMA (Viktigt Meddelande till Allmänheten) alert feed.
//!
//! Polls the national alert API for a configured geocode and renders each
//! alert as one Swedish broadcast message. Rendering mirrors the upstream
//! taxonomy: cancellations, the quarterly siren test, exercises, and
//! actual alerts; everything else is skipped.

use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;

use super::{AlertFeed, FeedError};
use crate::config::VmaFeedConfig;

/// Exact event string of the quarterly outdoor siren test.
const QUARTERLY_TEST_EVENT: &str =
    "Kvartalstest av utomhussignal för viktigt meddelande till allmänheten (VMA)";

/// Fixed phrasing broadcast for the quarterly siren test.
const QUARTERLY_TEST_MESSAGE: &str = "VMA TEST: Idag kl 15 testas “Viktigt meddelande”-signalen - \
     7s ljud följt av 14s tystnad under 2min. Efter testet ljuder “Faran över” - en 30s lång signal.";

const DETAILS_MISSING: &str = "Viktigt meddelande till allmänheten (detaljer saknas).";

/// Alert feed backed by the VMA API.
pub struct VmaFeed {
    client: ClientWithMiddleware,
    config: VmaFeedConfig,
}

impl VmaFeed {
    /// Creates the feed over a shared retryable HTTP client.
    pub fn new(client: ClientWithMiddleware, config: VmaFeedConfig) -> Self {
        Self { client, config }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VmaResponse {
    alerts: Vec<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct VmaAlert {
    status: String,
    msg_type: String,
    sent: Option<String>,
    info: Vec<VmaInfo>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VmaInfo {
    event: String,
    description: String,
}

/// Renders one alert as a broadcast message, or `None` when the alert is
/// not something the channel should carry.
fn render_alert(alert: &VmaAlert) -> Option<String> {
    let info = alert.info.first();
    let event = info.map(|i| i.event.as_str()).unwrap_or("");
    let description = info.map(|i| i.description.as_str()).unwrap_or("");

    if alert.status != "Test" && alert.msg_type == "Cancel" {
        let issued = match &alert.sent {
            Some(sent) => chrono::DateTime::parse_from_rfc3339(sent)
                .map(|ts| ts.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|_| sent.clone()),
            None => "tidigare".to_string(),
        };
        return Some(format!(
            "UPPHÄVD: Varningen utfärdad {issued} är inte längre aktuell. Faran är över."
        ));
    }

    if alert.status == "Exercise" && event == QUARTERLY_TEST_EVENT {
        return Some(QUARTERLY_TEST_MESSAGE.to_string());
    }

    if alert.status == "Exercise" {
        return Some(if description.is_empty() {
            format!("ÖVNING: {DETAILS_MISSING}")
        } else {
            format!("ÖVNING: {description}")
        });
    }

    if alert.status == "Actual" {
        return Some(if description.is_empty() {
            format!("VMA: {DETAILS_MISSING}")
        } else {
            format!("VMA: {description}")
        });
    }

    None
}

#[async_trait]
impl AlertFeed for VmaFeed {
    fn name(&self) -> &str {
        "vma"
    }

    async fn fetch(&self) -> Result<Vec<String>, FeedError> {
        let response = self
            .client
            .get(self.config.url.clone())
            .query(&[("geocode", self.config.geocode.as_str())])
            .send()
            .await?;
        let body: VmaResponse = response.error_for_status()?.json().await?;

        let mut messages = Vec::new();
        for raw in body.alerts {
            // A malformed entry must not poison the whole batch.
            let Ok(alert) = serde_json::from_value::<VmaAlert>(raw) else {
                tracing::debug!(feed = "vma", "skipping malformed alert entry");
                continue;
            };
            if let Some(message) = render_alert(&alert) {
                tracing::info!(feed = "vma", message = %message, "active alert");
                messages.push(message);
            }
        }
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{HttpRetryConfig, VmaFeedConfig},
        http_client::build_feed_http_client,
    };
    use serde_json::json;

    fn feed_for(server: &mockito::ServerGuard) -> VmaFeed {
        let config = VmaFeedConfig {
            url: url::Url::parse(&server.url()).unwrap(),
            ..VmaFeedConfig::default()
        };
        // No retries: error paths should fail fast in tests.
        let retry = HttpRetryConfig { max_retries: 0, ..HttpRetryConfig::default() };
        let client = build_feed_http_client(&retry).unwrap();
        VmaFeed::new(client, config)
    }

    fn alert(status: &str, msg_type: &str, description: &str) -> serde_json::Value {
        json!({
            "status": status,
            "msgType": msg_type,
            "sent": "2026-08-04T10:00:00+02:00",
            "info": [{"event": "Storm", "description": description}],
        })
    }

    #[test]
    fn actual_alert_renders_description() {
        let alert = VmaAlert {
            status: "Actual".to_string(),
            info: vec![VmaInfo {
                event: "Storm".to_string(),
                description: "Kraftig storm väntas".to_string(),
            }],
            ..VmaAlert::default()
        };
        assert_eq!(render_alert(&alert).unwrap(), "VMA: Kraftig storm väntas");
    }

    #[test]
    fn actual_alert_without_description_gets_fallback() {
        let alert = VmaAlert { status: "Actual".to_string(), ..VmaAlert::default() };
        assert_eq!(
            render_alert(&alert).unwrap(),
            "VMA: Viktigt meddelande till allmänheten (detaljer saknas)."
        );
    }

    #[test]
    fn cancel_renders_issue_timestamp() {
        let alert = VmaAlert {
            status: "Actual".to_string(),
            msg_type: "Cancel".to_string(),
            sent: Some("2026-08-04T10:00:00+02:00".to_string()),
            ..VmaAlert::default()
        };
        assert_eq!(
            render_alert(&alert).unwrap(),
            "UPPHÄVD: Varningen utfärdad 2026-08-04 10:00 är inte längre aktuell. Faran är över."
        );
    }

    #[test]
    fn cancel_without_timestamp_says_tidigare() {
        let alert = VmaAlert {
            status: "Actual".to_string(),
            msg_type: "Cancel".to_string(),
            ..VmaAlert::default()
        };
        assert!(render_alert(&alert).unwrap().contains("tidigare"));
    }

    #[test]
    fn test_status_cancel_is_skipped() {
        let alert = VmaAlert {
            status: "Test".to_string(),
            msg_type: "Cancel".to_string(),
            ..VmaAlert::default()
        };
        assert!(render_alert(&alert).is_none());
    }

    #[test]
    fn quarterly_siren_test_gets_fixed_phrasing() {
        let alert = VmaAlert {
            status: "Exercise".to_string(),
            info: vec![VmaInfo {
                event: QUARTERLY_TEST_EVENT.to_string(),
                description: String::new(),
            }],
            ..VmaAlert::default()
        };
        assert_eq!(render_alert(&alert).unwrap(), QUARTERLY_TEST_MESSAGE);
    }

    #[test]
    fn generic_exercise_renders_as_ovning() {
        let alert = VmaAlert {
            status: "Exercise".to_string(),
            info: vec![VmaInfo {
                event: "Övning".to_string(),
                description: "Regional övning".to_string(),
            }],
            ..VmaAlert::default()
        };
        assert_eq!(render_alert(&alert).unwrap(), "ÖVNING: Regional övning");
    }

    #[tokio::test]
    async fn fetch_renders_actual_alerts() {
        let mut server = mockito::Server::new_async().await;
        let body = json!({
            "alerts": [
                alert("Actual", "Alert", "Kraftig storm väntas"),
                alert("Unknown", "Alert", "ignored"),
            ]
        });
        let mock = server
            .mock("GET", mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await;

        let messages = feed_for(&server).fetch().await.unwrap();

        assert_eq!(messages, vec!["VMA: Kraftig storm väntas".to_string()]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn malformed_entries_are_skipped_not_fatal() {
        let mut server = mockito::Server::new_async().await;
        let body = json!({
            "alerts": [
                42,
                alert("Actual", "Alert", "Kraftig storm väntas"),
            ]
        });
        let _mock = server
            .mock("GET", mockito::Matcher::Any)
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;

        let messages = feed_for(&server).fetch().await.unwrap();
        assert_eq!(messages.len(), 1);
    }

    #[tokio::test]
    async fn upstream_error_status_is_a_feed_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", mockito::Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        assert!(feed_for(&server).fetch().await.is_err());
    }
}
