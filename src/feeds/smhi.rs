//! The SMHI weather warning feed.
//!
//! Polls the impact-based weather warning API, keeps the warning areas that
//! touch the configured district, and renders each as one Swedish message
//! with the validity range in local (Europe/Stockholm) time. Compass
//! directions are abbreviated to keep frames short on the air.

use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use regex::{Regex, RegexBuilder};
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;

use super::{AlertFeed, FeedError};
use crate::config::SmhiFeedConfig;

const LOCAL_TZ: Tz = chrono_tz::Europe::Stockholm;

/// Compass-direction abbreviations, longest first so compounds win over
/// their suffixes.
const DIRECTION_ABBREVIATIONS: [(&str, &str); 8] = [
    ("nordöstra", "NÖ"),
    ("nordvästra", "NV"),
    ("sydöstra", "SÖ"),
    ("sydvästra", "SV"),
    ("norra", "N"),
    ("södra", "S"),
    ("östra", "Ö"),
    ("västra", "V"),
];

static DIRECTION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    let alternation = DIRECTION_ABBREVIATIONS
        .iter()
        .map(|(word, _)| regex::escape(word))
        .collect::<Vec<_>>()
        .join("|");
    RegexBuilder::new(&alternation)
        .case_insensitive(true)
        .build()
        .expect("static alternation of literals is a valid pattern")
});

/// Alert feed backed by the SMHI warnings API.
pub struct SmhiFeed {
    client: ClientWithMiddleware,
    config: SmhiFeedConfig,
}

impl SmhiFeed {
    /// Creates the feed over a shared retryable HTTP client.
    pub fn new(client: ClientWithMiddleware, config: SmhiFeedConfig) -> Self {
        Self { client, config }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SmhiWarning {
    id: i64,
    warning_areas: Vec<SmhiWarningArea>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SmhiWarningArea {
    warning_level: LocalizedCode,
    affected_areas: Vec<AreaRef>,
    approximate_start: String,
    approximate_end: String,
    area_name: Localized,
    event_description: Localized,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LocalizedCode {
    code: String,
    sv: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Localized {
    sv: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AreaRef {
    id: i64,
}

/// Parses an upstream timestamp into local time. A timestamp without an
/// offset is taken as UTC.
fn parse_local(raw: &str) -> Option<DateTime<Tz>> {
    let utc = match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => ts.with_timezone(&Utc),
        Err(_) => NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S").ok()?.and_utc(),
    };
    Some(utc.with_timezone(&LOCAL_TZ))
}

/// Renders a validity range, collapsing the end to time-of-day when both
/// endpoints share a date. The tz abbreviation is written once when the
/// endpoints agree on it, per endpoint across a DST boundary.
fn format_range(start: DateTime<Tz>, end: DateTime<Tz>) -> String {
    let start_tz = start.format("%Z").to_string();
    let end_tz = end.format("%Z").to_string();

    let start_txt = start.format("%d/%m %H:%M").to_string();
    let end_txt = if start.date_naive() == end.date_naive() {
        end.format("%H:%M").to_string()
    } else {
        end.format("%d/%m %H:%M").to_string()
    };

    if start_tz == end_tz {
        format!("{start_txt} - {end_txt} {start_tz}")
    } else {
        format!("{start_txt} {start_tz} - {end_txt} {end_tz}")
    }
}

/// Replaces spelled-out compass directions with their abbreviations,
/// case-insensitively.
fn abbreviate_directions(text: &str) -> String {
    DIRECTION_PATTERN
        .replace_all(text, |captures: &regex::Captures<'_>| {
            let original = &captures[0];
            let key = original.to_lowercase();
            match DIRECTION_ABBREVIATIONS.iter().find(|(word, _)| *word == key) {
                Some((_, abbreviation)) => (*abbreviation).to_string(),
                None => original.to_string(),
            }
        })
        .into_owned()
}

#[async_trait]
impl AlertFeed for SmhiFeed {
    fn name(&self) -> &str {
        "smhi"
    }

    async fn fetch(&self) -> Result<Vec<String>, FeedError> {
        let response = self.client.get(self.config.url.clone()).send().await?;
        let warnings: Vec<serde_json::Value> = response.error_for_status()?.json().await?;

        let mut messages = Vec::new();
        for raw in warnings {
            let Ok(warning) = serde_json::from_value::<SmhiWarning>(raw) else {
                tracing::debug!(feed = "smhi", "skipping malformed warning entry");
                continue;
            };
            for area in &warning.warning_areas {
                // Plain informational messages are not warnings.
                if area.warning_level.code == "MESSAGE" {
                    continue;
                }
                if !area.affected_areas.iter().any(|a| a.id == self.config.geocode) {
                    continue;
                }
                let (Some(start), Some(end)) =
                    (parse_local(&area.approximate_start), parse_local(&area.approximate_end))
                else {
                    tracing::warn!(
                        feed = "smhi",
                        warning_id = warning.id,
                        "skipping warning area with unparseable validity range"
                    );
                    continue;
                };
                let message = abbreviate_directions(&format!(
                    "SMHI: {} varning {} - {} [{}]",
                    area.warning_level.sv,
                    area.area_name.sv,
                    area.event_description.sv,
                    format_range(start, end),
                ));
                tracing::info!(feed = "smhi", warning_id = warning.id, message = %message, "active warning");
                messages.push(message);
            }
        }
        Ok(messages)
    }
}
