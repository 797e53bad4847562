pub mod api;

use crate::error::TransportError;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;

/// One trending keyword as reported by the backend.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct KeywordRecord {
    pub keyword: String,
    #[serde(default)]
    pub mentions: u64,
    #[serde(default)]
    pub sentiment: f64,
}

impl KeywordRecord {
    pub fn new(keyword: impl Into<String>, mentions: u64, sentiment: f64) -> Self {
        Self {
            keyword: keyword.into(),
            mentions,
            sentiment,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ReportResult {
    pub keyword: String,
    pub report: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportOptions {
    pub period: String,
    pub include_sentiment: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            period: "24h".to_string(),
            include_sentiment: true,
        }
    }
}

impl From<&crate::config::ReportConfig> for ReportOptions {
    fn from(config: &crate::config::ReportConfig) -> Self {
        Self {
            period: config.period.clone(),
            include_sentiment: config.include_sentiment,
        }
    }
}

/// The backend that owns mention counts, sentiment and report text.
#[async_trait]
pub trait KeywordSource: Send + Sync {
    async fn fetch_dataset(&self) -> Result<Vec<KeywordRecord>, TransportError>;

    async fn fetch_report(
        &self,
        keyword: &str,
        options: &ReportOptions,
    ) -> Result<ReportResult, TransportError>;
}

/// Drops blank keywords and repeated keywords (first occurrence wins) so a
/// snapshot never holds two tokens with the same text.
pub fn sanitize_records(records: Vec<KeywordRecord>) -> Vec<KeywordRecord> {
    let mut seen = HashSet::new();
    let total = records.len();

    let cleaned: Vec<KeywordRecord> = records
        .into_iter()
        .filter(|r| !r.keyword.trim().is_empty())
        .filter(|r| seen.insert(r.keyword.clone()))
        .collect();

    if cleaned.len() != total {
        tracing::warn!(
            dropped = total - cleaned.len(),
            "dataset contained blank or duplicate keywords"
        );
    }

    cleaned
}

/// Accepts RFC 3339, a naive ISO timestamp (taken as UTC), or unix seconds.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Seconds(i64),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Seconds(secs) => Utc
            .timestamp_opt(secs, 0)
            .single()
            .ok_or_else(|| serde::de::Error::custom(format!("timestamp out of range: {secs}"))),
        Raw::Text(text) => parse_timestamp(&text).ok_or_else(|| {
            serde::de::Error::custom(format!("unrecognized timestamp: {text}"))
        }),
    }
}

fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}
