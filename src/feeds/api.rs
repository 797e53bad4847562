use super::{KeywordRecord, KeywordSource, ReportOptions, ReportResult};
use crate::config::ApiConfig;
use crate::error::TransportError;
use async_trait::async_trait;
use serde::Deserialize;

pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DatasetPayload {
    Wrapped { data: Vec<KeywordRecord> },
    Bare(Vec<KeywordRecord>),
}

impl DatasetPayload {
    fn into_records(self) -> Vec<KeywordRecord> {
        match self {
            DatasetPayload::Wrapped { data } => data,
            DatasetPayload::Bare(records) => records,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

/// Mentions and sentiment of one keyword over one period of its history.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HistoryPoint {
    #[serde(alias = "timestamp")]
    pub date: String,
    #[serde(default)]
    pub mentions: u64,
    #[serde(default)]
    pub sentiment: f64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HistoryPayload {
    Wrapped {
        #[serde(alias = "data")]
        history: Vec<HistoryPoint>,
    },
    Bare(Vec<HistoryPoint>),
}

impl HistoryPayload {
    fn into_points(self) -> Vec<HistoryPoint> {
        match self {
            HistoryPayload::Wrapped { history } => history,
            HistoryPayload::Bare(points) => points,
        }
    }
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("trendcloud/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn dataset_url(&self) -> String {
        format!("{}/api/stock-data", self.base_url)
    }

    fn report_url(&self, keyword: &str) -> String {
        format!(
            "{}/api/reports/{}",
            self.base_url,
            urlencoding::encode(keyword)
        )
    }

    fn history_url(&self, keyword: &str) -> String {
        format!(
            "{}/api/history/{}",
            self.base_url,
            urlencoding::encode(keyword)
        )
    }

    /// Daily mentions and sentiment for `keyword` over the last `days` days.
    pub async fn fetch_history(
        &self,
        keyword: &str,
        days: u32,
    ) -> Result<Vec<HistoryPoint>, TransportError> {
        let url = self.history_url(keyword);
        tracing::debug!(%url, days, "fetching keyword history");

        let response = self
            .client
            .get(&url)
            .query(&[("days", days)])
            .send()
            .await?;
        let response = ensure_success(response)?;

        let body = response.text().await?;
        let payload: HistoryPayload =
            serde_json::from_str(&body).map_err(|e| TransportError::Decode(e.to_string()))?;
        Ok(payload.into_points())
    }

    pub async fn check_health(&self) -> Result<HealthStatus, TransportError> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().await?;
        let response = ensure_success(response)?;
        Ok(response.json().await?)
    }
}

fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, TransportError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(TransportError::Status(response.status().as_u16()))
    }
}

#[async_trait]
impl KeywordSource for ApiClient {
    async fn fetch_dataset(&self) -> Result<Vec<KeywordRecord>, TransportError> {
        let url = self.dataset_url();
        tracing::debug!(%url, "fetching keyword dataset");

        let response = self.client.get(&url).send().await?;
        let response = ensure_success(response)?;

        let body = response.text().await?;
        let payload: DatasetPayload =
            serde_json::from_str(&body).map_err(|e| TransportError::Decode(e.to_string()))?;

        Ok(super::sanitize_records(payload.into_records()))
    }

    async fn fetch_report(
        &self,
        keyword: &str,
        options: &ReportOptions,
    ) -> Result<ReportResult, TransportError> {
        let url = self.report_url(keyword);
        tracing::debug!(%url, period = %options.period, "requesting keyword report");

        let response = self.client.post(&url).json(options).send().await?;
        let response = ensure_success(response)?;

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| TransportError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> ApiClient {
        ApiClient::new(&ApiConfig {
            base_url: base.to_string(),
            timeout_ms: 500,
        })
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let api = client("http://localhost:8000/");
        assert_eq!(api.base_url(), "http://localhost:8000");
        assert_eq!(api.dataset_url(), "http://localhost:8000/api/stock-data");
    }

    #[test]
    fn test_report_url_encodes_keyword() {
        let api = client("http://localhost:8000");
        assert_eq!(
            api.report_url("S&P 500"),
            "http://localhost:8000/api/reports/S%26P%20500"
        );
    }

    #[test]
    fn test_history_url_encodes_keyword() {
        let api = client("http://localhost:8000/");
        assert_eq!(
            api.history_url("BRK.B & co"),
            "http://localhost:8000/api/history/BRK.B%20%26%20co"
        );
    }

    #[test]
    fn test_history_payload_shapes() {
        let wrapped: HistoryPayload = serde_json::from_str(
            r#"{"keyword":"AAPL","history":[{"date":"2024-05-01","mentions":120,"sentiment":0.4}]}"#,
        )
        .unwrap();
        assert_eq!(
            wrapped.into_points(),
            [HistoryPoint {
                date: "2024-05-01".to_string(),
                mentions: 120,
                sentiment: 0.4,
            }]
        );

        let bare: HistoryPayload =
            serde_json::from_str(r#"[{"timestamp":"2024-05-02T00:00:00Z"}]"#).unwrap();
        let points = bare.into_points();
        assert_eq!(points[0].date, "2024-05-02T00:00:00Z");
        assert_eq!(points[0].mentions, 0);

        assert!(serde_json::from_str::<HistoryPayload>(r#"{"status":"ok"}"#).is_err());
    }

    #[tokio::test]
    async fn test_history_unreachable_host_is_transport_error() {
        let api = client("http://127.0.0.1:9");
        let err = api.fetch_history("AAPL", 7).await.unwrap_err();
        assert!(matches!(
            err,
            TransportError::Request(_) | TransportError::Timeout
        ));
    }

    #[test]
    fn test_dataset_payload_shapes() {
        let wrapped: DatasetPayload =
            serde_json::from_str(r#"{"data":[{"keyword":"AAPL","mentions":500,"sentiment":0.8}]}"#)
                .unwrap();
        assert_eq!(wrapped.into_records().len(), 1);

        let bare: DatasetPayload =
            serde_json::from_str(r#"[{"keyword":"TSLA","mentions":50,"sentiment":-0.3}]"#).unwrap();
        assert_eq!(bare.into_records()[0].keyword, "TSLA");
    }

    #[test]
    fn test_report_options_wire_format() {
        let body = serde_json::to_value(ReportOptions::default()).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"period": "24h", "include_sentiment": true})
        );
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let api = client("http://127.0.0.1:9");
        let err = api.fetch_dataset().await.unwrap_err();
        assert!(matches!(
            err,
            TransportError::Request(_) | TransportError::Timeout
        ));
    }
}
