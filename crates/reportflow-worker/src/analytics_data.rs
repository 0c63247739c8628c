//! HTTP client for the Analytics Data API `runReport` method.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use reportflow_core::{
    ClientFactory, CoreError, Credentials, DateRange, RawReportResult, RawRow, ReportSpec,
    ReportingClient,
};

pub struct AnalyticsDataClient {
    client: Client,
    base_url: String,
    token: String,
}

impl AnalyticsDataClient {
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self, CoreError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::Setup(format!("http client build failed: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn endpoint(&self, property_id: &str) -> String {
        let id = property_id.trim().trim_start_matches("properties/");
        format!("{}/properties/{id}:runReport", self.base_url)
    }
}

/// JSON body of a `runReport` request.
pub fn request_body(spec: &ReportSpec, range: &DateRange) -> Value {
    let named = |names: &[String]| -> Vec<Value> {
        names.iter().map(|name| json!({ "name": name })).collect()
    };
    let mut body = json!({
        "dateRanges": [{"startDate": range.start_str(), "endDate": range.end_str()}],
        "dimensions": named(&spec.dimensions),
        "metrics": named(&spec.metrics),
    });
    if let Some(limit) = spec.limit {
        body["limit"] = json!(limit);
    }
    if let Some(order) = &spec.order {
        body["orderBys"] = json!([{"metric": {"metricName": order.metric}, "desc": order.desc}]);
    }
    if let Some(filter) = &spec.filter {
        body["dimensionFilter"] = json!({
            "filter": {
                "fieldName": filter.dimension,
                "stringFilter": {"matchType": "EXACT", "value": filter.value}
            }
        });
    }
    body
}

#[derive(Debug, Deserialize)]
struct Header {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Cell {
    #[serde(default)]
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiRow {
    #[serde(default)]
    dimension_values: Vec<Cell>,
    #[serde(default)]
    metric_values: Vec<Cell>,
}

/// Subset of the `runReport` response we read. An empty report has no `rows`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReportResponse {
    #[serde(default)]
    dimension_headers: Vec<Header>,
    #[serde(default)]
    metric_headers: Vec<Header>,
    #[serde(default)]
    rows: Vec<ApiRow>,
}

impl From<RunReportResponse> for RawReportResult {
    fn from(resp: RunReportResponse) -> Self {
        let values = |cells: Vec<Cell>| -> Vec<String> { cells.into_iter().map(|c| c.value).collect() };
        RawReportResult {
            dimension_headers: resp.dimension_headers.into_iter().map(|h| h.name).collect(),
            metric_headers: resp.metric_headers.into_iter().map(|h| h.name).collect(),
            rows: resp
                .rows
                .into_iter()
                .map(|row| RawRow {
                    dimension_values: values(row.dimension_values),
                    metric_values: values(row.metric_values),
                })
                .collect(),
        }
    }
}

#[async_trait]
impl ReportingClient for AnalyticsDataClient {
    async fn run_report(
        &self,
        property_id: &str,
        spec: &ReportSpec,
        range: &DateRange,
    ) -> anyhow::Result<RawReportResult> {
        let resp = self
            .client
            .post(self.endpoint(property_id))
            .bearer_auth(&self.token)
            .json(&request_body(spec, range))
            .send()
            .await
            .context("runReport request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("runReport error {status}: {body}");
        }

        let parsed: RunReportResponse = resp
            .json()
            .await
            .context("runReport response parse failed")?;
        Ok(parsed.into())
    }
}

/// Builds one [`AnalyticsDataClient`] per run from a bearer token.
pub struct AnalyticsDataFactory {
    base_url: String,
    timeout: Duration,
}

impl AnalyticsDataFactory {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.to_string(),
            timeout,
        }
    }
}

impl ClientFactory for AnalyticsDataFactory {
    fn connect(&self, credentials: &Credentials) -> Result<Arc<dyn ReportingClient>, CoreError> {
        if credentials.is_blank() {
            return Err(CoreError::Setup("missing access token".to_string()));
        }
        let client = AnalyticsDataClient::new(&self.base_url, credentials.secret(), self.timeout)?;
        Ok(Arc::new(client))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn range() -> DateRange {
        DateRange::ending_on(NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(), 30).unwrap()
    }

    #[test]
    fn body_carries_limit_order_and_filter() {
        let spec = ReportSpec::new("key_events.purchase", &["customEvent:page_location"], &["eventCount"])
            .with_limit(Some(50))
            .with_order(Some(reportflow_core::report::OrderBy::desc("eventCount")))
            .with_filter("eventName", "purchase");
        let body = request_body(&spec, &range());

        assert_eq!(body["dateRanges"][0]["startDate"], "2024-06-01");
        assert_eq!(body["dateRanges"][0]["endDate"], "2024-06-30");
        assert_eq!(body["dimensions"][0]["name"], "customEvent:page_location");
        assert_eq!(body["limit"], 50);
        assert_eq!(body["orderBys"][0]["metric"]["metricName"], "eventCount");
        assert_eq!(body["orderBys"][0]["desc"], true);
        assert_eq!(body["dimensionFilter"]["filter"]["fieldName"], "eventName");
        assert_eq!(body["dimensionFilter"]["filter"]["stringFilter"]["matchType"], "EXACT");
    }

    #[test]
    fn aggregate_body_has_no_optional_fields() {
        let spec = ReportSpec::new("summary", &[], &["activeUsers", "sessions"]);
        let body = request_body(&spec, &range());
        assert_eq!(body["dimensions"], json!([]));
        assert!(body.get("limit").is_none());
        assert!(body.get("orderBys").is_none());
        assert!(body.get("dimensionFilter").is_none());
    }

    #[test]
    fn response_converts_to_raw_result() {
        let raw = r#"{
            "dimensionHeaders": [{"name": "pagePath"}],
            "metricHeaders": [{"name": "screenPageViews", "type": "TYPE_INTEGER"}],
            "rows": [
                {"dimensionValues": [{"value": "/"}], "metricValues": [{"value": "42"}]},
                {"dimensionValues": [{"value": "/about"}], "metricValues": [{"value": "7"}]}
            ],
            "rowCount": 2,
            "kind": "analyticsData#runReport"
        }"#;
        let parsed: RunReportResponse = serde_json::from_str(raw).unwrap();
        let result: RawReportResult = parsed.into();
        assert_eq!(result.dimension_headers, vec!["pagePath"]);
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[1].metric_values, vec!["7"]);
        assert!(result.validate("pages.metrics").is_ok());
    }

    #[test]
    fn empty_report_has_no_rows_field() {
        let raw = r#"{"dimensionHeaders": [{"name": "date"}], "metricHeaders": [{"name": "sessions"}]}"#;
        let result: RawReportResult = serde_json::from_str::<RunReportResponse>(raw).unwrap().into();
        assert!(result.rows.is_empty());
        assert_eq!(result.metric_headers, vec!["sessions"]);
    }

    #[test]
    fn endpoint_accepts_prefixed_property_ids() {
        let client = AnalyticsDataClient::new("https://example.test/v1beta/", "t", Duration::from_secs(1)).unwrap();
        assert_eq!(client.endpoint("123"), "https://example.test/v1beta/properties/123:runReport");
        assert_eq!(
            client.endpoint("properties/123"),
            "https://example.test/v1beta/properties/123:runReport"
        );
    }

    #[test]
    fn factory_rejects_blank_token() {
        let factory = AnalyticsDataFactory::new("https://example.test", Duration::from_secs(1));
        let err = factory.connect(&Credentials::new("")).err().unwrap();
        assert!(matches!(err, CoreError::Setup(_)));
        assert!(factory.connect(&Credentials::new("token")).is_ok());
    }
}
