//! Query shapes and raw results exchanged with the reporting API.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub metric: String,
    pub desc: bool,
}

impl OrderBy {
    pub fn desc(metric: &str) -> Self {
        Self {
            metric: metric.to_string(),
            desc: true,
        }
    }
}

/// Exact-match filter on one dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionFilter {
    pub dimension: String,
    pub value: String,
}

/// One query shape against the reporting API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSpec {
    pub name: String,
    pub dimensions: Vec<String>,
    pub metrics: Vec<String>,
    pub limit: Option<u32>,
    pub order: Option<OrderBy>,
    /// `false` makes the runner give up after the first failed attempt.
    pub retry: bool,
    pub filter: Option<DimensionFilter>,
}

impl ReportSpec {
    pub fn new(name: &str, dimensions: &[&str], metrics: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            dimensions: dimensions.iter().map(|d| d.to_string()).collect(),
            metrics: metrics.iter().map(|m| m.to_string()).collect(),
            limit: None,
            order: None,
            retry: true,
            filter: None,
        }
    }

    pub fn with_limit(mut self, limit: Option<u32>) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_order(mut self, order: Option<OrderBy>) -> Self {
        self.order = order;
        self
    }

    pub fn with_filter(mut self, dimension: &str, value: &str) -> Self {
        self.filter = Some(DimensionFilter {
            dimension: dimension.to_string(),
            value: value.to_string(),
        });
        self
    }

    pub fn without_retry(mut self) -> Self {
        self.retry = false;
        self
    }
}

/// Inclusive reporting window ending on "today".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days: u32,
}

impl DateRange {
    /// `start = end - (days - 1)`, so a one-day window covers only `end`.
    pub fn ending_on(end: NaiveDate, days: u32) -> Result<Self, CoreError> {
        if days == 0 {
            return Err(CoreError::InvalidDateRange(
                "days must be at least 1".to_string(),
            ));
        }
        let start = end - Duration::days(i64::from(days) - 1);
        Ok(Self { start, end, days })
    }

    pub fn start_str(&self) -> String {
        self.start.format("%Y-%m-%d").to_string()
    }

    pub fn end_str(&self) -> String {
        self.end.format("%Y-%m-%d").to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRow {
    pub dimension_values: Vec<String>,
    pub metric_values: Vec<String>,
}

/// Tabular response of one report call. Values are kept as the API sends them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawReportResult {
    pub dimension_headers: Vec<String>,
    pub metric_headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl RawReportResult {
    pub fn dimension_index(&self, name: &str) -> Option<usize> {
        self.dimension_headers.iter().position(|h| h == name)
    }

    pub fn metric_index(&self, name: &str) -> Option<usize> {
        self.metric_headers.iter().position(|h| h == name)
    }

    /// Check that every row carries one value per header.
    pub fn validate(&self, report: &str) -> Result<(), CoreError> {
        for (idx, row) in self.rows.iter().enumerate() {
            if row.dimension_values.len() != self.dimension_headers.len()
                || row.metric_values.len() != self.metric_headers.len()
            {
                return Err(CoreError::MalformedResponse {
                    report: report.to_string(),
                    detail: format!(
                        "row {idx} has {}/{} values for {}/{} headers",
                        row.dimension_values.len(),
                        row.metric_values.len(),
                        self.dimension_headers.len(),
                        self.metric_headers.len()
                    ),
                });
            }
        }
        Ok(())
    }
}
