//! Joins of the page and transaction sub-reports into one record per entity.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::parse::metric_number;
use crate::registry::{dims, metrics};
use crate::report::RawReportResult;

/// Base page metrics, keyed by the API metric name, with the output field.
const PAGE_METRIC_FIELDS: [(&str, &str); 7] = [
    (metrics::PAGE_VIEWS, "pageViews"),
    (metrics::USERS, "activeUsers"),
    (metrics::NEW_USERS, "newUsers"),
    (metrics::AVG_SESSION_DURATION, "avgSessionDuration"),
    (metrics::BOUNCE_RATE, "bounceRate"),
    (metrics::ENGAGEMENT_RATE, "engagementRate"),
    (metrics::KEY_EVENTS, "keyEvents"),
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrafficShare {
    pub users: f64,
    pub sessions: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    #[serde(rename = "pagePath")]
    pub path: String,
    pub metrics: BTreeMap<String, f64>,
    pub events: BTreeMap<String, f64>,
    /// Keyed by `"source/medium"`.
    pub traffic_sources: BTreeMap<String, TrafficShare>,
    pub devices: BTreeMap<String, f64>,
}

impl PageRecord {
    fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            ..Self::default()
        }
    }

    pub fn page_views(&self) -> f64 {
        self.metrics.get("pageViews").copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub transaction_id: String,
    pub revenue: f64,
    #[serde(rename = "count")]
    pub event_count: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_type: Option<String>,
    /// `"source/medium"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic_source: Option<String>,
}

fn page_entry<'a>(pages: &'a mut BTreeMap<String, PageRecord>, path: &str) -> &'a mut PageRecord {
    pages
        .entry(path.to_string())
        .or_insert_with(|| PageRecord::new(path))
}

/// Column positions of the named headers, or `None` if any is missing.
fn dimension_columns<const N: usize>(result: &RawReportResult, names: [&str; N]) -> Option<[usize; N]> {
    let mut columns = [0usize; N];
    for (slot, name) in columns.iter_mut().zip(names) {
        *slot = result.dimension_index(name)?;
    }
    Some(columns)
}

fn metric_at(values: &[String], column: Option<usize>) -> f64 {
    column
        .and_then(|idx| values.get(idx))
        .map(|raw| metric_number(raw))
        .unwrap_or(0.0)
}

/// Full outer join of the four page sub-reports on `pagePath`.
///
/// Every path seen in any input yields exactly one record. A repeated
/// secondary key keeps its last row. Output is ordered by page views,
/// highest first; equal counts keep path order.
pub fn unify_pages(
    base: Option<&RawReportResult>,
    events: Option<&RawReportResult>,
    sources: Option<&RawReportResult>,
    devices: Option<&RawReportResult>,
) -> Vec<PageRecord> {
    let mut pages: BTreeMap<String, PageRecord> = BTreeMap::new();

    if let Some(result) = base {
        if let Some([page]) = dimension_columns(result, [dims::PAGE]) {
            let columns: Vec<(Option<usize>, &str)> = PAGE_METRIC_FIELDS
                .iter()
                .map(|(metric, field)| (result.metric_index(metric), *field))
                .collect();
            for row in &result.rows {
                let record = page_entry(&mut pages, &row.dimension_values[page]);
                for (column, field) in &columns {
                    if column.is_some() {
                        record
                            .metrics
                            .insert(field.to_string(), metric_at(&row.metric_values, *column));
                    }
                }
            }
        }
    }

    if let Some(result) = events {
        if let Some([page, event]) = dimension_columns(result, [dims::PAGE, dims::EVENT]) {
            let count = result.metric_index(metrics::EVENT_COUNT);
            for row in &result.rows {
                let value = metric_at(&row.metric_values, count);
                page_entry(&mut pages, &row.dimension_values[page])
                    .events
                    .insert(row.dimension_values[event].clone(), value);
            }
        }
    }

    if let Some(result) = sources {
        if let Some([page, source, medium]) =
            dimension_columns(result, [dims::PAGE, dims::SOURCE, dims::MEDIUM])
        {
            let users = result.metric_index(metrics::USERS);
            let sessions = result.metric_index(metrics::SESSIONS);
            for row in &result.rows {
                let key = format!(
                    "{}/{}",
                    row.dimension_values[source], row.dimension_values[medium]
                );
                let share = TrafficShare {
                    users: metric_at(&row.metric_values, users),
                    sessions: metric_at(&row.metric_values, sessions),
                };
                page_entry(&mut pages, &row.dimension_values[page])
                    .traffic_sources
                    .insert(key, share);
            }
        }
    }

    if let Some(result) = devices {
        if let Some([page, device]) = dimension_columns(result, [dims::PAGE, dims::DEVICE]) {
            let users = result.metric_index(metrics::USERS);
            for row in &result.rows {
                let value = metric_at(&row.metric_values, users);
                page_entry(&mut pages, &row.dimension_values[page])
                    .devices
                    .insert(row.dimension_values[device].clone(), value);
            }
        }
    }

    let mut records: Vec<PageRecord> = pages.into_values().collect();
    records.sort_by(|a, b| b.page_views().total_cmp(&a.page_views()));
    records
}

/// Left join of payment and source details onto the base transaction list.
///
/// Ids that only appear in the auxiliary reports are dropped. Output is
/// ordered by revenue, highest first; equal revenue keeps base order.
pub fn merge_transactions(
    base: Option<&RawReportResult>,
    payment: Option<&RawReportResult>,
    sources: Option<&RawReportResult>,
) -> Vec<TransactionRecord> {
    let mut records: Vec<TransactionRecord> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    if let Some(result) = base {
        if let Some([id]) = dimension_columns(result, [dims::TRANSACTION_ID]) {
            let revenue = result.metric_index(metrics::REVENUE);
            let count = result.metric_index(metrics::EVENT_COUNT);
            for row in &result.rows {
                let transaction_id = row.dimension_values[id].clone();
                let record = TransactionRecord {
                    transaction_id: transaction_id.clone(),
                    revenue: metric_at(&row.metric_values, revenue),
                    event_count: metric_at(&row.metric_values, count),
                    payment_type: None,
                    traffic_source: None,
                };
                match index.get(&transaction_id) {
                    Some(&pos) => records[pos] = record,
                    None => {
                        index.insert(transaction_id, records.len());
                        records.push(record);
                    }
                }
            }
        }
    }

    if let Some(result) = payment {
        if let Some([id, kind]) = dimension_columns(result, [dims::TRANSACTION_ID, dims::PAYMENT_TYPE]) {
            for row in &result.rows {
                if let Some(&pos) = index.get(&row.dimension_values[id]) {
                    records[pos].payment_type = Some(row.dimension_values[kind].clone());
                }
            }
        }
    }

    if let Some(result) = sources {
        if let Some([id, source, medium]) =
            dimension_columns(result, [dims::TRANSACTION_ID, dims::SOURCE, dims::MEDIUM])
        {
            for row in &result.rows {
                if let Some(&pos) = index.get(&row.dimension_values[id]) {
                    records[pos].traffic_source = Some(format!(
                        "{}/{}",
                        row.dimension_values[source], row.dimension_values[medium]
                    ));
                }
            }
        }
    }

    records.sort_by(|a, b| b.revenue.total_cmp(&a.revenue));
    records
}
