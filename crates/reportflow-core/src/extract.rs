//! Extraction orchestrator: runs every enabled report family for one property
//! and assembles the output document.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::client::{ClientFactory, Credentials};
use crate::config::ExtractConfig;
use crate::error::CoreError;
use crate::funnel::{derive_funnel, FunnelRecord};
use crate::parse::{parse_multi, parse_single, Record};
use crate::registry::{PageReports, ReportFamily, ReportPlan, ReportRegistry, TransactionReports};
use crate::report::DateRange;
use crate::runner::{CallLog, ReportFailure, ReportRunner, Sleeper, TokioSleeper};
use crate::unify::{merge_transactions, unify_pages, PageRecord, TransactionRecord};

pub const EXTRACTOR_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Run metadata stored under `info`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionManifest {
    pub property_id: String,
    pub date_range: DateRange,
    pub extracted_at: DateTime<Utc>,
    pub version: String,
    pub enabled: Vec<ReportFamily>,
    /// One per report definition executed; retries are not counted.
    pub api_calls: u32,
    pub errors: Vec<ReportFailure>,
    pub duration_ms: u64,
}

/// The output document. Disabled families stay `None` and are not serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub info: ExtractionManifest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<Record>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<Vec<PageRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<Vec<Record>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_events: Option<BTreeMap<String, Vec<Record>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transactions: Option<Vec<TransactionRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic_sources: Option<Vec<Record>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaigns: Option<Vec<Record>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub devices: Option<Vec<Record>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<Record>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_groups: Option<Vec<Record>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_trend: Option<Vec<Record>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hourly_traffic: Option<Vec<Record>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_week: Option<Vec<Record>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_vs_returning: Option<Vec<Record>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_segments: Option<Vec<Record>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_terms: Option<Vec<Record>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll_depth: Option<Vec<Record>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engagement: Option<Record>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversion_funnel: Option<FunnelRecord>,
}

impl ExtractionResult {
    fn empty(info: ExtractionManifest) -> Self {
        Self {
            info,
            summary: None,
            pages: None,
            events: None,
            key_events: None,
            transactions: None,
            traffic_sources: None,
            campaigns: None,
            devices: None,
            locations: None,
            content_groups: None,
            daily_trend: None,
            hourly_traffic: None,
            day_of_week: None,
            new_vs_returning: None,
            user_segments: None,
            search_terms: None,
            scroll_depth: None,
            engagement: None,
            conversion_funnel: None,
        }
    }

    pub fn to_value(&self) -> Result<serde_json::Value, CoreError> {
        Ok(serde_json::to_value(self)?)
    }

    fn set_aggregate(&mut self, family: ReportFamily, record: Record) {
        match family {
            ReportFamily::Summary => self.summary = Some(record),
            ReportFamily::Engagement => self.engagement = Some(record),
            ReportFamily::Pages
            | ReportFamily::Events
            | ReportFamily::Transactions
            | ReportFamily::TrafficSources
            | ReportFamily::Campaigns
            | ReportFamily::Devices
            | ReportFamily::Locations
            | ReportFamily::ContentGroups
            | ReportFamily::DailyTrend
            | ReportFamily::HourlyTraffic
            | ReportFamily::DayOfWeek
            | ReportFamily::NewVsReturning
            | ReportFamily::UserSegments
            | ReportFamily::SearchTerms
            | ReportFamily::ScrollDepth
            | ReportFamily::ConversionFunnel => {
                warn!(family = %family, "family has no aggregate slot, dropped");
            }
        }
    }

    /// Slot for a family stored as a plain row list.
    fn rows_slot(&mut self, family: ReportFamily) -> Option<&mut Option<Vec<Record>>> {
        let slot = match family {
            ReportFamily::TrafficSources => &mut self.traffic_sources,
            ReportFamily::Campaigns => &mut self.campaigns,
            ReportFamily::Devices => &mut self.devices,
            ReportFamily::Locations => &mut self.locations,
            ReportFamily::ContentGroups => &mut self.content_groups,
            ReportFamily::DailyTrend => &mut self.daily_trend,
            ReportFamily::HourlyTraffic => &mut self.hourly_traffic,
            ReportFamily::DayOfWeek => &mut self.day_of_week,
            ReportFamily::NewVsReturning => &mut self.new_vs_returning,
            ReportFamily::UserSegments => &mut self.user_segments,
            ReportFamily::SearchTerms => &mut self.search_terms,
            ReportFamily::ScrollDepth => &mut self.scroll_depth,
            ReportFamily::Events => &mut self.events,
            ReportFamily::Summary
            | ReportFamily::Pages
            | ReportFamily::Transactions
            | ReportFamily::Engagement
            | ReportFamily::ConversionFunnel => return None,
        };
        Some(slot)
    }
}

pub struct Extractor {
    config: ExtractConfig,
    registry: ReportRegistry,
    factory: Arc<dyn ClientFactory>,
    sleeper: Arc<dyn Sleeper>,
}

impl Extractor {
    pub fn new(config: ExtractConfig, factory: Arc<dyn ClientFactory>) -> Self {
        let registry = ReportRegistry::from_config(&config);
        Self {
            config,
            registry,
            factory,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn registry(&self) -> &ReportRegistry {
        &self.registry
    }

    pub fn default_days(&self) -> u32 {
        self.config.default_days
    }

    /// Extract the window ending today (UTC).
    pub async fn extract(
        &self,
        property_id: &str,
        credentials: &Credentials,
        days: Option<u32>,
    ) -> Result<ExtractionResult, CoreError> {
        self.extract_on(Utc::now().date_naive(), property_id, credentials, days)
            .await
    }

    /// Extract the window ending on `today`.
    ///
    /// Fails only before the first report is issued (bad window, client
    /// setup). Individual report failures end up in `info.errors`.
    pub async fn extract_on(
        &self,
        today: NaiveDate,
        property_id: &str,
        credentials: &Credentials,
        days: Option<u32>,
    ) -> Result<ExtractionResult, CoreError> {
        let range = DateRange::ending_on(today, days.unwrap_or(self.config.default_days))?;
        let client = self.factory.connect(credentials)?;
        let runner = ReportRunner::new(client, self.sleeper.clone(), self.config.retry, property_id);

        let started = Instant::now();
        let log = CallLog::new();
        info!(
            property_id,
            start = %range.start,
            end = %range.end,
            families = self.registry.entries().len(),
            "extraction started"
        );

        let mut result = ExtractionResult::empty(ExtractionManifest {
            property_id: property_id.to_string(),
            date_range: range,
            extracted_at: Utc::now(),
            version: EXTRACTOR_VERSION.to_string(),
            enabled: self.registry.families(),
            api_calls: 0,
            errors: Vec::new(),
            duration_ms: 0,
        });

        for entry in self.registry.entries() {
            debug!(family = %entry.family, "extracting family");
            match &entry.plan {
                ReportPlan::Aggregate(spec) => {
                    let raw = runner.run(spec, &range, &log).await;
                    result.set_aggregate(entry.family, parse_single(raw.as_ref()));
                }
                ReportPlan::Rows(spec) => {
                    let raw = runner.run(spec, &range, &log).await;
                    match result.rows_slot(entry.family) {
                        Some(slot) => *slot = Some(parse_multi(raw.as_ref())),
                        None => warn!(family = %entry.family, "family has no row slot, dropped"),
                    }
                }
                ReportPlan::Events {
                    overview,
                    key_events,
                } => {
                    let raw = runner.run(overview, &range, &log).await;
                    result.events = Some(parse_multi(raw.as_ref()));

                    let mut details = BTreeMap::new();
                    for (event, spec) in key_events {
                        let raw = runner.run(spec, &range, &log).await;
                        details.insert(event.clone(), parse_multi(raw.as_ref()));
                    }
                    result.key_events = Some(details);
                }
                ReportPlan::Pages(reports) => {
                    result.pages = Some(fetch_pages(&runner, reports, &range, &log).await);
                }
                ReportPlan::Transactions(reports) => {
                    result.transactions =
                        Some(fetch_transactions(&runner, reports, &range, &log).await);
                }
                // Derived below, once every fetch is done.
                ReportPlan::Funnel => {}
            }
        }

        if self.registry.is_enabled(ReportFamily::ConversionFunnel) {
            let events = result.events.as_deref().unwrap_or_default();
            result.conversion_funnel = Some(derive_funnel(events));
        }

        result.info.api_calls = log.calls();
        result.info.errors = log.failures();
        result.info.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            property_id,
            api_calls = result.info.api_calls,
            errors = result.info.errors.len(),
            duration_ms = result.info.duration_ms,
            "extraction finished"
        );
        Ok(result)
    }
}

async fn fetch_pages(
    runner: &ReportRunner,
    reports: &PageReports,
    range: &DateRange,
    log: &CallLog,
) -> Vec<PageRecord> {
    let logs: [CallLog; 4] = Default::default();
    let (base, events, sources, devices) = tokio::join!(
        runner.run(&reports.metrics, range, &logs[0]),
        runner.run(&reports.events, range, &logs[1]),
        runner.run(&reports.sources, range, &logs[2]),
        runner.run(&reports.devices, range, &logs[3]),
    );
    for sub in logs {
        log.absorb(sub);
    }
    unify_pages(
        base.as_ref(),
        events.as_ref(),
        sources.as_ref(),
        devices.as_ref(),
    )
}

async fn fetch_transactions(
    runner: &ReportRunner,
    reports: &TransactionReports,
    range: &DateRange,
    log: &CallLog,
) -> Vec<TransactionRecord> {
    let logs: [CallLog; 3] = Default::default();
    let (base, payment, sources) = tokio::join!(
        runner.run(&reports.base, range, &logs[0]),
        runner.run(&reports.payment, range, &logs[1]),
        runner.run(&reports.sources, range, &logs[2]),
    );
    for sub in logs {
        log.absorb(sub);
    }
    merge_transactions(base.as_ref(), payment.as_ref(), sources.as_ref())
}
