//! Report families and the static table of report definitions behind them.
//!
//! A family is one key of the output document. Most families issue a single
//! report; `pages` and `transactions` issue several sub-reports that the
//! unifier merges, `events` adds one detail report per key event, and the
//! conversion funnel is derived without any call.

use serde::{Deserialize, Serialize};

use crate::config::{ExtractConfig, FamilySettings};
use crate::error::CoreError;
use crate::report::{OrderBy, ReportSpec};

pub mod dims {
    pub const PAGE: &str = "pagePath";
    pub const EVENT: &str = "eventName";
    pub const SOURCE: &str = "sessionSource";
    pub const MEDIUM: &str = "sessionMedium";
    pub const DEVICE: &str = "deviceCategory";
    pub const CITY: &str = "city";
    pub const COUNTRY: &str = "country";
    pub const DATE: &str = "date";
    pub const HOUR: &str = "hour";
    pub const DAY_OF_WEEK: &str = "dayOfWeek";
    pub const NEW_VS_RETURNING: &str = "newVsReturning";
    pub const OPERATING_SYSTEM: &str = "operatingSystem";
    pub const BROWSER: &str = "browser";

    pub const TRANSACTION_ID: &str = "customEvent:transaction_id";
    pub const PAYMENT_TYPE: &str = "customEvent:payment_type";
    pub const CAMPAIGN: &str = "customEvent:campaign";
    pub const UTM_SOURCE: &str = "customEvent:source";
    pub const UTM_MEDIUM: &str = "customEvent:medium";
    pub const CONTENT_GROUP: &str = "customEvent:content_group";
    pub const PAGE_LOCATION: &str = "customEvent:page_location";
    pub const USER_TYPE: &str = "customEvent:user_type";
    pub const SCROLL_DEPTH: &str = "customEvent:scroll_depth";
    pub const SEARCH_TERM: &str = "customEvent:search_term";
}

pub mod metrics {
    pub const USERS: &str = "activeUsers";
    pub const NEW_USERS: &str = "newUsers";
    pub const SESSIONS: &str = "sessions";
    pub const PAGE_VIEWS: &str = "screenPageViews";
    pub const BOUNCE_RATE: &str = "bounceRate";
    pub const KEY_EVENTS: &str = "keyEvents";
    pub const REVENUE: &str = "purchaseRevenue";
    pub const TRANSACTIONS: &str = "transactions";
    pub const EVENT_COUNT: &str = "eventCount";
    pub const AVG_SESSION_DURATION: &str = "averageSessionDuration";
    pub const ENGAGEMENT_RATE: &str = "engagementRate";
    pub const ENGAGEMENT_DURATION: &str = "userEngagementDuration";
    pub const SESSIONS_PER_USER: &str = "sessionsPerUser";
}

/// Row cap for each key-event detail report.
pub const KEY_EVENT_DETAIL_LIMIT: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportFamily {
    Summary,
    Pages,
    Events,
    Transactions,
    TrafficSources,
    Campaigns,
    Devices,
    Locations,
    ContentGroups,
    DailyTrend,
    HourlyTraffic,
    DayOfWeek,
    NewVsReturning,
    UserSegments,
    SearchTerms,
    ScrollDepth,
    Engagement,
    ConversionFunnel,
}

impl ReportFamily {
    /// Declaration order; extraction follows it.
    pub const ALL: [ReportFamily; 18] = [
        ReportFamily::Summary,
        ReportFamily::Pages,
        ReportFamily::Events,
        ReportFamily::Transactions,
        ReportFamily::TrafficSources,
        ReportFamily::Campaigns,
        ReportFamily::Devices,
        ReportFamily::Locations,
        ReportFamily::ContentGroups,
        ReportFamily::DailyTrend,
        ReportFamily::HourlyTraffic,
        ReportFamily::DayOfWeek,
        ReportFamily::NewVsReturning,
        ReportFamily::UserSegments,
        ReportFamily::SearchTerms,
        ReportFamily::ScrollDepth,
        ReportFamily::Engagement,
        ReportFamily::ConversionFunnel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportFamily::Summary => "summary",
            ReportFamily::Pages => "pages",
            ReportFamily::Events => "events",
            ReportFamily::Transactions => "transactions",
            ReportFamily::TrafficSources => "traffic_sources",
            ReportFamily::Campaigns => "campaigns",
            ReportFamily::Devices => "devices",
            ReportFamily::Locations => "locations",
            ReportFamily::ContentGroups => "content_groups",
            ReportFamily::DailyTrend => "daily_trend",
            ReportFamily::HourlyTraffic => "hourly_traffic",
            ReportFamily::DayOfWeek => "day_of_week",
            ReportFamily::NewVsReturning => "new_vs_returning",
            ReportFamily::UserSegments => "user_segments",
            ReportFamily::SearchTerms => "search_terms",
            ReportFamily::ScrollDepth => "scroll_depth",
            ReportFamily::Engagement => "engagement",
            ReportFamily::ConversionFunnel => "conversion_funnel",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let trimmed = raw.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|family| family.as_str() == trimmed)
            .ok_or_else(|| CoreError::Config(format!("unknown report family: {trimmed}")))
    }

    /// Built-in enable flag, row limit and ordering.
    pub fn default_settings(&self) -> FamilySettings {
        let (enabled, limit, order) = match self {
            ReportFamily::Pages => (true, Some(100), Some(OrderBy::desc(metrics::PAGE_VIEWS))),
            ReportFamily::Events => (true, Some(200), Some(OrderBy::desc(metrics::EVENT_COUNT))),
            ReportFamily::Transactions => (true, Some(1000), None),
            ReportFamily::TrafficSources => (true, Some(100), Some(OrderBy::desc(metrics::USERS))),
            ReportFamily::Campaigns => (true, Some(200), None),
            ReportFamily::Devices => (true, Some(50), None),
            ReportFamily::Locations => (true, Some(100), None),
            ReportFamily::ContentGroups => (true, Some(100), None),
            ReportFamily::UserSegments => (false, Some(50), None),
            ReportFamily::SearchTerms => (true, Some(100), None),
            ReportFamily::ScrollDepth => (true, Some(50), None),
            ReportFamily::Summary
            | ReportFamily::DailyTrend
            | ReportFamily::HourlyTraffic
            | ReportFamily::DayOfWeek
            | ReportFamily::NewVsReturning
            | ReportFamily::Engagement
            | ReportFamily::ConversionFunnel => (true, None, None),
        };
        FamilySettings {
            enabled,
            limit,
            order,
        }
    }
}

impl std::fmt::Display for ReportFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four page sub-reports, joined on `pagePath`.
#[derive(Debug, Clone)]
pub struct PageReports {
    pub metrics: ReportSpec,
    pub events: ReportSpec,
    pub sources: ReportSpec,
    pub devices: ReportSpec,
}

/// The three transaction sub-reports, joined on the transaction id.
#[derive(Debug, Clone)]
pub struct TransactionReports {
    pub base: ReportSpec,
    pub payment: ReportSpec,
    pub sources: ReportSpec,
}

#[derive(Debug, Clone)]
pub enum ReportPlan {
    /// Dimensionless report parsed into one record.
    Aggregate(ReportSpec),
    /// Dimensional report parsed into one record per row.
    Rows(ReportSpec),
    Events {
        overview: ReportSpec,
        key_events: Vec<(String, ReportSpec)>,
    },
    Pages(PageReports),
    Transactions(TransactionReports),
    Funnel,
}

#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub family: ReportFamily,
    pub plan: ReportPlan,
}

/// Enabled report definitions in declaration order.
#[derive(Debug, Clone)]
pub struct ReportRegistry {
    entries: Vec<RegistryEntry>,
}

impl ReportRegistry {
    pub fn from_config(config: &ExtractConfig) -> Self {
        let entries = ReportFamily::ALL
            .iter()
            .filter_map(|family| {
                let settings = config.settings(*family);
                settings.enabled.then(|| RegistryEntry {
                    family: *family,
                    plan: plan_for(*family, &settings, &config.key_events),
                })
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    pub fn families(&self) -> Vec<ReportFamily> {
        self.entries.iter().map(|entry| entry.family).collect()
    }

    pub fn is_enabled(&self, family: ReportFamily) -> bool {
        self.entries.iter().any(|entry| entry.family == family)
    }
}

fn scaled(limit: Option<u32>, factor: u32) -> Option<u32> {
    limit.map(|l| l.saturating_mul(factor))
}

fn plan_for(family: ReportFamily, settings: &FamilySettings, key_events: &[String]) -> ReportPlan {
    use self::dims as d;
    use self::metrics as m;

    let limit = settings.limit;
    let order = settings.order.clone();
    let rows = |spec: ReportSpec| ReportPlan::Rows(spec.with_limit(limit).with_order(order.clone()));

    match family {
        ReportFamily::Summary => ReportPlan::Aggregate(ReportSpec::new(
            "summary",
            &[],
            &[
                m::USERS,
                m::SESSIONS,
                m::PAGE_VIEWS,
                m::KEY_EVENTS,
                m::REVENUE,
                m::TRANSACTIONS,
                m::NEW_USERS,
                m::AVG_SESSION_DURATION,
                m::BOUNCE_RATE,
            ],
        )),
        ReportFamily::Pages => ReportPlan::Pages(PageReports {
            metrics: ReportSpec::new(
                "pages.metrics",
                &[d::PAGE],
                &[
                    m::PAGE_VIEWS,
                    m::USERS,
                    m::NEW_USERS,
                    m::AVG_SESSION_DURATION,
                    m::BOUNCE_RATE,
                    m::ENGAGEMENT_RATE,
                    m::KEY_EVENTS,
                ],
            )
            .with_limit(limit)
            .with_order(order.clone()),
            events: ReportSpec::new("pages.events", &[d::PAGE, d::EVENT], &[m::EVENT_COUNT])
                .with_limit(scaled(limit, 5)),
            sources: ReportSpec::new(
                "pages.sources",
                &[d::PAGE, d::SOURCE, d::MEDIUM],
                &[m::USERS, m::SESSIONS],
            )
            .with_limit(scaled(limit, 5)),
            devices: ReportSpec::new("pages.devices", &[d::PAGE, d::DEVICE], &[m::USERS])
                .with_limit(scaled(limit, 3)),
        }),
        ReportFamily::Events => ReportPlan::Events {
            overview: ReportSpec::new("events", &[d::EVENT], &[m::EVENT_COUNT, m::USERS])
                .with_limit(limit)
                .with_order(order.clone()),
            key_events: key_events
                .iter()
                .map(|event| {
                    let spec = ReportSpec::new(
                        &format!("key_events.{event}"),
                        &[d::PAGE_LOCATION],
                        &[m::EVENT_COUNT],
                    )
                    .with_limit(Some(KEY_EVENT_DETAIL_LIMIT))
                    .with_filter(d::EVENT, event);
                    (event.clone(), spec)
                })
                .collect(),
        },
        ReportFamily::Transactions => ReportPlan::Transactions(TransactionReports {
            base: ReportSpec::new(
                "transactions.base",
                &[d::TRANSACTION_ID],
                &[m::REVENUE, m::EVENT_COUNT],
            )
            .with_limit(limit)
            .with_order(order.clone()),
            payment: ReportSpec::new(
                "transactions.payment",
                &[d::TRANSACTION_ID, d::PAYMENT_TYPE],
                &[m::REVENUE],
            )
            .with_limit(limit),
            sources: ReportSpec::new(
                "transactions.sources",
                &[d::TRANSACTION_ID, d::SOURCE, d::MEDIUM],
                &[m::REVENUE],
            )
            .with_limit(limit),
        }),
        ReportFamily::TrafficSources => rows(ReportSpec::new(
            "traffic_sources",
            &[d::SOURCE, d::MEDIUM],
            &[m::USERS, m::SESSIONS, m::KEY_EVENTS, m::REVENUE, m::TRANSACTIONS],
        )),
        ReportFamily::Campaigns => rows(ReportSpec::new(
            "campaigns",
            &[d::CAMPAIGN, d::UTM_SOURCE, d::UTM_MEDIUM],
            &[m::SESSIONS, m::KEY_EVENTS, m::REVENUE],
        )),
        ReportFamily::Devices => rows(ReportSpec::new(
            "devices",
            &[d::DEVICE, d::OPERATING_SYSTEM, d::BROWSER],
            &[m::USERS, m::SESSIONS, m::KEY_EVENTS, m::TRANSACTIONS],
        )),
        ReportFamily::Locations => rows(ReportSpec::new(
            "locations",
            &[d::COUNTRY, d::CITY],
            &[m::USERS, m::SESSIONS],
        )),
        ReportFamily::ContentGroups => rows(ReportSpec::new(
            "content_groups",
            &[d::CONTENT_GROUP],
            &[m::PAGE_VIEWS, m::USERS],
        )),
        ReportFamily::DailyTrend => rows(ReportSpec::new(
            "daily_trend",
            &[d::DATE],
            &[m::USERS, m::SESSIONS, m::KEY_EVENTS, m::REVENUE, m::TRANSACTIONS],
        )),
        ReportFamily::HourlyTraffic => rows(ReportSpec::new(
            "hourly_traffic",
            &[d::HOUR],
            &[m::USERS, m::SESSIONS],
        )),
        ReportFamily::DayOfWeek => rows(ReportSpec::new(
            "day_of_week",
            &[d::DAY_OF_WEEK],
            &[m::USERS, m::SESSIONS],
        )),
        ReportFamily::NewVsReturning => rows(ReportSpec::new(
            "new_vs_returning",
            &[d::NEW_VS_RETURNING],
            &[m::USERS, m::SESSIONS, m::KEY_EVENTS, m::TRANSACTIONS],
        )),
        ReportFamily::UserSegments => rows(ReportSpec::new(
            "user_segments",
            &[d::USER_TYPE],
            &[m::USERS, m::SESSIONS, m::REVENUE],
        )),
        ReportFamily::SearchTerms => rows(ReportSpec::new(
            "search_terms",
            &[d::SEARCH_TERM],
            &[m::EVENT_COUNT],
        )),
        ReportFamily::ScrollDepth => rows(ReportSpec::new(
            "scroll_depth",
            &[d::SCROLL_DEPTH],
            &[m::EVENT_COUNT],
        )),
        ReportFamily::Engagement => ReportPlan::Aggregate(ReportSpec::new(
            "engagement",
            &[],
            &[
                m::ENGAGEMENT_RATE,
                m::ENGAGEMENT_DURATION,
                m::AVG_SESSION_DURATION,
                m::SESSIONS_PER_USER,
            ],
        )),
        ReportFamily::ConversionFunnel => ReportPlan::Funnel,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_names_round_trip_through_parse() {
        for family in ReportFamily::ALL {
            assert_eq!(ReportFamily::parse(family.as_str()).unwrap(), family);
        }
        assert!(ReportFamily::parse("sessions_by_moon_phase").is_err());
    }

    #[test]
    fn default_registry_skips_user_segments_and_keeps_order() {
        let registry = ReportRegistry::from_config(&ExtractConfig::default());
        let families = registry.families();
        assert!(!families.contains(&ReportFamily::UserSegments));
        assert_eq!(families.first(), Some(&ReportFamily::Summary));
        assert_eq!(families.last(), Some(&ReportFamily::ConversionFunnel));
        let mut sorted = families.clone();
        sorted.sort();
        assert_eq!(sorted, families);
    }

    #[test]
    fn page_sub_reports_scale_the_family_limit() {
        let registry = ReportRegistry::from_config(&ExtractConfig::default());
        let pages = registry
            .entries()
            .iter()
            .find_map(|entry| match &entry.plan {
                ReportPlan::Pages(pages) => Some(pages.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(pages.metrics.limit, Some(100));
        assert_eq!(pages.events.limit, Some(500));
        assert_eq!(pages.sources.limit, Some(500));
        assert_eq!(pages.devices.limit, Some(300));
        assert_eq!(
            pages.metrics.order,
            Some(OrderBy::desc(metrics::PAGE_VIEWS))
        );
    }

    #[test]
    fn key_event_details_filter_on_event_name() {
        let mut config = ExtractConfig::default();
        config.key_events = vec!["purchase".to_string(), "sign_up".to_string()];
        let registry = ReportRegistry::from_config(&config);
        let key_events = registry
            .entries()
            .iter()
            .find_map(|entry| match &entry.plan {
                ReportPlan::Events { key_events, .. } => Some(key_events.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(key_events.len(), 2);
        let (name, spec) = &key_events[1];
        assert_eq!(name, "sign_up");
        assert_eq!(spec.name, "key_events.sign_up");
        assert_eq!(spec.filter.as_ref().map(|f| f.value.as_str()), Some("sign_up"));
    }
}
