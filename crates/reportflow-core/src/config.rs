use std::collections::BTreeMap;
use std::time::Duration;

use chrono::NaiveTime;

use crate::error::CoreError;
use crate::registry::ReportFamily;
use crate::report::OrderBy;
use crate::runner::RetryPolicy;

pub const DEFAULT_API_BASE_URL: &str = "https://analyticsdata.googleapis.com/v1beta";

/// Process configuration, read once at startup from `REPORTFLOW_*` variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: String,
    pub duckdb_memory_limit: String,
    pub api_base_url: String,
    pub default_property_id: Option<String>,
    pub default_access_token: Option<String>,
    pub scheduler_enabled: bool,
    /// Wall-clock time (UTC) after which the daily sync may run.
    pub daily_sync_time: NaiveTime,
    pub scheduler_tick_seconds: u64,
    pub extract: ExtractConfig,
}

/// Per-family switch and query shaping.
#[derive(Debug, Clone, PartialEq)]
pub struct FamilySettings {
    pub enabled: bool,
    pub limit: Option<u32>,
    pub order: Option<OrderBy>,
}

/// Everything the extractor needs; not reloadable mid-run.
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    pub default_days: u32,
    pub retry: RetryPolicy,
    pub request_timeout: Duration,
    pub families: BTreeMap<ReportFamily, FamilySettings>,
    pub key_events: Vec<String>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            default_days: 30,
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(30),
            families: ReportFamily::ALL
                .iter()
                .map(|family| (*family, family.default_settings()))
                .collect(),
            key_events: default_key_events(),
        }
    }
}

impl ExtractConfig {
    pub fn settings(&self, family: ReportFamily) -> FamilySettings {
        self.families
            .get(&family)
            .cloned()
            .unwrap_or_else(|| family.default_settings())
    }

    pub fn set_enabled(&mut self, family: ReportFamily, enabled: bool) {
        self.families
            .entry(family)
            .or_insert_with(|| family.default_settings())
            .enabled = enabled;
    }

    pub fn set_limit(&mut self, family: ReportFamily, limit: Option<u32>) {
        self.families
            .entry(family)
            .or_insert_with(|| family.default_settings())
            .limit = limit;
    }
}

fn default_key_events() -> Vec<String> {
    [
        "purchase",
        "purchase_subscription",
        "form_submit",
        "sign_up",
        "add_to_cart",
        "begin_checkout",
        "view_item",
    ]
    .iter()
    .map(|e| e.to_string())
    .collect()
}

fn parse_var<T: std::str::FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T, CoreError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| CoreError::Config(format!("{key} has invalid value: {value}"))),
    }
}

fn parse_bool(raw: Option<String>, default: bool) -> bool {
    raw.map(|v| {
        let trimmed = v.trim();
        trimmed.eq_ignore_ascii_case("1")
            || trimmed.eq_ignore_ascii_case("true")
            || trimmed.eq_ignore_ascii_case("yes")
    })
    .unwrap_or(default)
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// `"pages=50,events=400"` → per-family row caps.
fn parse_limits(raw: &str) -> Result<Vec<(ReportFamily, u32)>, CoreError> {
    parse_list(raw)
        .iter()
        .map(|pair| {
            let (name, value) = pair.split_once('=').ok_or_else(|| {
                CoreError::Config(format!("REPORTFLOW_REPORT_LIMITS entry must be family=n: {pair}"))
            })?;
            let family = ReportFamily::parse(name)?;
            let limit: u32 = value.trim().parse().map_err(|_| {
                CoreError::Config(format!("invalid limit for {family}: {value}"))
            })?;
            if limit == 0 {
                return Err(CoreError::Config(format!("limit for {family} must be > 0")));
            }
            Ok((family, limit))
        })
        .collect()
}

impl Config {
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source; `from_env` passes `std::env`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut extract = ExtractConfig {
            default_days: parse_var("REPORTFLOW_DEFAULT_DAYS", lookup("REPORTFLOW_DEFAULT_DAYS"), 30)?,
            ..ExtractConfig::default()
        };
        if extract.default_days == 0 {
            return Err(CoreError::Config(
                "REPORTFLOW_DEFAULT_DAYS must be > 0".to_string(),
            ));
        }

        let max_attempts: u32 =
            parse_var("REPORTFLOW_RETRY_COUNT", lookup("REPORTFLOW_RETRY_COUNT"), 3)?;
        let delay_ms: u64 =
            parse_var("REPORTFLOW_RETRY_DELAY_MS", lookup("REPORTFLOW_RETRY_DELAY_MS"), 2_000)?;
        extract.retry = RetryPolicy {
            max_attempts: max_attempts.max(1),
            delay: Duration::from_millis(delay_ms),
        };
        let timeout_secs: u64 =
            parse_var("REPORTFLOW_TIMEOUT_SECS", lookup("REPORTFLOW_TIMEOUT_SECS"), 30)?;
        extract.request_timeout = Duration::from_secs(timeout_secs.max(1));

        let disabled = lookup("REPORTFLOW_DISABLED_REPORTS").unwrap_or_else(|| "user_segments".to_string());
        for family in ReportFamily::ALL {
            extract.set_enabled(family, true);
        }
        for name in parse_list(&disabled) {
            extract.set_enabled(ReportFamily::parse(&name)?, false);
        }
        if let Some(raw) = lookup("REPORTFLOW_REPORT_LIMITS") {
            for (family, limit) in parse_limits(&raw)? {
                extract.set_limit(family, Some(limit));
            }
        }
        if let Some(raw) = lookup("REPORTFLOW_KEY_EVENTS") {
            extract.key_events = parse_list(&raw);
        }

        let sync_time_raw = lookup("REPORTFLOW_DAILY_SYNC_TIME").unwrap_or_else(|| "03:00".to_string());
        let daily_sync_time = NaiveTime::parse_from_str(sync_time_raw.trim(), "%H:%M")
            .map_err(|_| CoreError::Config(format!("invalid REPORTFLOW_DAILY_SYNC_TIME: {sync_time_raw}")))?;

        Ok(Self {
            data_dir: lookup("REPORTFLOW_DATA_DIR").unwrap_or_else(|| "./data".to_string()),
            duckdb_memory_limit: lookup("REPORTFLOW_DUCKDB_MEMORY").unwrap_or_else(|| "1GB".to_string()),
            api_base_url: lookup("REPORTFLOW_API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            default_property_id: lookup("REPORTFLOW_PROPERTY_ID").filter(|v| !v.trim().is_empty()),
            default_access_token: lookup("REPORTFLOW_ACCESS_TOKEN").filter(|v| !v.trim().is_empty()),
            scheduler_enabled: parse_bool(lookup("REPORTFLOW_SCHEDULER_ENABLED"), true),
            daily_sync_time,
            scheduler_tick_seconds: parse_var(
                "REPORTFLOW_SCHEDULER_TICK_SECONDS",
                lookup("REPORTFLOW_SCHEDULER_TICK_SECONDS"),
                60u64,
            )?
            .clamp(10, 3600),
            extract,
        })
    }
}
