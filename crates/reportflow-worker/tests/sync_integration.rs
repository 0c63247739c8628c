use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use reportflow_core::{
    ClientFactory, Config, CoreError, Credentials, DateRange, RawReportResult, RawRow, ReportSpec,
    ReportingClient, SnapshotStore,
};
use reportflow_duckdb::DuckDbBackend;
use reportflow_worker::error::SyncError;
use reportflow_worker::scheduler::{process_once, run_daily_sync};
use reportflow_worker::state::WorkerState;
use reportflow_worker::sync::SyncOutcome;

/// Serves seven pages and two traffic sources; records every window seen.
#[derive(Default)]
struct FixtureClient {
    windows: Mutex<Vec<(String, u32)>>,
}

#[async_trait]
impl ReportingClient for FixtureClient {
    async fn run_report(
        &self,
        property_id: &str,
        spec: &ReportSpec,
        range: &DateRange,
    ) -> anyhow::Result<RawReportResult> {
        self.windows
            .lock()
            .expect("windows")
            .push((property_id.to_string(), range.days));
        let rows: Vec<RawRow> = match spec.name.as_str() {
            "pages.metrics" => (1..=7)
                .map(|i| RawRow {
                    dimension_values: vec![format!("/p{i}")],
                    metric_values: spec.metrics.iter().map(|_| format!("{}", i * 10)).collect(),
                })
                .collect(),
            "traffic_sources" => ["google", "naver"]
                .iter()
                .map(|source| RawRow {
                    dimension_values: vec![source.to_string(), "organic".to_string()],
                    metric_values: spec.metrics.iter().map(|_| "3".to_string()).collect(),
                })
                .collect(),
            "summary" => vec![RawRow {
                dimension_values: vec![],
                metric_values: spec.metrics.iter().map(|_| "1".to_string()).collect(),
            }],
            _ => vec![],
        };
        Ok(RawReportResult {
            dimension_headers: spec.dimensions.clone(),
            metric_headers: spec.metrics.clone(),
            rows,
        })
    }
}

struct FixtureFactory(Arc<FixtureClient>);

impl ClientFactory for FixtureFactory {
    fn connect(&self, credentials: &Credentials) -> Result<Arc<dyn ReportingClient>, CoreError> {
        if credentials.is_blank() {
            return Err(CoreError::Setup("missing access token".to_string()));
        }
        Ok(self.0.clone())
    }
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, d).expect("date")
}

fn setup() -> (Arc<WorkerState>, Arc<DuckDbBackend>, Arc<FixtureClient>) {
    let config = Config::from_lookup(|_| None).expect("config");
    let db = Arc::new(DuckDbBackend::open_in_memory().expect("db"));
    let client = Arc::new(FixtureClient::default());
    let store: Arc<dyn SnapshotStore> = db.clone();
    let state = WorkerState::with_factory(config, store, Arc::new(FixtureFactory(client.clone())));
    (Arc::new(state), db, client)
}

#[tokio::test]
async fn test_sync_without_account_fails() {
    let (state, _db, client) = setup();
    let err = state
        .sync
        .sync_full_on(day(30), "ghost", Some(7))
        .await
        .expect_err("no account");
    assert!(matches!(err, SyncError::NoAccount(_)));
    assert!(client.windows.lock().expect("windows").is_empty());
}

#[tokio::test]
async fn test_full_sync_stores_todays_snapshot() {
    let (state, db, client) = setup();
    state
        .sync
        .set_account("user_1", "properties/987", Some("tok"))
        .await
        .expect("account");

    let outcome = state
        .sync
        .sync_full_on(day(30), "user_1", None)
        .await
        .expect("sync");
    let SyncOutcome::Synced { days, api_calls, errors, .. } = outcome else {
        panic!("expected a synced outcome");
    };
    assert_eq!(days, 30);
    assert_eq!(errors, 0);
    assert!(api_calls > 0);

    let snapshot = db
        .get_snapshot("user_1", day(30))
        .await
        .expect("get")
        .expect("stored");
    assert_eq!(snapshot.api_calls, api_calls);
    assert_eq!(snapshot.data["info"]["property_id"], "properties/987");
    assert_eq!(snapshot.data["pages"][0]["pagePath"], "/p7");

    let windows = client.windows.lock().expect("windows");
    assert!(windows.iter().all(|(_, d)| *d == 30));
}

#[tokio::test]
async fn test_incremental_sync_only_fetches_the_gap() {
    let (state, _db, client) = setup();
    state
        .sync
        .set_account("user_1", "987", Some("tok"))
        .await
        .expect("account");
    state
        .sync
        .sync_full_on(day(25), "user_1", Some(30))
        .await
        .expect("initial");
    client.windows.lock().expect("windows").clear();

    let outcome = state
        .sync
        .sync_incremental("user_1", day(28))
        .await
        .expect("incremental");
    assert_eq!(outcome.days_added(), 3);
    assert!(client
        .windows
        .lock()
        .expect("windows")
        .iter()
        .all(|(_, d)| *d == 3));

    let again = state
        .sync
        .sync_incremental("user_1", day(28))
        .await
        .expect("up to date");
    assert_eq!(again, SyncOutcome::UpToDate { last_date: day(28) });
}

#[tokio::test]
async fn test_first_incremental_sync_uses_default_window() {
    let (state, _db, _client) = setup();
    state
        .sync
        .set_account("user_1", "987", Some("tok"))
        .await
        .expect("account");
    let outcome = state
        .sync
        .sync_incremental("user_1", day(28))
        .await
        .expect("incremental");
    assert_eq!(outcome.days_added(), 30);
}

#[tokio::test]
async fn test_user_summary_keeps_top_five() {
    let (state, _db, _client) = setup();
    assert!(state.sync.user_summary("user_1").await.expect("summary").is_none());

    state
        .sync
        .set_account("user_1", "987", Some("tok"))
        .await
        .expect("account");
    state
        .sync
        .sync_full_on(day(30), "user_1", Some(7))
        .await
        .expect("sync");

    let summary = state
        .sync
        .user_summary("user_1")
        .await
        .expect("summary")
        .expect("present");
    assert_eq!(summary.top_pages.len(), 5);
    assert_eq!(summary.top_pages[0]["pagePath"], "/p7");
    assert_eq!(summary.traffic_sources.len(), 2);
    assert_eq!(summary.date_range["days"], 7);
    assert_eq!(summary.summary["activeUsers"], 1.0);
}

#[tokio::test]
async fn test_daily_sync_isolates_failing_users() {
    let (state, db, _client) = setup();
    state
        .sync
        .set_account("user_ok", "111", Some("tok"))
        .await
        .expect("ok account");
    // No token and no process default: client setup fails for this user.
    state
        .sync
        .set_account("user_no_token", "222", None)
        .await
        .expect("tokenless account");

    let report = run_daily_sync(&state, day(30)).await.expect("daily sync");
    assert_eq!(report.users, 2);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.days_added, 30);

    assert!(db.get_snapshot("user_ok", day(30)).await.expect("get").is_some());
    assert!(db
        .get_snapshot("user_no_token", day(30))
        .await
        .expect("get")
        .is_none());
}

#[tokio::test]
async fn test_scheduler_tick_runs_once_per_day() {
    let (state, _db, client) = setup();
    state
        .sync
        .set_account("user_1", "987", Some("tok"))
        .await
        .expect("account");

    let mut last_run = None;
    let early = Utc.with_ymd_and_hms(2024, 6, 30, 2, 0, 0).unwrap();
    assert!(process_once(&state, early, &mut last_run)
        .await
        .expect("tick")
        .is_none());
    assert!(client.windows.lock().expect("windows").is_empty());

    let later = Utc.with_ymd_and_hms(2024, 6, 30, 3, 5, 0).unwrap();
    let report = process_once(&state, later, &mut last_run)
        .await
        .expect("tick")
        .expect("ran");
    assert_eq!(report.succeeded, 1);
    assert_eq!(last_run, Some(day(30)));

    let again = Utc.with_ymd_and_hms(2024, 6, 30, 3, 6, 0).unwrap();
    assert!(process_once(&state, again, &mut last_run)
        .await
        .expect("tick")
        .is_none());
}
