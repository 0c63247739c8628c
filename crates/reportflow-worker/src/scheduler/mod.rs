use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tracing::{error, info, warn};

use crate::state::WorkerState;

/// Totals of one daily sync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DailySyncReport {
    pub users: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub days_added: u64,
    pub duration_ms: u64,
}

/// True once `now` has passed `at` (UTC) on a day that has not run yet.
pub fn daily_sync_due(now: DateTime<Utc>, at: NaiveTime, last_run: Option<NaiveDate>) -> bool {
    now.time() >= at && last_run != Some(now.date_naive())
}

/// Incremental sync for every active account. One user's failure is logged
/// and counted; it never stops the pass.
pub async fn run_daily_sync(state: &WorkerState, today: NaiveDate) -> anyhow::Result<DailySyncReport> {
    let started = Instant::now();
    let accounts = state.sync.active_accounts().await?;
    info!(users = accounts.len(), "daily sync started");

    let mut report = DailySyncReport {
        users: accounts.len(),
        ..DailySyncReport::default()
    };
    for account in accounts {
        match state.sync.sync_incremental(&account.user_id, today).await {
            Ok(outcome) => {
                report.succeeded += 1;
                report.days_added += u64::from(outcome.days_added());
                info!(
                    user_id = %account.user_id,
                    property_id = %account.property_id,
                    days_added = outcome.days_added(),
                    "user synced"
                );
            }
            Err(err) => {
                report.failed += 1;
                warn!(user_id = %account.user_id, error = %err, "user sync failed");
            }
        }
    }

    report.duration_ms = started.elapsed().as_millis() as u64;
    info!(
        succeeded = report.succeeded,
        failed = report.failed,
        days_added = report.days_added,
        duration_ms = report.duration_ms,
        "daily sync completed"
    );
    Ok(report)
}

/// One scheduler tick. Runs the daily sync when due and records the day.
pub async fn process_once(
    state: &Arc<WorkerState>,
    now: DateTime<Utc>,
    last_run: &mut Option<NaiveDate>,
) -> anyhow::Result<Option<DailySyncReport>> {
    if !daily_sync_due(now, state.config.daily_sync_time, *last_run) {
        return Ok(None);
    }
    // Mark first so a failing pass is not retried every tick.
    *last_run = Some(now.date_naive());
    run_daily_sync(state, now.date_naive()).await.map(Some)
}

pub async fn run_scheduler_loop(state: Arc<WorkerState>) {
    let tick = state.config.scheduler_tick_seconds;
    info!(
        tick_seconds = tick,
        daily_sync_time = %state.config.daily_sync_time,
        "sync scheduler started"
    );
    let mut interval = tokio::time::interval(Duration::from_secs(tick));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut last_run = None;
    loop {
        interval.tick().await;
        if let Err(err) = process_once(&state, Utc::now(), &mut last_run).await {
            error!(error = %err, "sync scheduler iteration failed");
        }
    }
}
