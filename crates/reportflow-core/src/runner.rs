//! Single-report execution with a fixed-delay retry loop.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::client::ReportingClient;
use crate::report::{DateRange, RawReportResult, ReportSpec};

/// Maximum characters of an error message kept in the manifest.
pub const ERROR_MESSAGE_LIMIT: usize = 150;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Fixed pause between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

#[async_trait]
pub trait Sleeper: Send + Sync + 'static {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// One exhausted report, as stored in the manifest. `message` reads
/// `"{report}: {error}"` with the error text cut to [`ERROR_MESSAGE_LIMIT`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportFailure {
    pub report: String,
    pub message: String,
}

/// Run-scoped call counter and failure list.
///
/// Both fields are append-only for the duration of a run. Concurrent
/// sub-reports each get their own log, folded back with [`CallLog::absorb`]
/// in declaration order so failures never follow completion order.
#[derive(Debug, Default)]
pub struct CallLog {
    calls: AtomicU32,
    failures: Mutex<Vec<ReportFailure>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn failures(&self) -> Vec<ReportFailure> {
        self.failures
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Append another log's calls and failures after this one's.
    pub fn absorb(&self, other: CallLog) {
        self.calls.fetch_add(other.calls(), Ordering::SeqCst);
        let failures = other
            .failures
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        self.failures
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .extend(failures);
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn record_failure(&self, failure: ReportFailure) {
        self.failures
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(failure);
    }
}

pub fn truncate_message(message: &str) -> String {
    message.chars().take(ERROR_MESSAGE_LIMIT).collect()
}

pub struct ReportRunner {
    client: Arc<dyn ReportingClient>,
    sleeper: Arc<dyn Sleeper>,
    policy: RetryPolicy,
    property_id: String,
}

impl ReportRunner {
    pub fn new(
        client: Arc<dyn ReportingClient>,
        sleeper: Arc<dyn Sleeper>,
        policy: RetryPolicy,
        property_id: &str,
    ) -> Self {
        Self {
            client,
            sleeper,
            policy,
            property_id: property_id.to_string(),
        }
    }

    /// Run one report definition.
    ///
    /// Counts exactly one call in `log`. Returns `None` after the last failed
    /// attempt and records exactly one failure for it. A returned result is
    /// well-formed and holds at most `spec.limit` rows.
    pub async fn run(
        &self,
        spec: &ReportSpec,
        range: &DateRange,
        log: &CallLog,
    ) -> Option<RawReportResult> {
        log.record_call();

        let max_attempts = if spec.retry {
            self.policy.max_attempts.max(1)
        } else {
            1
        };
        let mut attempt = 1u32;

        loop {
            let outcome = match self.client.run_report(&self.property_id, spec, range).await {
                Ok(result) => result
                    .validate(&spec.name)
                    .map(|()| result)
                    .map_err(anyhow::Error::from),
                Err(err) => Err(err),
            };

            match outcome {
                Ok(mut result) => {
                    if let Some(limit) = spec.limit {
                        result.rows.truncate(limit as usize);
                    }
                    info!(
                        report = %spec.name,
                        rows = result.rows.len(),
                        attempt,
                        "report fetched"
                    );
                    return Some(result);
                }
                Err(err) if attempt < max_attempts => {
                    warn!(
                        report = %spec.name,
                        attempt,
                        max_attempts,
                        delay_ms = self.policy.delay.as_millis() as u64,
                        error = %err,
                        "report failed, retrying"
                    );
                    self.sleeper.sleep(self.policy.delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    let message = format!("{}: {}", spec.name, truncate_message(&format!("{err:#}")));
                    error!(
                        report = %spec.name,
                        attempts = attempt,
                        error = %message,
                        "report failed"
                    );
                    log.record_failure(ReportFailure {
                        report: spec.name.clone(),
                        message,
                    });
                    return None;
                }
            }
        }
    }
}
