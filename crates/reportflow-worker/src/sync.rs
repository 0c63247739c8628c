//! Per-user sync: extract a property's reports and keep one snapshot per day.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use reportflow_core::{Credentials, Extractor, PropertyAccount, SnapshotStore};

use crate::error::SyncError;

/// Rows of a list family shown in a user summary.
pub const SUMMARY_TOP_N: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncOutcome {
    Synced {
        snapshot_id: String,
        property_id: String,
        date: NaiveDate,
        days: u32,
        api_calls: u32,
        errors: usize,
    },
    /// The latest snapshot is already from today (or later).
    UpToDate { last_date: NaiveDate },
}

impl SyncOutcome {
    pub fn days_added(&self) -> u32 {
        match self {
            SyncOutcome::Synced { days, .. } => *days,
            SyncOutcome::UpToDate { .. } => 0,
        }
    }
}

/// Short view of a user's latest snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserSummary {
    pub date_range: Value,
    pub summary: Value,
    pub top_pages: Vec<Value>,
    pub traffic_sources: Vec<Value>,
    pub last_updated: DateTime<Utc>,
}

fn first_n(value: &Value, n: usize) -> Vec<Value> {
    value
        .as_array()
        .map(|items| items.iter().take(n).cloned().collect())
        .unwrap_or_default()
}

pub struct SyncService {
    store: Arc<dyn SnapshotStore>,
    extractor: Arc<Extractor>,
    default_credentials: Option<Credentials>,
}

impl SyncService {
    pub fn new(
        store: Arc<dyn SnapshotStore>,
        extractor: Arc<Extractor>,
        default_credentials: Option<Credentials>,
    ) -> Self {
        Self {
            store,
            extractor,
            default_credentials,
        }
    }

    async fn active_account(&self, user_id: &str) -> Result<PropertyAccount, SyncError> {
        self.store
            .get_account(user_id)
            .await?
            .ok_or_else(|| SyncError::NoAccount(user_id.to_string()))
    }

    /// Account token first, then the process-wide default. An empty token
    /// is rejected by the client factory.
    fn credentials_for(&self, account: &PropertyAccount) -> Credentials {
        account
            .credentials
            .as_deref()
            .filter(|token| !token.trim().is_empty())
            .map(Credentials::new)
            .or_else(|| self.default_credentials.clone())
            .unwrap_or_else(|| Credentials::new(""))
    }

    async fn extract_and_save(
        &self,
        account: &PropertyAccount,
        today: NaiveDate,
        days: u32,
    ) -> Result<SyncOutcome, SyncError> {
        let credentials = self.credentials_for(account);
        let result = self
            .extractor
            .extract_on(today, &account.property_id, &credentials, Some(days))
            .await?;
        let snapshot = self
            .store
            .save_snapshot(&account.user_id, today, &result.to_value()?)
            .await?;

        info!(
            user_id = %account.user_id,
            property_id = %account.property_id,
            days,
            api_calls = result.info.api_calls,
            errors = result.info.errors.len(),
            "snapshot saved"
        );
        Ok(SyncOutcome::Synced {
            snapshot_id: snapshot.id,
            property_id: account.property_id.clone(),
            date: today,
            days,
            api_calls: result.info.api_calls,
            errors: result.info.errors.len(),
        })
    }

    /// Extract `days` (default from config) ending today and store it.
    pub async fn sync_full(&self, user_id: &str, days: Option<u32>) -> Result<SyncOutcome, SyncError> {
        self.sync_full_on(Utc::now().date_naive(), user_id, days).await
    }

    pub async fn sync_full_on(
        &self,
        today: NaiveDate,
        user_id: &str,
        days: Option<u32>,
    ) -> Result<SyncOutcome, SyncError> {
        let account = self.active_account(user_id).await?;
        let days = days.unwrap_or_else(|| self.extractor.default_days());
        self.extract_and_save(&account, today, days).await
    }

    /// Extract only the days since the latest snapshot. With no snapshot yet
    /// the configured default window is used.
    pub async fn sync_incremental(
        &self,
        user_id: &str,
        today: NaiveDate,
    ) -> Result<SyncOutcome, SyncError> {
        let account = self.active_account(user_id).await?;
        let days = match self.store.latest_snapshot(user_id).await? {
            Some(latest) => {
                let gap = (today - latest.snapshot_date).num_days();
                if gap <= 0 {
                    return Ok(SyncOutcome::UpToDate {
                        last_date: latest.snapshot_date,
                    });
                }
                u32::try_from(gap).unwrap_or(u32::MAX)
            }
            None => self.extractor.default_days(),
        };
        self.extract_and_save(&account, today, days).await
    }

    pub async fn user_summary(&self, user_id: &str) -> Result<Option<UserSummary>, SyncError> {
        let Some(snapshot) = self.store.latest_snapshot(user_id).await? else {
            return Ok(None);
        };
        let data = &snapshot.data;
        Ok(Some(UserSummary {
            date_range: data["info"]["date_range"].clone(),
            summary: data
                .get("summary")
                .cloned()
                .unwrap_or_else(|| Value::Object(Default::default())),
            top_pages: first_n(&data["pages"], SUMMARY_TOP_N),
            traffic_sources: first_n(&data["traffic_sources"], SUMMARY_TOP_N),
            last_updated: snapshot.created_at,
        }))
    }

    pub async fn set_account(
        &self,
        user_id: &str,
        property_id: &str,
        credentials: Option<&str>,
    ) -> Result<PropertyAccount, SyncError> {
        let account = self.store.set_account(user_id, property_id, credentials).await?;
        info!(user_id, property_id, "property account updated");
        Ok(account)
    }

    pub async fn active_accounts(&self) -> Result<Vec<PropertyAccount>, SyncError> {
        Ok(self.store.list_active_accounts().await?)
    }
}
