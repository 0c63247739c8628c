use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One stored extraction document for a (user, date).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,
    pub user_id: String,
    pub snapshot_date: NaiveDate,
    pub data: serde_json::Value,
    pub api_calls: u32,
    pub error_count: u32,
    pub created_at: DateTime<Utc>,
}

/// Reporting property bound to a user. At most one is active per user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyAccount {
    pub id: String,
    pub user_id: String,
    pub property_id: String,
    #[serde(skip_serializing)]
    pub credentials: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Persistence for extraction snapshots and property accounts.
#[async_trait]
pub trait SnapshotStore: Send + Sync + 'static {
    /// Insert or replace the snapshot for `(user_id, date)`.
    async fn save_snapshot(
        &self,
        user_id: &str,
        date: NaiveDate,
        data: &serde_json::Value,
    ) -> anyhow::Result<Snapshot>;

    async fn get_snapshot(&self, user_id: &str, date: NaiveDate)
        -> anyhow::Result<Option<Snapshot>>;

    /// Most recent snapshot by date.
    async fn latest_snapshot(&self, user_id: &str) -> anyhow::Result<Option<Snapshot>>;

    /// The user's active account, if any.
    async fn get_account(&self, user_id: &str) -> anyhow::Result<Option<PropertyAccount>>;

    /// Deactivate the current account and activate a new one.
    async fn set_account(
        &self,
        user_id: &str,
        property_id: &str,
        credentials: Option<&str>,
    ) -> anyhow::Result<PropertyAccount>;

    async fn list_active_accounts(&self) -> anyhow::Result<Vec<PropertyAccount>>;
}
