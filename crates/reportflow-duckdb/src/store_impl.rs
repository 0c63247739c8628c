use async_trait::async_trait;
use chrono::NaiveDate;

use reportflow_core::{PropertyAccount, Snapshot, SnapshotStore};

use crate::DuckDbBackend;

#[async_trait]
impl SnapshotStore for DuckDbBackend {
    async fn save_snapshot(
        &self,
        user_id: &str,
        date: NaiveDate,
        data: &serde_json::Value,
    ) -> anyhow::Result<Snapshot> {
        DuckDbBackend::save_snapshot(self, user_id, date, data).await
    }

    async fn get_snapshot(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> anyhow::Result<Option<Snapshot>> {
        DuckDbBackend::get_snapshot(self, user_id, date).await
    }

    async fn latest_snapshot(&self, user_id: &str) -> anyhow::Result<Option<Snapshot>> {
        DuckDbBackend::latest_snapshot(self, user_id).await
    }

    async fn get_account(&self, user_id: &str) -> anyhow::Result<Option<PropertyAccount>> {
        DuckDbBackend::get_account(self, user_id).await
    }

    async fn set_account(
        &self,
        user_id: &str,
        property_id: &str,
        credentials: Option<&str>,
    ) -> anyhow::Result<PropertyAccount> {
        DuckDbBackend::set_account(self, user_id, property_id, credentials).await
    }

    async fn list_active_accounts(&self) -> anyhow::Result<Vec<PropertyAccount>> {
        DuckDbBackend::list_active_accounts(self).await
    }
}
