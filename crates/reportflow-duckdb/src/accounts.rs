use anyhow::{anyhow, Result};
use chrono::Utc;
use reportflow_core::PropertyAccount;

use crate::backend::{parse_timestamp, random_alnum};
use crate::DuckDbBackend;

fn generate_account_id() -> String {
    format!("acct_{}", random_alnum(16))
}

const ACCOUNT_COLUMNS: &str =
    "id, user_id, property_id, credentials, is_active, CAST(created_at AS VARCHAR)";

struct AccountRow {
    id: String,
    user_id: String,
    property_id: String,
    credentials: Option<String>,
    is_active: bool,
    created_at: String,
}

impl AccountRow {
    fn from_row(row: &duckdb::Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            property_id: row.get(2)?,
            credentials: row.get(3)?,
            is_active: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    fn decode(self) -> Result<PropertyAccount> {
        Ok(PropertyAccount {
            created_at: parse_timestamp(&self.created_at)?,
            id: self.id,
            user_id: self.user_id,
            property_id: self.property_id,
            credentials: self.credentials,
            is_active: self.is_active,
        })
    }
}

impl DuckDbBackend {
    pub async fn get_account(&self, user_id: &str) -> Result<Option<PropertyAccount>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM property_accounts \
             WHERE user_id = ?1 AND is_active = TRUE \
             ORDER BY created_at DESC LIMIT 1"
        ))?;
        let mut rows = stmt.query_map(duckdb::params![user_id], AccountRow::from_row)?;
        rows.next().transpose()?.map(AccountRow::decode).transpose()
    }

    /// Replace the user's active account. The previous one stays in the
    /// table, inactive. Both writes share one transaction.
    pub async fn set_account(
        &self,
        user_id: &str,
        property_id: &str,
        credentials: Option<&str>,
    ) -> Result<PropertyAccount> {
        let id = generate_account_id();
        let created_at = Utc::now().format("%Y-%m-%d %H:%M:%S%.6f").to_string();

        {
            let mut conn = self.conn.lock().await;
            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE property_accounts SET is_active = FALSE \
                 WHERE user_id = ?1 AND is_active = TRUE",
                duckdb::params![user_id],
            )?;
            tx.execute(
                "INSERT INTO property_accounts (id, user_id, property_id, credentials, is_active, created_at) \
                 VALUES (?1, ?2, ?3, ?4, TRUE, CAST(?5 AS TIMESTAMP))",
                duckdb::params![id, user_id, property_id, credentials, created_at],
            )?;
            tx.commit()?;
        }

        self.get_account(user_id)
            .await?
            .ok_or_else(|| anyhow!("account not found after create"))
    }

    /// Active accounts across all users, oldest first.
    pub async fn list_active_accounts(&self) -> Result<Vec<PropertyAccount>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM property_accounts \
             WHERE is_active = TRUE ORDER BY created_at ASC, user_id ASC"
        ))?;
        let rows = stmt
            .query_map([], AccountRow::from_row)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        rows.into_iter().map(AccountRow::decode).collect()
    }
}
