use anyhow::{anyhow, Result};
use chrono::{NaiveDate, Utc};
use reportflow_core::Snapshot;

use crate::backend::{parse_timestamp, random_alnum};
use crate::DuckDbBackend;

fn generate_snapshot_id() -> String {
    format!("snap_{}", random_alnum(16))
}

const SNAPSHOT_COLUMNS: &str = "id, user_id, CAST(snapshot_date AS VARCHAR), raw_data, \
     api_calls, error_count, CAST(created_at AS VARCHAR)";

/// Raw row before date/JSON decoding, so decoding errors surface as `anyhow`
/// rather than inside the duckdb row closure.
struct SnapshotRow {
    id: String,
    user_id: String,
    snapshot_date: String,
    raw_data: String,
    api_calls: i64,
    error_count: i64,
    created_at: String,
}

impl SnapshotRow {
    fn from_row(row: &duckdb::Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            snapshot_date: row.get(2)?,
            raw_data: row.get(3)?,
            api_calls: row.get(4)?,
            error_count: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    fn decode(self) -> Result<Snapshot> {
        Ok(Snapshot {
            snapshot_date: NaiveDate::parse_from_str(&self.snapshot_date, "%Y-%m-%d")
                .map_err(|e| anyhow!("invalid snapshot_date {:?}: {e}", self.snapshot_date))?,
            data: serde_json::from_str(&self.raw_data)?,
            api_calls: u32::try_from(self.api_calls).unwrap_or(0),
            error_count: u32::try_from(self.error_count).unwrap_or(0),
            created_at: parse_timestamp(&self.created_at)?,
            id: self.id,
            user_id: self.user_id,
        })
    }
}

/// `info.api_calls` and `info.errors.len()` of an extraction document.
fn manifest_counts(data: &serde_json::Value) -> (i64, i64) {
    let info = &data["info"];
    let api_calls = info["api_calls"].as_i64().unwrap_or(0);
    let errors = info["errors"].as_array().map_or(0, |e| e.len() as i64);
    (api_calls, errors)
}

impl DuckDbBackend {
    /// Store the document for `(user_id, date)`, replacing an earlier one
    /// for the same day. The row keeps its id across replacements.
    pub async fn save_snapshot(
        &self,
        user_id: &str,
        date: NaiveDate,
        data: &serde_json::Value,
    ) -> Result<Snapshot> {
        let raw = serde_json::to_string(data)?;
        let (api_calls, error_count) = manifest_counts(data);
        let created_at = Utc::now().format("%Y-%m-%d %H:%M:%S%.6f").to_string();
        let day = date.format("%Y-%m-%d").to_string();

        {
            let conn = self.conn.lock().await;
            conn.execute(
                r#"INSERT INTO report_snapshots (
                       id, user_id, snapshot_date, raw_data, api_calls, error_count, created_at
                   ) VALUES (?1, ?2, CAST(?3 AS DATE), ?4, ?5, ?6, CAST(?7 AS TIMESTAMP))
                   ON CONFLICT (user_id, snapshot_date) DO UPDATE SET
                       raw_data = EXCLUDED.raw_data,
                       api_calls = EXCLUDED.api_calls,
                       error_count = EXCLUDED.error_count,
                       created_at = EXCLUDED.created_at"#,
                duckdb::params![
                    generate_snapshot_id(),
                    user_id,
                    day,
                    raw,
                    api_calls,
                    error_count,
                    created_at
                ],
            )?;
        }

        self.get_snapshot(user_id, date)
            .await?
            .ok_or_else(|| anyhow!("snapshot not found after save"))
    }

    pub async fn get_snapshot(&self, user_id: &str, date: NaiveDate) -> Result<Option<Snapshot>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM report_snapshots \
             WHERE user_id = ?1 AND snapshot_date = CAST(?2 AS DATE)"
        ))?;
        let mut rows = stmt.query_map(
            duckdb::params![user_id, date.format("%Y-%m-%d").to_string()],
            SnapshotRow::from_row,
        )?;
        rows.next().transpose()?.map(SnapshotRow::decode).transpose()
    }

    pub async fn latest_snapshot(&self, user_id: &str) -> Result<Option<Snapshot>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM report_snapshots \
             WHERE user_id = ?1 ORDER BY snapshot_date DESC LIMIT 1"
        ))?;
        let mut rows = stmt.query_map(duckdb::params![user_id], SnapshotRow::from_row)?;
        rows.next().transpose()?.map(SnapshotRow::decode).transpose()
    }

    /// Snapshot dates for a user, newest first.
    pub async fn snapshot_dates(&self, user_id: &str) -> Result<Vec<NaiveDate>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT CAST(snapshot_date AS VARCHAR) FROM report_snapshots \
             WHERE user_id = ?1 ORDER BY snapshot_date DESC",
        )?;
        let raw = stmt
            .query_map(duckdb::params![user_id], |row| row.get::<_, String>(0))?
            .collect::<duckdb::Result<Vec<_>>>()?;
        raw.iter()
            .map(|day| {
                NaiveDate::parse_from_str(day, "%Y-%m-%d")
                    .map_err(|e| anyhow!("invalid snapshot_date {day:?}: {e}"))
            })
            .collect()
    }
}
