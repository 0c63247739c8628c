/// DuckDB initialization SQL, run once per open via `execute_batch`.
///
/// Every statement uses `IF NOT EXISTS`, so reopening an existing file is a
/// no-op. `memory_limit` comes from `Config.duckdb_memory_limit`
/// (env `REPORTFLOW_DUCKDB_MEMORY`, default `"1GB"`).
pub fn init_sql(memory_limit: &str) -> String {
    format!(
        r#"SET memory_limit = '{memory_limit}';
SET threads = 2;

-- ===========================================
-- PROPERTY ACCOUNTS
-- ===========================================
-- One active row per user; older rows are kept with is_active = FALSE.
CREATE TABLE IF NOT EXISTS property_accounts (
    id              VARCHAR PRIMARY KEY,           -- 'acct_' + 16 random alnum
    user_id         VARCHAR NOT NULL,
    property_id     VARCHAR NOT NULL,
    credentials     VARCHAR,                       -- bearer token, NULL = use process default
    is_active       BOOLEAN NOT NULL DEFAULT TRUE,
    created_at      TIMESTAMP NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_property_accounts_user ON property_accounts(user_id);

-- ===========================================
-- REPORT SNAPSHOTS
-- ===========================================
-- One extraction document per (user, day). Re-saving a day overwrites it.
CREATE TABLE IF NOT EXISTS report_snapshots (
    id              VARCHAR PRIMARY KEY,           -- 'snap_' + 16 random alnum
    user_id         VARCHAR NOT NULL,
    snapshot_date   DATE NOT NULL,
    raw_data        VARCHAR NOT NULL,              -- JSON document
    api_calls       BIGINT NOT NULL DEFAULT 0,
    error_count     BIGINT NOT NULL DEFAULT 0,
    created_at      TIMESTAMP NOT NULL,
    UNIQUE (user_id, snapshot_date)
);
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_sql_sets_memory_limit_and_is_idempotent() {
        let sql = init_sql("512MB");
        assert!(sql.starts_with("SET memory_limit = '512MB';"));
        assert_eq!(sql.matches("CREATE TABLE IF NOT EXISTS").count(), 2);
        assert!(!sql.contains("CREATE TABLE report_snapshots"));
    }
}
