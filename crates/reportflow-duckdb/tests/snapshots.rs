use std::sync::Arc;

use chrono::NaiveDate;
use reportflow_core::SnapshotStore;
use reportflow_duckdb::duckdb::params;
use reportflow_duckdb::DuckDbBackend;
use serde_json::json;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, d).expect("date")
}

fn document(api_calls: u32, errors: usize) -> serde_json::Value {
    let errors: Vec<_> = (0..errors)
        .map(|i| json!({"report": format!("r{i}"), "message": "boom"}))
        .collect();
    json!({
        "info": {"property_id": "123", "api_calls": api_calls, "errors": errors},
        "summary": {"activeUsers": 10.0}
    })
}

#[tokio::test]
async fn test_save_and_read_back_snapshot() {
    let db = DuckDbBackend::open_in_memory().expect("db");
    let saved = db
        .save_snapshot("user_1", day(10), &document(28, 2))
        .await
        .expect("save");

    assert!(saved.id.starts_with("snap_"));
    assert_eq!(saved.api_calls, 28);
    assert_eq!(saved.error_count, 2);
    assert_eq!(saved.data["summary"]["activeUsers"], json!(10.0));

    let fetched = db
        .get_snapshot("user_1", day(10))
        .await
        .expect("get")
        .expect("present");
    assert_eq!(fetched, saved);
    assert!(db.get_snapshot("user_1", day(11)).await.expect("get").is_none());
    assert!(db.get_snapshot("user_2", day(10)).await.expect("get").is_none());
}

#[tokio::test]
async fn test_resaving_a_day_replaces_the_document() {
    let db = DuckDbBackend::open_in_memory().expect("db");
    let first = db
        .save_snapshot("user_1", day(10), &document(5, 1))
        .await
        .expect("first");
    let second = db
        .save_snapshot("user_1", day(10), &document(7, 0))
        .await
        .expect("second");

    assert_eq!(first.id, second.id);
    assert_eq!(second.api_calls, 7);
    assert_eq!(second.error_count, 0);
    assert_eq!(db.snapshot_dates("user_1").await.expect("dates"), vec![day(10)]);

    let conn = db.conn_for_test().await;
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM report_snapshots", [], |row| row.get(0))
        .expect("count");
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_latest_snapshot_is_newest_by_date() {
    let db = DuckDbBackend::open_in_memory().expect("db");
    for d in [12, 3, 20, 8] {
        db.save_snapshot("user_1", day(d), &document(d, 0))
            .await
            .expect("save");
    }
    db.save_snapshot("user_2", day(29), &document(1, 0))
        .await
        .expect("save other user");

    let latest = db
        .latest_snapshot("user_1")
        .await
        .expect("latest")
        .expect("present");
    assert_eq!(latest.snapshot_date, day(20));
    assert!(db.latest_snapshot("nobody").await.expect("latest").is_none());
    assert_eq!(
        db.snapshot_dates("user_1").await.expect("dates"),
        vec![day(20), day(12), day(8), day(3)]
    );
}

#[tokio::test]
async fn test_set_account_deactivates_previous() {
    let db = DuckDbBackend::open_in_memory().expect("db");
    let first = db
        .set_account("user_1", "111", Some("token-a"))
        .await
        .expect("first");
    let second = db.set_account("user_1", "222", None).await.expect("second");

    assert_ne!(first.id, second.id);
    assert!(second.id.starts_with("acct_"));
    let active = db
        .get_account("user_1")
        .await
        .expect("get")
        .expect("present");
    assert_eq!(active.property_id, "222");
    assert_eq!(active.credentials, None);

    let conn = db.conn_for_test().await;
    let inactive: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM property_accounts WHERE user_id = ?1 AND is_active = FALSE",
            params!["user_1"],
            |row| row.get(0),
        )
        .expect("count");
    assert_eq!(inactive, 1);
}

#[tokio::test]
async fn test_account_switch_runs_on_spawned_tasks() {
    let store: Arc<dyn SnapshotStore> = Arc::new(DuckDbBackend::open_in_memory().expect("db"));

    let first = {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.set_account("user_1", "111", Some("tok")).await })
    };
    first.await.expect("join").expect("first");

    let second = {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            store.set_account("user_1", "222", None).await?;
            store.save_snapshot("user_1", day(2), &document(4, 0)).await
        })
    };
    let snapshot = second.await.expect("join").expect("second");

    assert_eq!(snapshot.api_calls, 4);
    let active = store.list_active_accounts().await.expect("list");
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].property_id, "222");
}

#[tokio::test]
async fn test_list_active_accounts_through_trait_object() {
    let db = Arc::new(DuckDbBackend::open_in_memory().expect("db"));
    let store: Arc<dyn SnapshotStore> = db.clone();

    store.set_account("user_1", "111", None).await.expect("u1");
    store.set_account("user_2", "222", Some("tok")).await.expect("u2");
    store.set_account("user_1", "333", None).await.expect("u1 again");

    let active = store.list_active_accounts().await.expect("list");
    let mut pairs: Vec<(String, String)> = active
        .into_iter()
        .map(|a| (a.user_id, a.property_id))
        .collect();
    pairs.sort();
    assert_eq!(
        pairs,
        vec![
            ("user_1".to_string(), "333".to_string()),
            ("user_2".to_string(), "222".to_string())
        ]
    );
    assert!(store.get_account("user_3").await.expect("get").is_none());
}

#[tokio::test]
async fn test_reopening_a_file_keeps_data() {
    let path = std::env::temp_dir().join(format!("reportflow-{}.duckdb", std::process::id()));
    let path_str = path.to_str().expect("utf-8 path");
    {
        let db = DuckDbBackend::open(path_str, "256MB").expect("open");
        db.save_snapshot("user_1", day(1), &document(3, 0))
            .await
            .expect("save");
    }
    let reopened = DuckDbBackend::open(path_str, "256MB").expect("reopen");
    let snapshot = reopened
        .latest_snapshot("user_1")
        .await
        .expect("latest")
        .expect("present");
    assert_eq!(snapshot.api_calls, 3);
    drop(reopened);
    let _ = std::fs::remove_file(&path);
    let _ = std::fs::remove_file(path.with_extension("duckdb.wal"));
}
