use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use tracing::info;

use reportflow_core::{Config, Credentials};
use reportflow_duckdb::DuckDbBackend;
use reportflow_worker::state::WorkerState;

const USAGE: &str = "usage: reportflow [extract [days] | sync <user> [days] | \
                     account <user> <property> [token] | summary <user>]";

fn parse_days(raw: Option<&String>) -> Result<Option<u32>> {
    raw.map(|value| {
        value
            .parse::<u32>()
            .with_context(|| format!("days must be a positive integer, got {value:?}"))
    })
    .transpose()
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// `reportflow extract [days]`: one run against the default property,
/// document printed to stdout. Nothing is stored.
async fn run_extract(state: &WorkerState, days: Option<u32>) -> Result<()> {
    let property_id = state
        .config
        .default_property_id
        .as_deref()
        .ok_or_else(|| anyhow!("REPORTFLOW_PROPERTY_ID is not set"))?;
    let credentials = Credentials::new(state.config.default_access_token.clone().unwrap_or_default());
    let result = state.extractor.extract(property_id, &credentials, days).await?;
    print_json(&result)
}

#[tokio::main]
async fn main() -> Result<()> {
    // JSON logs on stderr; stdout stays clean for command output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("reportflow=info".parse()?)
                .add_directive("reportflow_core=info".parse()?)
                .add_directive("reportflow_worker=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cfg = Config::from_env().map_err(|e| anyhow!(e))?;

    std::fs::create_dir_all(&cfg.data_dir)?;
    let db_path = format!("{}/reportflow.db", cfg.data_dir);
    let db = DuckDbBackend::open(&db_path, &cfg.duckdb_memory_limit)?;
    db.ping().await?;
    let state = Arc::new(WorkerState::new(cfg, Arc::new(db)));

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("extract") => run_extract(&state, parse_days(args.get(1))?).await,
        Some("sync") => {
            let user = args.get(1).ok_or_else(|| anyhow!(USAGE))?;
            let outcome = state.sync.sync_full(user, parse_days(args.get(2))?).await?;
            print_json(&outcome)
        }
        Some("account") => {
            let (Some(user), Some(property)) = (args.get(1), args.get(2)) else {
                bail!(USAGE);
            };
            let account = state
                .sync
                .set_account(user, property, args.get(3).map(String::as_str))
                .await?;
            print_json(&account)
        }
        Some("summary") => {
            let user = args.get(1).ok_or_else(|| anyhow!(USAGE))?;
            match state.sync.user_summary(user).await? {
                Some(summary) => print_json(&summary),
                None => bail!("no snapshot stored for user {user}"),
            }
        }
        Some(other) => bail!("unknown command {other:?}\n{USAGE}"),
        None => {
            if !state.config.scheduler_enabled {
                bail!("scheduler disabled (REPORTFLOW_SCHEDULER_ENABLED=false)\n{USAGE}");
            }
            let scheduler = {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    reportflow_worker::scheduler::run_scheduler_loop(state).await;
                })
            };
            tokio::signal::ctrl_c().await.ok();
            info!("shutdown requested");
            scheduler.abort();
            Ok(())
        }
    }
}
