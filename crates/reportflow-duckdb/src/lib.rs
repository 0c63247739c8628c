pub mod accounts;
pub mod backend;
pub mod schema;
pub mod snapshots;
pub mod store_impl;

pub use backend::DuckDbBackend;

/// Re-exported for callers that query the connection directly
/// (`reportflow_duckdb::duckdb::params!`).
pub use duckdb;
