pub mod client;
pub mod config;
pub mod error;
pub mod extract;
pub mod funnel;
pub mod parse;
pub mod registry;
pub mod report;
pub mod runner;
pub mod store;
pub mod unify;

pub use client::{ClientFactory, Credentials, ReportingClient};
pub use config::{Config, ExtractConfig};
pub use error::CoreError;
pub use extract::{ExtractionManifest, ExtractionResult, Extractor};
pub use registry::ReportFamily;
pub use report::{DateRange, RawReportResult, RawRow, ReportSpec};
pub use runner::{ReportFailure, RetryPolicy, Sleeper};
pub use store::{PropertyAccount, Snapshot, SnapshotStore};
