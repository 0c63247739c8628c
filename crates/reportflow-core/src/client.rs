//! Reporting-API collaborator boundary.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::CoreError;
use crate::report::{DateRange, RawReportResult, ReportSpec};

/// Executes one report query against the reporting API.
///
/// Every error is treated the same by the runner (retried, then recorded),
/// so implementations do not need to classify failures.
#[async_trait]
pub trait ReportingClient: Send + Sync + 'static {
    async fn run_report(
        &self,
        property_id: &str,
        spec: &ReportSpec,
        range: &DateRange,
    ) -> anyhow::Result<RawReportResult>;
}

/// Opaque secret handed to the client factory. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials(String);

impl Credentials {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credentials(***)")
    }
}

/// Builds a client for one extraction run. Failure here is a setup error and
/// aborts the run before any report is issued.
pub trait ClientFactory: Send + Sync + 'static {
    fn connect(&self, credentials: &Credentials) -> Result<Arc<dyn ReportingClient>, CoreError>;
}
