use reportflow_core::CoreError;
use thiserror::Error;

/// Failure of one user's sync. The scheduler logs it and moves on.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("no active property account for user {0}")]
    NoAccount(String),

    /// The run could not start (credentials, date window).
    #[error("extraction failed: {0}")]
    Extraction(#[from] CoreError),

    #[error("storage error: {0}")]
    Store(#[from] anyhow::Error),
}
