use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Client or credential construction failed; the run never started.
    #[error("setup error: {0}")]
    Setup(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid date range: {0}")]
    InvalidDateRange(String),

    #[error("malformed response for {report}: {detail}")]
    MalformedResponse { report: String, detail: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
