//! Domain-level error taxonomy for CI Explain.

/// Errors produced by the explanation pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ExplainError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("GitHub API error: {0}")]
    Github(String),

    #[error("git error: {0}")]
    Git(String),

    #[error(
        "analysis payload is {bytes} bytes, over the {limit}-byte request ceiling; \
         lower --max-log-bytes or --max-jobs to shrink it"
    )]
    PayloadTooLarge { bytes: usize, limit: usize },

    #[error("analyzer rejected the payload as too large even after client-side truncation")]
    PayloadRejected,

    #[error("analyzer service error (status {status}): {body}")]
    Service { status: u16, body: String },

    #[error("analyzer request failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    #[error("analyzer request exceeded the {secs}s deadline")]
    DeadlineExceeded { secs: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for CI Explain operations.
pub type Result<T> = std::result::Result<T, ExplainError>;
