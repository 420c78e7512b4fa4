use thiserror::Error;

use vidrelay_store::StoreError;

/// Failures reported by an [`Extractor`](crate::extractor::Extractor).
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The extractor ran and reported an error.
    #[error("extractor failed: {0}")]
    Failed(String),

    /// The extractor filtered the resource out (live stream, too long, …).
    #[error("rejected by filter: {0}")]
    Rejected(String),

    /// The extractor finished without producing a file.
    #[error("no file produced for {0}")]
    NoOutput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed extractor output: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Outcome classes of [`Executor::resolve`](crate::executor::Executor::resolve).
#[derive(Debug, Error)]
pub enum ExecError {
    /// Worth retrying on a later pass (network, extractor hiccup).
    #[error("transient failure for {key}: {reason}")]
    Transient { key: String, reason: String },

    /// The fetch exceeded its time budget. Also retryable.
    #[error("fetch of {key} timed out after {secs}s")]
    Timeout { key: String, secs: u64 },

    /// The resource will never be fetchable; the intent has been ignored.
    #[error("{key} is permanently unavailable: {reason}")]
    Permanent { key: String, reason: String },

    /// Persistence failed; not recoverable inside a scheduling cycle.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ExecError {
    /// `true` when the intent should stay queued for the next pass.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExecError::Transient { .. } | ExecError::Timeout { .. })
    }
}
