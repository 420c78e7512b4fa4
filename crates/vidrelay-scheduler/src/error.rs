use thiserror::Error;

use vidrelay_store::StoreError;

/// Errors that end a scheduler run and hand control to the supervisor.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The intent or resource store could not be updated.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
