pub mod backoff;
pub mod catalog;
pub mod engine;
pub mod governor;
pub mod reconcile;
pub mod remote;
pub mod report;

use immich_core::ImmichError;
use thiserror::Error;

pub use engine::{AlbumSyncEngine, EngineOptions};
pub use report::{RuleOutcome, RuleReport, RunStatus, RunSummary};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("{operation} failed: {source}")]
    Api {
        operation: &'static str,
        #[source]
        source: ImmichError,
    },
    #[error("{operation} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        operation: &'static str,
        attempts: u32,
        #[source]
        source: ImmichError,
    },
    #[error(transparent)]
    Governor(#[from] governor::GovernorClosed),
}

impl SyncError {
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Api { source, .. } => source.is_retryable(),
            SyncError::RetriesExhausted { .. } | SyncError::Governor(_) => false,
        }
    }
}
