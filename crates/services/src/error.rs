//! Shared error types for the services crate.

use thiserror::Error;

use reels_core::model::{CardError, InvalidRatingError, SessionSummaryError};
use reels_core::scheduler::SchedulerError;
use storage::repository::StorageError;

/// Errors emitted by `SrsService` and review sessions.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SrsError {
    #[error(transparent)]
    InvalidRating(#[from] InvalidRatingError),
    #[error(transparent)]
    Card(#[from] CardError),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Summary(#[from] SessionSummaryError),
    #[error("session already completed")]
    SessionComplete,
}

impl SrsError {
    /// True when the persistence layer could not be read or written.
    #[must_use]
    pub fn is_storage_unavailable(&self) -> bool {
        matches!(self, SrsError::Storage(StorageError::Unavailable(_)))
    }
}
