use thiserror::Error;

use crate::model::{CardError, InvalidDifficultyError, InvalidRatingError, ParseIdError};
use crate::scheduler::SchedulerError;

/// Umbrella error for callers that do not care which core check failed.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    InvalidRating(#[from] InvalidRatingError),
    #[error(transparent)]
    InvalidDifficulty(#[from] InvalidDifficultyError),
    #[error(transparent)]
    InvalidQuestionId(#[from] ParseIdError),
    #[error(transparent)]
    Card(#[from] CardError),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}
