use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

/// A rating outside `again | hard | good | easy` was supplied.
///
/// This is a caller bug; the value is reported back verbatim and never coerced.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid review rating: {provided:?} (expected again, hard, good or easy)")]
pub struct InvalidRatingError {
    pub provided: String,
}

//
// ─── RATING ───────────────────────────────────────────────────────────────────
//

/// Four-level self-assessed recall confidence for one review.
///
/// - `Again`: Failed to recall, card goes back to relearning
/// - `Hard`: Recalled with significant difficulty
/// - `Good`: Recalled correctly with appropriate effort
/// - `Easy`: Recalled instantly with no effort
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    /// Failed to recall the answer. Card will be shown again soon.
    Again,
    /// Recalled with significant difficulty. Interval increases slowly.
    Hard,
    /// Recalled correctly with appropriate effort. Standard interval increase.
    Good,
    /// Recalled instantly. Interval increases significantly.
    Easy,
}

impl Rating {
    pub const ALL: [Rating; 4] = [Rating::Again, Rating::Hard, Rating::Good, Rating::Easy];

    /// Converts a numeric rating (0-3) to a `Rating`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRatingError` if the value is not in the range 0-3.
    pub fn from_u8(value: u8) -> Result<Self, InvalidRatingError> {
        match value {
            0 => Ok(Self::Again),
            1 => Ok(Self::Hard),
            2 => Ok(Self::Good),
            3 => Ok(Self::Easy),
            _ => Err(InvalidRatingError {
                provided: value.to_string(),
            }),
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Rating::Again => "again",
            Rating::Hard => "hard",
            Rating::Good => "good",
            Rating::Easy => "easy",
        }
    }

    /// True for every rating except `Again`.
    #[must_use]
    pub fn is_success(self) -> bool {
        !matches!(self, Rating::Again)
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rating {
    type Err = InvalidRatingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "again" | "0" => Ok(Self::Again),
            "hard" | "1" => Ok(Self::Hard),
            "good" | "2" => Ok(Self::Good),
            "easy" | "3" => Ok(Self::Easy),
            _ => Err(InvalidRatingError {
                provided: s.to_owned(),
            }),
        }
    }
}

//
// ─── REVIEW HISTORY ───────────────────────────────────────────────────────────
//

/// One past rating of a card, kept for analytics only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewEntry {
    pub rating: Rating,
    pub reviewed_at: DateTime<Utc>,
}

impl ReviewEntry {
    #[must_use]
    pub fn new(rating: Rating, reviewed_at: DateTime<Utc>) -> Self {
        Self {
            rating,
            reviewed_at,
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
