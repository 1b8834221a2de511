use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::{
    ids::QuestionId,
    mastery::{MasteryLevel, MasteryLevelError},
    review::ReviewEntry,
};

//
// ─── DIFFICULTY ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid difficulty: {provided:?} (expected beginner, intermediate or advanced)")]
pub struct InvalidDifficultyError {
    pub provided: String,
}

/// Authored difficulty of the underlying question.
///
/// Only used as a hint for the first successful interval of a brand-new card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    #[default]
    Intermediate,
    Advanced,
}

impl Difficulty {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }

    /// Days shaved off the "easy" bootstrap interval for harder material.
    #[must_use]
    pub fn easy_bootstrap_offset(self) -> u32 {
        match self {
            Difficulty::Beginner => 0,
            Difficulty::Intermediate => 1,
            Difficulty::Advanced => 2,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = InvalidDifficultyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginner" => Ok(Self::Beginner),
            "intermediate" => Ok(Self::Intermediate),
            "advanced" => Ok(Self::Advanced),
            _ => Err(InvalidDifficultyError {
                provided: s.to_owned(),
            }),
        }
    }
}

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum CardError {
    #[error("ease factor must be finite and positive, got {provided}")]
    InvalidEase { provided: f64 },

    #[error(transparent)]
    Mastery(#[from] MasteryLevelError),

    #[error("invalid persisted state: {0}")]
    InvalidPersistedState(String),
}

//
// ─── REVIEW CARD ───────────────────────────────────────────────────────────────
//

/// Scheduling record for one question and the (single) learner.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewCard {
    question_id: QuestionId,
    channel: String,
    difficulty: Difficulty,
    mastery_level: MasteryLevel,
    interval_days: u32,
    ease_factor: f64,
    due_at: DateTime<Utc>,
    last_reviewed_at: Option<DateTime<Utc>>,
    review_history: Vec<ReviewEntry>,
}

impl ReviewCard {
    /// Create a never-reviewed card that is due immediately.
    ///
    /// # Errors
    ///
    /// Returns `CardError::InvalidEase` if `initial_ease` is not finite and positive.
    pub fn new(
        question_id: QuestionId,
        channel: impl Into<String>,
        difficulty: Difficulty,
        initial_ease: f64,
        now: DateTime<Utc>,
    ) -> Result<Self, CardError> {
        validate_ease(initial_ease)?;
        Ok(Self {
            question_id,
            channel: channel.into(),
            difficulty,
            mastery_level: MasteryLevel::NEW,
            interval_days: 0,
            ease_factor: initial_ease,
            due_at: now,
            last_reviewed_at: None,
            review_history: Vec::new(),
        })
    }

    /// Rehydrate a card from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `CardError` if the ease factor or mastery tier is invalid, or if a
    /// reviewed card's due date does not follow from its last review and interval.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        question_id: QuestionId,
        channel: String,
        difficulty: Difficulty,
        mastery_level: u8,
        interval_days: u32,
        ease_factor: f64,
        due_at: DateTime<Utc>,
        last_reviewed_at: Option<DateTime<Utc>>,
        review_history: Vec<ReviewEntry>,
    ) -> Result<Self, CardError> {
        validate_ease(ease_factor)?;
        let mastery_level = MasteryLevel::new(mastery_level)?;

        if let Some(last) = last_reviewed_at {
            let expected = Self::due_date_for(last, interval_days).ok_or_else(|| {
                CardError::InvalidPersistedState(
                    "interval_days puts due_at out of the representable range".into(),
                )
            })?;
            if expected != due_at {
                return Err(CardError::InvalidPersistedState(
                    "due_at does not match last_reviewed_at + interval_days".into(),
                ));
            }
        } else if interval_days != 0 {
            return Err(CardError::InvalidPersistedState(
                "unreviewed card with non-zero interval".into(),
            ));
        }

        Ok(Self {
            question_id,
            channel,
            difficulty,
            mastery_level,
            interval_days,
            ease_factor,
            due_at,
            last_reviewed_at,
            review_history,
        })
    }

    /// `reviewed_at` plus `interval_days`, or `None` past the representable range.
    #[must_use]
    pub fn due_date_for(reviewed_at: DateTime<Utc>, interval_days: u32) -> Option<DateTime<Utc>> {
        Duration::try_days(i64::from(interval_days))
            .and_then(|interval| reviewed_at.checked_add_signed(interval))
    }

    /// Record a scheduling decision. Only the scheduler calls this; `due_at`
    /// must come from [`ReviewCard::due_date_for`].
    pub(crate) fn apply_schedule(
        &mut self,
        mastery_level: MasteryLevel,
        interval_days: u32,
        ease_factor: f64,
        due_at: DateTime<Utc>,
        entry: ReviewEntry,
    ) {
        self.mastery_level = mastery_level;
        self.interval_days = interval_days;
        self.ease_factor = ease_factor;
        self.last_reviewed_at = Some(entry.reviewed_at);
        self.due_at = due_at;
        self.review_history.push(entry);
    }

    #[must_use]
    pub fn question_id(&self) -> &QuestionId {
        &self.question_id
    }

    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    #[must_use]
    pub fn mastery_level(&self) -> MasteryLevel {
        self.mastery_level
    }

    #[must_use]
    pub fn interval_days(&self) -> u32 {
        self.interval_days
    }

    #[must_use]
    pub fn ease_factor(&self) -> f64 {
        self.ease_factor
    }

    #[must_use]
    pub fn due_at(&self) -> DateTime<Utc> {
        self.due_at
    }

    #[must_use]
    pub fn last_reviewed_at(&self) -> Option<DateTime<Utc>> {
        self.last_reviewed_at
    }

    #[must_use]
    pub fn review_history(&self) -> &[ReviewEntry] {
        &self.review_history
    }

    /// True if the card has never been reviewed.
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.last_reviewed_at.is_none()
    }

    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.due_at <= now
    }
}

fn validate_ease(ease: f64) -> Result<(), CardError> {
    if !ease.is_finite() || ease <= 0.0 {
        return Err(CardError::InvalidEase { provided: ease });
    }
    Ok(())
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
