use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{CardError, Difficulty, MasteryLevel, QuestionId, Rating, ReviewCard, ReviewEntry};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchedulerError {
    #[error("invalid scheduler config: {0}")]
    InvalidConfig(String),
    #[error("review at {reviewed_at} precedes last review at {last_reviewed_at}")]
    ReviewBeforeLastReview {
        reviewed_at: DateTime<Utc>,
        last_reviewed_at: DateTime<Utc>,
    },
    #[error("an interval of {interval_days} days from {reviewed_at} is out of range")]
    DueDateOutOfRange {
        reviewed_at: DateTime<Utc>,
        interval_days: u32,
    },
}

//
// ─── CONFIG ────────────────────────────────────────────────────────────────────
//

/// Tunable constants of the SM-2 style interval update.
///
/// The defaults are a pragmatic approximation of SM-2, not a canonical
/// parameterization. Any config accepted by [`Scheduler::try_with_config`]
/// keeps intervals positive and the ease factor inside `[min_ease, max_ease]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub initial_ease: f64,
    pub min_ease: f64,
    pub max_ease: f64,
    /// Ease lost on `again`.
    pub again_penalty: f64,
    /// Ease lost on `hard`.
    pub hard_penalty: f64,
    /// Ease gained on `easy`.
    pub easy_bonus: f64,
    /// Interval growth on `hard`, in `(1.0, 1.5)`.
    ///
    /// Intervals are whole days and `hard` always adds at least one day, so
    /// short intervals grow faster than this factor (1 -> 2, 2 -> 3 days).
    pub hard_multiplier: f64,
    /// Extra growth on `easy` on top of the ease factor.
    pub easy_multiplier: f64,
    pub relearn_interval_days: u32,
    pub hard_bootstrap_days: u32,
    pub good_bootstrap_days: u32,
    pub easy_bootstrap_days: u32,
    pub max_interval_days: u32,
}

/// Upper bound accepted for [`SchedulerConfig::max_interval_days`] (100 years).
pub const MAX_INTERVAL_DAYS_LIMIT: u32 = 36_500;

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            initial_ease: 2.5,
            min_ease: 1.3,
            max_ease: 3.0,
            again_penalty: 0.2,
            hard_penalty: 0.15,
            easy_bonus: 0.15,
            hard_multiplier: 1.2,
            easy_multiplier: 1.3,
            relearn_interval_days: 1,
            hard_bootstrap_days: 1,
            good_bootstrap_days: 1,
            easy_bootstrap_days: 4,
            max_interval_days: 365,
        }
    }
}

impl SchedulerConfig {
    /// Check the config for values that would break interval or ease invariants.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidConfig` describing the first offending field.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        let invalid = |msg: &str| Err(SchedulerError::InvalidConfig(msg.to_owned()));

        let floats = [
            self.initial_ease,
            self.min_ease,
            self.max_ease,
            self.again_penalty,
            self.hard_penalty,
            self.easy_bonus,
            self.hard_multiplier,
            self.easy_multiplier,
        ];
        if floats.iter().any(|v| !v.is_finite()) {
            return invalid("all factors must be finite");
        }
        if self.min_ease <= 0.0 {
            return invalid("min_ease must be positive");
        }
        if !(self.min_ease <= self.initial_ease && self.initial_ease <= self.max_ease) {
            return invalid("initial_ease must lie within [min_ease, max_ease]");
        }
        if self.again_penalty < 0.0 || self.hard_penalty < 0.0 || self.easy_bonus < 0.0 {
            return invalid("ease adjustments must be non-negative");
        }
        if !(self.hard_multiplier > 1.0 && self.hard_multiplier < 1.5) {
            return invalid("hard_multiplier must lie in (1.0, 1.5)");
        }
        if self.easy_multiplier <= 1.0 {
            return invalid("easy_multiplier must be greater than 1.0");
        }
        if self.relearn_interval_days == 0
            || self.hard_bootstrap_days == 0
            || self.good_bootstrap_days == 0
            || self.easy_bootstrap_days == 0
        {
            return invalid("relearn and bootstrap intervals must be at least one day");
        }
        if self.max_interval_days > MAX_INTERVAL_DAYS_LIMIT {
            return invalid("max_interval_days must not exceed 36500 days");
        }
        if self.max_interval_days < self.relearn_interval_days
            || self.max_interval_days < self.easy_bootstrap_days
        {
            return invalid("max_interval_days must cover relearn and bootstrap intervals");
        }
        Ok(())
    }
}

//
// ─── SCHEDULED STATES ──────────────────────────────────────────────────────────
//

/// Next state of a card under one hypothetical rating.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledReview {
    pub rating: Rating,
    pub interval_days: u32,
    pub ease_factor: f64,
    pub mastery_level: MasteryLevel,
}

/// All possible next review states for a card.
///
/// Select the applied one with `.select(rating)`; the preview shown to the
/// learner is built from the same value, so the two cannot diverge.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledStates {
    pub again: ScheduledReview,
    pub hard: ScheduledReview,
    pub good: ScheduledReview,
    pub easy: ScheduledReview,
}

impl ScheduledStates {
    #[must_use]
    pub fn select(&self, rating: Rating) -> &ScheduledReview {
        match rating {
            Rating::Again => &self.again,
            Rating::Hard => &self.hard,
            Rating::Good => &self.good,
            Rating::Easy => &self.easy,
        }
    }

    #[must_use]
    pub fn preview(&self) -> ReviewPreview {
        let entry = |s: &ScheduledReview| PreviewEntry {
            interval_days: s.interval_days,
            label: format_interval(s.interval_days),
        };
        ReviewPreview {
            again: entry(&self.again),
            hard: entry(&self.hard),
            good: entry(&self.good),
            easy: entry(&self.easy),
        }
    }
}

//
// ─── PREVIEW ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewEntry {
    pub interval_days: u32,
    pub label: String,
}

/// "If you press Hard you'll see this again in 3 days" hints for each rating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewPreview {
    pub again: PreviewEntry,
    pub hard: PreviewEntry,
    pub good: PreviewEntry,
    pub easy: PreviewEntry,
}

impl ReviewPreview {
    #[must_use]
    pub fn get(&self, rating: Rating) -> &PreviewEntry {
        match rating {
            Rating::Again => &self.again,
            Rating::Hard => &self.hard,
            Rating::Good => &self.good,
            Rating::Easy => &self.easy,
        }
    }
}

/// Human-readable duration label for an interval in days.
///
/// ```
/// # use reels_core::scheduler::format_interval;
/// assert_eq!(format_interval(1), "1 day");
/// assert_eq!(format_interval(21), "3 weeks");
/// ```
#[must_use]
pub fn format_interval(days: u32) -> String {
    match days {
        0 => "today".to_owned(),
        1 => "1 day".to_owned(),
        2..=13 => format!("{days} days"),
        14..=59 => format!("{} weeks", (days + 3) / 7),
        60..=364 => format!("{} months", (days + 15) / 30),
        _ => match days.saturating_add(182) / 365 {
            1 => "1 year".to_owned(),
            n => format!("{n} years"),
        },
    }
}

//
// ─── SCHEDULER ─────────────────────────────────────────────────────────────────
//

/// SM-2 family scheduler.
///
/// `again` sends a card back to a short relearning interval and costs ease;
/// successful ratings grow the interval by `hard_multiplier`, the ease factor,
/// or the ease factor times `easy_multiplier`. A card that has never been
/// reviewed gets a fixed bootstrap interval instead of multiplying zero.
///
/// # Examples
///
/// ```
/// # use reels_core::scheduler::Scheduler;
/// # use reels_core::model::{Difficulty, QuestionId, Rating};
/// let scheduler = Scheduler::new();
/// let now = chrono::Utc::now();
/// let mut card = scheduler.new_card(QuestionId::new("q-1")?, "react", Difficulty::Beginner, now)?;
///
/// let applied = scheduler.apply_review(&mut card, Rating::Good, now)?;
/// assert_eq!(applied.scheduled.interval_days, 1);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    config: SchedulerConfig,
}

/// Outcome of applying a review: chosen schedule and the history entry appended.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedReview {
    pub scheduled: ScheduledReview,
    pub entry: ReviewEntry,
    pub due_at: DateTime<Utc>,
}

impl Scheduler {
    /// Create scheduler with the default constants.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create scheduler with custom constants.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidConfig` if the config is inconsistent.
    pub fn try_with_config(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Build a never-reviewed card with this scheduler's initial ease.
    ///
    /// # Errors
    ///
    /// Returns `CardError` if the configured ease is unusable.
    pub fn new_card(
        &self,
        question_id: QuestionId,
        channel: impl Into<String>,
        difficulty: Difficulty,
        now: DateTime<Utc>,
    ) -> Result<ReviewCard, CardError> {
        ReviewCard::new(question_id, channel, difficulty, self.config.initial_ease, now)
    }

    /// Compute the next state for every rating without touching the card.
    #[must_use]
    pub fn schedule(&self, card: &ReviewCard) -> ScheduledStates {
        let c = &self.config;
        let ease = card.ease_factor();
        let promoted = card.mastery_level().promoted();
        let (hard, good, easy) = self.success_intervals(card);

        ScheduledStates {
            again: ScheduledReview {
                rating: Rating::Again,
                interval_days: c.relearn_interval_days,
                ease_factor: self.clamp_ease(ease - c.again_penalty),
                mastery_level: MasteryLevel::NEW,
            },
            hard: ScheduledReview {
                rating: Rating::Hard,
                interval_days: hard,
                ease_factor: self.clamp_ease(ease - c.hard_penalty),
                mastery_level: promoted,
            },
            good: ScheduledReview {
                rating: Rating::Good,
                interval_days: good,
                ease_factor: self.clamp_ease(ease),
                mastery_level: promoted,
            },
            easy: ScheduledReview {
                rating: Rating::Easy,
                interval_days: easy,
                ease_factor: self.clamp_ease(ease + c.easy_bonus),
                mastery_level: promoted,
            },
        }
    }

    /// Preview labels for the four ratings of `card`.
    #[must_use]
    pub fn preview(&self, card: &ReviewCard) -> ReviewPreview {
        self.schedule(card).preview()
    }

    /// Apply the learner's rating to `card`.
    ///
    /// The card is left untouched when an error is returned.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::ReviewBeforeLastReview` if `reviewed_at` is
    /// earlier than the card's last review.
    pub fn apply_review(
        &self,
        card: &mut ReviewCard,
        rating: Rating,
        reviewed_at: DateTime<Utc>,
    ) -> Result<AppliedReview, SchedulerError> {
        if let Some(last_reviewed_at) = card.last_reviewed_at() {
            if reviewed_at < last_reviewed_at {
                return Err(SchedulerError::ReviewBeforeLastReview {
                    reviewed_at,
                    last_reviewed_at,
                });
            }
        }

        let scheduled = self.schedule(card).select(rating).clone();
        let due_at = ReviewCard::due_date_for(reviewed_at, scheduled.interval_days).ok_or(
            SchedulerError::DueDateOutOfRange {
                reviewed_at,
                interval_days: scheduled.interval_days,
            },
        )?;
        let entry = ReviewEntry::new(rating, reviewed_at);
        card.apply_schedule(
            scheduled.mastery_level,
            scheduled.interval_days,
            scheduled.ease_factor,
            due_at,
            entry.clone(),
        );

        Ok(AppliedReview {
            scheduled,
            entry,
            due_at,
        })
    }

    /// Intervals for `hard`, `good` and `easy`, in that (non-decreasing) order.
    fn success_intervals(&self, card: &ReviewCard) -> (u32, u32, u32) {
        let c = &self.config;
        let cap = |days: u32| days.min(c.max_interval_days);

        let prev = card.interval_days();
        if prev == 0 {
            let hard = c.hard_bootstrap_days;
            let good = c.good_bootstrap_days.max(hard);
            let easy = c
                .easy_bootstrap_days
                .saturating_sub(card.difficulty().easy_bootstrap_offset())
                .max(good.saturating_add(1));
            return (cap(hard), cap(good), cap(easy));
        }

        let p = f64::from(prev);
        let ease = self.clamp_ease(card.ease_factor());
        let floor = prev.saturating_add(1);

        let hard = ceil_days(p * c.hard_multiplier).max(floor);
        let good = ceil_days(p * ease).max(hard);
        let easy = ceil_days(p * ease * c.easy_multiplier).max(good.saturating_add(1));

        (cap(hard), cap(good), cap(easy))
    }

    fn clamp_ease(&self, ease: f64) -> f64 {
        ease.clamp(self.config.min_ease, self.config.max_ease)
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn ceil_days(days: f64) -> u32 {
    let days = days.ceil();
    if days >= f64::from(u32::MAX) {
        u32::MAX
    } else if days <= 0.0 {
        0
    } else {
        days as u32
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
