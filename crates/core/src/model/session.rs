use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::Rating;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionSummaryError {
    #[error("completed_at is before started_at")]
    InvalidTimeRange,
}

/// Per-session rating counters. Ephemeral, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionCounts {
    pub again: u32,
    pub hard: u32,
    pub good: u32,
    pub easy: u32,
}

impl SessionCounts {
    pub fn record(&mut self, rating: Rating) {
        let slot = match rating {
            Rating::Again => &mut self.again,
            Rating::Hard => &mut self.hard,
            Rating::Good => &mut self.good,
            Rating::Easy => &mut self.easy,
        };
        *slot = slot.saturating_add(1);
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.again
            .saturating_add(self.hard)
            .saturating_add(self.good)
            .saturating_add(self.easy)
    }

    /// Share of non-`again` ratings, or `None` before the first rating.
    #[must_use]
    pub fn recall_rate(&self) -> Option<f64> {
        let total = self.total();
        if total == 0 {
            return None;
        }
        Some(f64::from(total - self.again) / f64::from(total))
    }
}

/// Aggregate summary for a completed review session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
    counts: SessionCounts,
}

impl SessionSummary {
    /// # Errors
    ///
    /// Returns `SessionSummaryError::InvalidTimeRange` if `completed_at` is before `started_at`.
    pub fn new(
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        counts: SessionCounts,
    ) -> Result<Self, SessionSummaryError> {
        if completed_at < started_at {
            return Err(SessionSummaryError::InvalidTimeRange);
        }
        Ok(Self {
            started_at,
            completed_at,
            counts,
        })
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    #[must_use]
    pub fn counts(&self) -> SessionCounts {
        self.counts
    }

    #[must_use]
    pub fn total_reviews(&self) -> u32 {
        self.counts.total()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn counts_ratings() {
        let mut counts = SessionCounts::default();
        for rating in [
            Rating::Good,
            Rating::Again,
            Rating::Hard,
            Rating::Easy,
            Rating::Good,
        ] {
            counts.record(rating);
        }

        assert_eq!(counts.total(), 5);
        assert_eq!(counts.again, 1);
        assert_eq!(counts.hard, 1);
        assert_eq!(counts.good, 2);
        assert_eq!(counts.easy, 1);
        assert_eq!(counts.recall_rate(), Some(0.8));
    }

    #[test]
    fn recall_rate_is_none_when_empty() {
        assert_eq!(SessionCounts::default().recall_rate(), None);
    }

    #[test]
    fn summary_rejects_inverted_time_range() {
        let now = fixed_now();
        let err = SessionSummary::new(now, now - chrono::Duration::seconds(1), SessionCounts::default())
            .unwrap_err();
        assert_eq!(err, SessionSummaryError::InvalidTimeRange);

        let summary = SessionSummary::new(now, now, SessionCounts::default()).unwrap();
        assert_eq!(summary.total_reviews(), 0);
    }
}
