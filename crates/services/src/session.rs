use chrono::{DateTime, Utc};

use reels_core::model::{Rating, ReviewCard, SessionCounts, SessionSummary, SessionSummaryError};

use crate::review_service::RecordedReview;

//
// ─── ANSWER RESULT ─────────────────────────────────────────────────────────────
//

/// Result of answering a single card in a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionAnswer {
    pub recorded: RecordedReview,
    pub is_complete: bool,
    /// Present once the last card has been rated.
    pub summary: Option<SessionSummary>,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// In-memory walk over a snapshot of due cards.
///
/// The card list is fixed at start; a card rated `again` is not re-queued even
/// though it becomes due again tomorrow. Nothing here is persisted, only the
/// individual reviews are (through `SrsService::answer_current`).
#[derive(Debug, Clone)]
pub struct ReviewSession {
    cards: Vec<ReviewCard>,
    current: usize,
    counts: SessionCounts,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl ReviewSession {
    /// An empty card list yields a session that is already complete.
    #[must_use]
    pub fn new(cards: Vec<ReviewCard>, started_at: DateTime<Utc>) -> Self {
        let completed_at = cards.is_empty().then_some(started_at);
        Self {
            cards,
            current: 0,
            counts: SessionCounts::default(),
            started_at,
            completed_at,
        }
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Card waiting for a rating, as it was when the session started.
    #[must_use]
    pub fn current(&self) -> Option<&ReviewCard> {
        self.cards.get(self.current)
    }

    /// Total number of cards in this session.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    #[must_use]
    pub fn answered(&self) -> usize {
        self.current.min(self.cards.len())
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.cards.len().saturating_sub(self.current)
    }

    #[must_use]
    pub fn counts(&self) -> SessionCounts {
        self.counts
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Summary of a finished session, `None` while cards remain.
    ///
    /// # Errors
    ///
    /// Returns `SessionSummaryError::InvalidTimeRange` if the completion time
    /// precedes `started_at`, which `advance` never produces.
    pub fn summary(&self) -> Result<Option<SessionSummary>, SessionSummaryError> {
        self.completed_at
            .map(|completed_at| SessionSummary::new(self.started_at, completed_at, self.counts))
            .transpose()
    }

    /// Count `rating` for the current card and step to the next one.
    ///
    /// The completion time never precedes `started_at`, so a finished session
    /// always has a summary.
    pub(crate) fn advance(&mut self, rating: Rating, answered_at: DateTime<Utc>) {
        if self.is_complete() {
            return;
        }
        self.counts.record(rating);
        self.current += 1;
        if self.current >= self.cards.len() {
            self.completed_at = Some(answered_at.max(self.started_at));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use reels_core::model::{Difficulty, QuestionId};
    use reels_core::scheduler::Scheduler;
    use reels_core::time::fixed_now;

    fn cards(ids: &[&str]) -> Vec<ReviewCard> {
        let scheduler = Scheduler::new();
        ids.iter()
            .map(|id| {
                scheduler
                    .new_card(QuestionId::new(*id).unwrap(), "rust", Difficulty::Beginner, fixed_now())
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn empty_session_is_complete_with_zero_summary() {
        let session = ReviewSession::new(Vec::new(), fixed_now());
        assert!(session.is_complete());
        assert!(session.current().is_none());
        let summary = session.summary().unwrap().expect("summary");
        assert_eq!(summary.total_reviews(), 0);
        assert_eq!(summary.completed_at(), fixed_now());
    }

    #[test]
    fn advance_walks_cards_and_counts_ratings() {
        let mut session = ReviewSession::new(cards(&["a", "b"]), fixed_now());
        assert_eq!(session.len(), 2);
        assert_eq!(session.current().unwrap().question_id().as_str(), "a");

        session.advance(Rating::Again, fixed_now() + Duration::minutes(1));
        assert_eq!(session.current().unwrap().question_id().as_str(), "b");
        assert_eq!(session.remaining(), 1);
        assert!(session.summary().unwrap().is_none());

        session.advance(Rating::Easy, fixed_now() + Duration::minutes(2));
        assert!(session.is_complete());
        assert_eq!(session.answered(), 2);

        let summary = session.summary().unwrap().unwrap();
        assert_eq!(summary.counts().again, 1);
        assert_eq!(summary.counts().easy, 1);
        assert_eq!(summary.completed_at(), fixed_now() + Duration::minutes(2));
    }

    #[test]
    fn completion_before_start_is_clamped() {
        let mut session = ReviewSession::new(cards(&["a"]), fixed_now());
        session.advance(Rating::Good, fixed_now() - Duration::minutes(5));

        assert_eq!(session.completed_at(), Some(fixed_now()));
        let summary = session.summary().unwrap().unwrap();
        assert_eq!(summary.total_reviews(), 1);
    }

    #[test]
    fn advance_after_completion_is_ignored() {
        let mut session = ReviewSession::new(cards(&["a"]), fixed_now());
        session.advance(Rating::Good, fixed_now());
        session.advance(Rating::Good, fixed_now());
        assert_eq!(session.counts().total(), 1);
    }
}
