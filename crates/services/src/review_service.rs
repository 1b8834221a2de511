use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use tracing::{debug, info, warn};

use reels_core::{
    model::{Difficulty, QuestionId, Rating, ReviewCard, SrsStats},
    scheduler::{AppliedReview, ReviewPreview, Scheduler},
    time::{Clock, host_offset, local_date},
};
use storage::repository::SrsRepository;

use crate::error::SrsError;
use crate::session::{ReviewSession, SessionAnswer};

//
// ─── RESULTS ───────────────────────────────────────────────────────────────────
//

/// Result of a persisted review: updated card, applied schedule and streak.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedReview {
    pub card: ReviewCard,
    pub applied: AppliedReview,
    /// Persisted streak counter after this review.
    pub review_streak: u32,
    /// True if this review was the first of the learner's day.
    pub streak_credited: bool,
}

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Spaced-repetition review operations over an injected store and clock.
///
/// Every write happens through a single `set_many`, so a failed call leaves
/// the persisted card and streak exactly as they were.
#[derive(Clone)]
pub struct SrsService {
    clock: Clock,
    scheduler: Scheduler,
    repo: SrsRepository,
    offset: FixedOffset,
}

impl SrsService {
    /// Create a service with the default scheduler, real-time clock and the
    /// host's local UTC offset.
    #[must_use]
    pub fn new(repo: SrsRepository) -> Self {
        Self {
            clock: Clock::default(),
            scheduler: Scheduler::new(),
            repo,
            offset: host_offset(),
        }
    }

    /// Override the clock (usually for deterministic testing).
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_scheduler(mut self, scheduler: Scheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Set the learner's UTC offset used for calendar-day streaks.
    #[must_use]
    pub fn with_utc_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    /// Current time according to the service's clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// The learner's current calendar date.
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        local_date(self.now(), self.offset)
    }

    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    #[must_use]
    pub fn repository(&self) -> &SrsRepository {
        &self.repo
    }

    /// Cards with `due_at <= now`, oldest-overdue first.
    ///
    /// The returned list is a snapshot; it is not re-queried as cards get rated.
    ///
    /// # Errors
    ///
    /// Returns `SrsError::Storage` if the store cannot be read.
    pub async fn get_due_cards(&self) -> Result<Vec<ReviewCard>, SrsError> {
        self.due_cards_matching(|_| true).await
    }

    /// Due cards restricted to one channel.
    ///
    /// # Errors
    ///
    /// Returns `SrsError::Storage` if the store cannot be read.
    pub async fn get_due_cards_in_channel(
        &self,
        channel: &str,
    ) -> Result<Vec<ReviewCard>, SrsError> {
        self.due_cards_matching(|card| card.channel() == channel)
            .await
    }

    async fn due_cards_matching(
        &self,
        keep: impl Fn(&ReviewCard) -> bool,
    ) -> Result<Vec<ReviewCard>, SrsError> {
        let now = self.now();
        let mut due: Vec<ReviewCard> = self
            .repo
            .all_cards()
            .await?
            .into_iter()
            .filter(|card| card.is_due(now) && keep(card))
            .collect();
        // Stable sort: equal due dates keep key order.
        due.sort_by_key(ReviewCard::due_at);
        Ok(due)
    }

    /// # Errors
    ///
    /// Returns `SrsError::Storage` if the store cannot be read.
    pub async fn get_card(&self, question_id: &QuestionId) -> Result<Option<ReviewCard>, SrsError> {
        Ok(self.repo.get_card(question_id).await?)
    }

    /// Put a question into the review rotation, returning the existing card if
    /// it is already there.
    ///
    /// # Errors
    ///
    /// Returns `SrsError::Storage` if the store fails.
    pub async fn mark_for_review(
        &self,
        question_id: &QuestionId,
        channel: &str,
        difficulty: Difficulty,
    ) -> Result<ReviewCard, SrsError> {
        if let Some(card) = self.repo.get_card(question_id).await? {
            return Ok(card);
        }

        let card = self
            .scheduler
            .new_card(question_id.clone(), channel, difficulty, self.now())?;
        if let Err(err) = self.repo.save_card(&card).await {
            warn!(question_id = %question_id, error = %err, "failed to persist new review card");
            return Err(err.into());
        }
        debug!(question_id = %question_id, channel, "question added to review");
        Ok(card)
    }

    /// Apply the learner's rating to a question's card and persist the result.
    ///
    /// Unknown questions get a fresh card first. `channel` and `difficulty`
    /// only matter for that lazily created card; an existing card keeps its
    /// stored values.
    ///
    /// # Errors
    ///
    /// - `SrsError::Scheduler` if the clock is behind the card's last review
    /// - `SrsError::Storage` if the store cannot be read or written
    pub async fn record_review(
        &self,
        question_id: &QuestionId,
        channel: &str,
        difficulty: Difficulty,
        rating: Rating,
    ) -> Result<RecordedReview, SrsError> {
        let now = self.now();

        let mut card = match self.repo.get_card(question_id).await? {
            Some(card) => card,
            None => self
                .scheduler
                .new_card(question_id.clone(), channel, difficulty, now)?,
        };
        let applied = self.scheduler.apply_review(&mut card, rating, now)?;

        let mut streak = self.repo.get_streak().await?;
        let streak_credited = streak.credit(local_date(now, self.offset));

        let streak_write = streak_credited.then_some(&streak);
        if let Err(err) = self.repo.save_review(&card, streak_write).await {
            warn!(question_id = %question_id, %rating, error = %err, "failed to persist review");
            return Err(err.into());
        }

        debug!(
            question_id = %question_id,
            %rating,
            interval_days = applied.scheduled.interval_days,
            mastery = applied.scheduled.mastery_level.value(),
            "review recorded"
        );
        if streak_credited {
            info!(streak = streak.current(), longest = streak.longest(), "review streak credited");
        }

        Ok(RecordedReview {
            card,
            applied,
            review_streak: streak.current(),
            streak_credited,
        })
    }

    /// Same as [`record_review`](Self::record_review) for a rating coming in as
    /// raw text. An unrecognised rating is rejected before storage is touched.
    ///
    /// # Errors
    ///
    /// - `SrsError::InvalidRating` if `raw_rating` is not again/hard/good/easy
    /// - anything [`record_review`](Self::record_review) returns
    pub async fn record_review_input(
        &self,
        question_id: &QuestionId,
        channel: &str,
        difficulty: Difficulty,
        raw_rating: &str,
    ) -> Result<RecordedReview, SrsError> {
        let rating: Rating = raw_rating.parse()?;
        self.record_review(question_id, channel, difficulty, rating)
            .await
    }

    /// Interval hints for each rating of `card`, computed exactly like
    /// `record_review` would.
    #[must_use]
    pub fn get_next_review_preview(&self, card: &ReviewCard) -> ReviewPreview {
        self.scheduler.preview(card)
    }

    /// # Errors
    ///
    /// Returns `SrsError::Storage` if the store cannot be read.
    pub async fn get_srs_stats(&self) -> Result<SrsStats, SrsError> {
        let cards = self.repo.all_cards().await?;
        let streak = self.repo.get_streak().await?;
        Ok(SrsStats::collect(&cards, &streak, self.now(), self.offset))
    }

    /// Drop one question's review progress. Returns whether a card existed.
    ///
    /// # Errors
    ///
    /// Returns `SrsError::Storage` if the store fails.
    pub async fn reset_card(&self, question_id: &QuestionId) -> Result<bool, SrsError> {
        if self.repo.get_card(question_id).await?.is_none() {
            return Ok(false);
        }
        self.repo.delete_card(question_id).await?;
        info!(question_id = %question_id, "review progress reset");
        Ok(true)
    }

    /// Drop all review progress, including streak counters.
    ///
    /// # Errors
    ///
    /// Returns `SrsError::Storage` if the store fails.
    pub async fn reset_all(&self) -> Result<usize, SrsError> {
        let removed = self.repo.clear().await?;
        info!(removed, "all review progress reset");
        Ok(removed)
    }

    /// Start a session over the current due snapshot.
    ///
    /// # Errors
    ///
    /// Returns `SrsError::Storage` if the store cannot be read.
    pub async fn start_session(&self) -> Result<ReviewSession, SrsError> {
        let cards = self.get_due_cards().await?;
        Ok(ReviewSession::new(cards, self.now()))
    }

    /// Start a session over the due cards of one channel.
    ///
    /// # Errors
    ///
    /// Returns `SrsError::Storage` if the store cannot be read.
    pub async fn start_session_in_channel(&self, channel: &str) -> Result<ReviewSession, SrsError> {
        let cards = self.get_due_cards_in_channel(channel).await?;
        Ok(ReviewSession::new(cards, self.now()))
    }

    /// Rate the session's current card, persist it and advance.
    ///
    /// On error the session stays on the same card.
    ///
    /// # Errors
    ///
    /// - `SrsError::SessionComplete` if every card was already rated
    /// - anything [`record_review`](Self::record_review) returns
    pub async fn answer_current(
        &self,
        session: &mut ReviewSession,
        rating: Rating,
    ) -> Result<SessionAnswer, SrsError> {
        let (question_id, channel, difficulty) = {
            let card = session.current().ok_or(SrsError::SessionComplete)?;
            (
                card.question_id().clone(),
                card.channel().to_owned(),
                card.difficulty(),
            )
        };

        let recorded = self
            .record_review(&question_id, &channel, difficulty, rating)
            .await?;
        session.advance(rating, self.now());

        let summary = session.summary()?;
        if let Some(summary) = &summary {
            info!(
                total = summary.total_reviews(),
                again = summary.counts().again,
                "review session completed"
            );
        }

        Ok(SessionAnswer {
            recorded,
            is_complete: session.is_complete(),
            summary,
        })
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use reels_core::time::fixed_now;
    use std::sync::Arc;
    use storage::repository::{InMemoryStore, KeyValueStore};

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn service_at(store: &InMemoryStore, at: DateTime<Utc>) -> SrsService {
        SrsService::new(SrsRepository::new(Arc::new(store.clone())))
            .with_clock(Clock::fixed(at))
            .with_utc_offset(utc())
    }

    fn qid(s: &str) -> QuestionId {
        QuestionId::new(s).unwrap()
    }

    #[tokio::test]
    async fn record_review_creates_missing_card() {
        let store = InMemoryStore::new();
        let svc = service_at(&store, fixed_now());

        let recorded = svc
            .record_review(&qid("q1"), "react", Difficulty::Beginner, Rating::Good)
            .await
            .unwrap();

        assert_eq!(recorded.card.interval_days(), 1);
        assert_eq!(recorded.card.mastery_level().value(), 1);
        assert_eq!(recorded.card.channel(), "react");
        let stored = svc.get_card(&qid("q1")).await.unwrap().unwrap();
        assert_eq!(stored, recorded.card);
    }

    #[tokio::test]
    async fn mark_for_review_is_lazy_and_idempotent() {
        let store = InMemoryStore::new();
        let svc = service_at(&store, fixed_now());

        let first = svc
            .mark_for_review(&qid("q1"), "sql", Difficulty::Advanced)
            .await
            .unwrap();
        assert!(first.is_new());
        assert!(first.is_due(fixed_now()));

        svc.record_review(&qid("q1"), "sql", Difficulty::Advanced, Rating::Easy)
            .await
            .unwrap();

        let again = svc
            .mark_for_review(&qid("q1"), "other", Difficulty::Beginner)
            .await
            .unwrap();
        assert!(!again.is_new());
        assert_eq!(again.channel(), "sql");
    }

    #[tokio::test]
    async fn due_cards_are_sorted_oldest_first_and_exclude_future() {
        let store = InMemoryStore::new();
        let start = fixed_now();

        // c: reviewed at start (due start+1d), a: reviewed a day earlier, b: new
        service_at(&store, start - Duration::days(1))
            .record_review(&qid("a"), "js", Difficulty::Beginner, Rating::Good)
            .await
            .unwrap();
        service_at(&store, start)
            .record_review(&qid("c"), "js", Difficulty::Beginner, Rating::Good)
            .await
            .unwrap();
        let svc = service_at(&store, start + Duration::hours(1));
        svc.mark_for_review(&qid("b"), "css", Difficulty::Beginner)
            .await
            .unwrap();

        let due = svc.get_due_cards().await.unwrap();
        let ids: Vec<&str> = due.iter().map(|c| c.question_id().as_str()).collect();
        // a due at start, b due at start+1h, c due at start+1d (not yet).
        assert_eq!(ids, vec!["a", "b"]);

        let css = svc.get_due_cards_in_channel("css").await.unwrap();
        assert_eq!(css.len(), 1);
        assert_eq!(css[0].question_id().as_str(), "b");
    }

    #[tokio::test]
    async fn invalid_rating_leaves_state_untouched() {
        let store = InMemoryStore::new();
        let svc = service_at(&store, fixed_now());
        svc.record_review(&qid("q1"), "go", Difficulty::Beginner, Rating::Good)
            .await
            .unwrap();
        let before = svc.get_card(&qid("q1")).await.unwrap();

        let err = svc
            .record_review_input(&qid("q1"), "go", Difficulty::Beginner, "superb")
            .await
            .unwrap_err();

        assert!(matches!(err, SrsError::InvalidRating(ref e) if e.provided == "superb"));
        assert_eq!(svc.get_card(&qid("q1")).await.unwrap(), before);
    }

    #[tokio::test]
    async fn streak_counts_once_per_day() {
        let store = InMemoryStore::new();
        let svc = service_at(&store, fixed_now());

        let first = svc
            .record_review(&qid("a"), "js", Difficulty::Beginner, Rating::Good)
            .await
            .unwrap();
        let second = svc
            .record_review(&qid("b"), "js", Difficulty::Beginner, Rating::Hard)
            .await
            .unwrap();

        assert!(first.streak_credited);
        assert!(!second.streak_credited);
        assert_eq!(second.review_streak, 1);

        let next_day = service_at(&store, fixed_now() + Duration::days(1));
        let third = next_day
            .record_review(&qid("c"), "js", Difficulty::Beginner, Rating::Easy)
            .await
            .unwrap();
        assert_eq!(third.review_streak, 2);

        let stats = next_day.get_srs_stats().await.unwrap();
        assert_eq!(stats.review_streak, 2);
        assert_eq!(stats.longest_streak, 2);
    }

    #[tokio::test]
    async fn storage_failure_surfaces_and_writes_nothing() {
        // Card plus first streak record do not fit into one entry.
        let store = InMemoryStore::with_quota(1);
        let svc = service_at(&store, fixed_now());

        let err = svc
            .record_review(&qid("q1"), "js", Difficulty::Beginner, Rating::Good)
            .await
            .unwrap_err();
        assert!(err.is_storage_unavailable());
        assert!(store.is_empty());

        store.set_disabled(true);
        let err = svc.get_due_cards().await.unwrap_err();
        assert!(err.is_storage_unavailable());
    }

    #[tokio::test]
    async fn backdated_clock_is_rejected() {
        let store = InMemoryStore::new();
        service_at(&store, fixed_now())
            .record_review(&qid("q1"), "js", Difficulty::Beginner, Rating::Good)
            .await
            .unwrap();

        let err = service_at(&store, fixed_now() - Duration::hours(2))
            .record_review(&qid("q1"), "js", Difficulty::Beginner, Rating::Good)
            .await
            .unwrap_err();
        assert!(matches!(err, SrsError::Scheduler(_)));
    }

    #[tokio::test]
    async fn preview_matches_recorded_interval() {
        let store = InMemoryStore::new();
        let svc = service_at(&store, fixed_now());
        svc.record_review(&qid("q1"), "js", Difficulty::Intermediate, Rating::Good)
            .await
            .unwrap();

        let later = service_at(&store, fixed_now() + Duration::days(1));
        let card = later.get_card(&qid("q1")).await.unwrap().unwrap();
        let preview = later.get_next_review_preview(&card);

        let recorded = later
            .record_review(&qid("q1"), "js", Difficulty::Intermediate, Rating::Hard)
            .await
            .unwrap();
        assert_eq!(preview.hard.interval_days, recorded.card.interval_days());
        assert_eq!(preview.hard.label, "2 days");
    }

    #[tokio::test]
    async fn reset_card_and_reset_all() {
        let store = InMemoryStore::new();
        store.set("theme", "dark").await.unwrap();
        let svc = service_at(&store, fixed_now());
        for id in ["a", "b"] {
            svc.record_review(&qid(id), "js", Difficulty::Beginner, Rating::Good)
                .await
                .unwrap();
        }

        assert!(svc.reset_card(&qid("a")).await.unwrap());
        assert!(!svc.reset_card(&qid("a")).await.unwrap());

        assert_eq!(svc.reset_all().await.unwrap(), 1);
        let stats = svc.get_srs_stats().await.unwrap();
        assert_eq!(stats.total_cards, 0);
        assert_eq!(stats.longest_streak, 0);
        assert_eq!(store.len(), 1);
    }
}
