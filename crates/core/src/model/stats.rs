use chrono::{DateTime, FixedOffset, NaiveDate, Utc};

use crate::model::{MasteryLevel, ReviewCard, StreakState};
use crate::time::local_date;

/// Read-only snapshot of review progress across all cards.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SrsStats {
    pub total_cards: u32,
    pub due_today: u32,
    pub new_cards: u32,
    pub mastered_cards: u32,
    /// Card count per mastery tier, index = tier.
    pub by_mastery: [u32; MasteryLevel::MAX as usize + 1],
    pub reviewed_today: u32,
    pub review_streak: u32,
    pub longest_streak: u32,
    pub last_review_date: Option<NaiveDate>,
}

impl SrsStats {
    /// Aggregate stats over `cards` as of `now`, using the learner's `offset`
    /// to decide what "today" means.
    #[must_use]
    pub fn collect(
        cards: &[ReviewCard],
        streak: &StreakState,
        now: DateTime<Utc>,
        offset: FixedOffset,
    ) -> Self {
        let today = local_date(now, offset);
        let mut stats = Self {
            review_streak: streak.current_as_of(today),
            longest_streak: streak.longest(),
            last_review_date: streak.last_credit_date(),
            ..Self::default()
        };

        for card in cards {
            stats.total_cards = stats.total_cards.saturating_add(1);
            if card.is_due(now) {
                stats.due_today = stats.due_today.saturating_add(1);
            }
            if card.is_new() {
                stats.new_cards = stats.new_cards.saturating_add(1);
            }
            let tier = card.mastery_level();
            if tier.is_mastered() {
                stats.mastered_cards = stats.mastered_cards.saturating_add(1);
            }
            let slot = &mut stats.by_mastery[usize::from(tier.value())];
            *slot = slot.saturating_add(1);

            let today_reviews = card
                .review_history()
                .iter()
                .filter(|e| local_date(e.reviewed_at, offset) == today)
                .count();
            stats.reviewed_today = stats
                .reviewed_today
                .saturating_add(u32::try_from(today_reviews).unwrap_or(u32::MAX));
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Difficulty, QuestionId, Rating};
    use crate::scheduler::Scheduler;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn card(id: &str, now: DateTime<Utc>) -> ReviewCard {
        Scheduler::new()
            .new_card(QuestionId::new(id).unwrap(), "js", Difficulty::Beginner, now)
            .unwrap()
    }

    #[test]
    fn counts_due_new_and_reviewed_today() {
        let now = fixed_now();
        let scheduler = Scheduler::new();

        let fresh = card("a", now);
        let mut reviewed = card("b", now);
        scheduler
            .apply_review(&mut reviewed, Rating::Good, now)
            .unwrap();

        let mut streak = StreakState::default();
        streak.credit(local_date(now, utc()));

        let stats = SrsStats::collect(&[fresh, reviewed], &streak, now, utc());

        assert_eq!(stats.total_cards, 2);
        assert_eq!(stats.due_today, 1);
        assert_eq!(stats.new_cards, 1);
        assert_eq!(stats.reviewed_today, 1);
        assert_eq!(stats.by_mastery[0], 1);
        assert_eq!(stats.by_mastery[1], 1);
        assert_eq!(stats.review_streak, 1);
        assert_eq!(stats.longest_streak, 1);
    }

    #[test]
    fn reviews_from_earlier_days_are_not_today() {
        let then = fixed_now();
        let mut c = card("a", then);
        Scheduler::new()
            .apply_review(&mut c, Rating::Easy, then)
            .unwrap();

        let later = then + Duration::days(3);
        let stats = SrsStats::collect(&[c], &StreakState::default(), later, utc());
        assert_eq!(stats.reviewed_today, 0);
        assert_eq!(stats.review_streak, 0);
    }

    #[test]
    fn empty_collection_is_all_zero() {
        let stats = SrsStats::collect(&[], &StreakState::default(), fixed_now(), utc());
        assert_eq!(stats, SrsStats::default());
    }
}
