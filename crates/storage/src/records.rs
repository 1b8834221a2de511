use chrono::{DateTime, NaiveDate, Utc};
use reels_core::model::{
    Difficulty, QuestionId, Rating, ReviewCard, ReviewEntry, StreakState,
};
use serde::{Deserialize, Serialize};

use crate::repository::StorageError;

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Persisted shape of one history entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewEntryRecord {
    pub rating: Rating,
    pub reviewed_at: DateTime<Utc>,
}

/// Persisted shape for a review card.
///
/// This mirrors the domain `ReviewCard` so repositories can serialize and
/// deserialize without leaking storage concerns into the domain layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewCardRecord {
    pub question_id: String,
    pub channel: String,
    pub difficulty: Difficulty,
    pub mastery_level: u8,
    pub interval_days: u32,
    pub ease_factor: f64,
    pub due_at: DateTime<Utc>,
    pub last_reviewed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub review_history: Vec<ReviewEntryRecord>,
}

impl ReviewCardRecord {
    #[must_use]
    pub fn from_card(card: &ReviewCard) -> Self {
        Self {
            question_id: card.question_id().as_str().to_owned(),
            channel: card.channel().to_owned(),
            difficulty: card.difficulty(),
            mastery_level: card.mastery_level().value(),
            interval_days: card.interval_days(),
            ease_factor: card.ease_factor(),
            due_at: card.due_at(),
            last_reviewed_at: card.last_reviewed_at(),
            review_history: card
                .review_history()
                .iter()
                .map(|e| ReviewEntryRecord {
                    rating: e.rating,
                    reviewed_at: e.reviewed_at,
                })
                .collect(),
        }
    }

    /// Convert the record back into a domain `ReviewCard`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the record violates card invariants.
    pub fn into_card(self) -> Result<ReviewCard, StorageError> {
        let question_id = QuestionId::new(self.question_id).map_err(ser)?;
        let history = self
            .review_history
            .into_iter()
            .map(|e| ReviewEntry::new(e.rating, e.reviewed_at))
            .collect();

        ReviewCard::from_persisted(
            question_id,
            self.channel,
            self.difficulty,
            self.mastery_level,
            self.interval_days,
            self.ease_factor,
            self.due_at,
            self.last_reviewed_at,
            history,
        )
        .map_err(ser)
    }

    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the JSON is malformed.
    pub fn decode(raw: &str) -> Result<Self, StorageError> {
        serde_json::from_str(raw).map_err(ser)
    }

    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if encoding fails.
    pub fn encode(&self) -> Result<String, StorageError> {
        serde_json::to_string(self).map_err(ser)
    }
}

/// Persisted streak counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakRecord {
    pub last_streak_credit_date: Option<NaiveDate>,
    pub review_streak: u32,
    pub longest_streak: u32,
}

impl StreakRecord {
    #[must_use]
    pub fn from_streak(streak: &StreakState) -> Self {
        Self {
            last_streak_credit_date: streak.last_credit_date(),
            review_streak: streak.current(),
            longest_streak: streak.longest(),
        }
    }

    #[must_use]
    pub fn into_streak(self) -> StreakState {
        StreakState::from_persisted(
            self.last_streak_credit_date,
            self.review_streak,
            self.longest_streak,
        )
    }

    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the JSON is malformed.
    pub fn decode(raw: &str) -> Result<Self, StorageError> {
        serde_json::from_str(raw).map_err(ser)
    }

    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if encoding fails.
    pub fn encode(&self) -> Result<String, StorageError> {
        serde_json::to_string(self).map_err(ser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reels_core::scheduler::Scheduler;
    use reels_core::time::fixed_now;

    #[test]
    fn card_record_uses_camel_case_fields() {
        let card = Scheduler::new()
            .new_card(
                QuestionId::new("react-12").unwrap(),
                "react",
                Difficulty::Advanced,
                fixed_now(),
            )
            .unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&ReviewCardRecord::from_card(&card).encode().unwrap()).unwrap();

        assert_eq!(json["questionId"], "react-12");
        assert_eq!(json["difficulty"], "advanced");
        assert_eq!(json["masteryLevel"], 0);
        assert_eq!(json["intervalDays"], 0);
        assert_eq!(json["easeFactor"], 2.5);
        assert!(json["lastReviewedAt"].is_null());
        assert!(json.get("reviewHistory").is_none());
    }

    #[test]
    fn decodes_record_without_history() {
        let raw = r#"{
            "questionId": "q1",
            "channel": "sql",
            "difficulty": "beginner",
            "masteryLevel": 2,
            "intervalDays": 3,
            "easeFactor": 2.4,
            "dueAt": "2024-03-04T10:00:00Z",
            "lastReviewedAt": "2024-03-01T10:00:00Z"
        }"#;

        let card = ReviewCardRecord::decode(raw).unwrap().into_card().unwrap();
        assert_eq!(card.interval_days(), 3);
        assert_eq!(card.mastery_level().value(), 2);
        assert!(card.review_history().is_empty());
    }

    #[test]
    fn rejects_unknown_rating_in_history() {
        let raw = r#"{
            "questionId": "q1",
            "channel": "sql",
            "difficulty": "beginner",
            "masteryLevel": 0,
            "intervalDays": 0,
            "easeFactor": 2.5,
            "dueAt": "2024-03-04T10:00:00Z",
            "lastReviewedAt": null,
            "reviewHistory": [{"rating": "superb", "reviewedAt": "2024-03-01T10:00:00Z"}]
        }"#;

        assert!(matches!(
            ReviewCardRecord::decode(raw),
            Err(StorageError::Serialization(_))
        ));
    }

    #[test]
    fn record_violating_invariants_is_rejected() {
        let raw = r#"{
            "questionId": "q1",
            "channel": "sql",
            "difficulty": "beginner",
            "masteryLevel": 1,
            "intervalDays": 3,
            "easeFactor": -1.0,
            "dueAt": "2024-03-04T10:00:00Z",
            "lastReviewedAt": "2024-03-01T10:00:00Z"
        }"#;

        let err = ReviewCardRecord::decode(raw).unwrap().into_card().unwrap_err();
        assert!(matches!(err, StorageError::Serialization(_)));
    }

    #[test]
    fn record_with_out_of_range_interval_is_rejected() {
        let raw = r#"{
            "questionId": "q1",
            "channel": "sql",
            "difficulty": "beginner",
            "masteryLevel": 5,
            "intervalDays": 100000000,
            "easeFactor": 2.5,
            "dueAt": "2024-03-04T10:00:00Z",
            "lastReviewedAt": "2024-03-01T10:00:00Z"
        }"#;

        let err = ReviewCardRecord::decode(raw).unwrap().into_card().unwrap_err();
        assert!(matches!(err, StorageError::Serialization(_)));
    }

    #[test]
    fn streak_record_round_trips() {
        let mut streak = StreakState::default();
        streak.credit(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        streak.credit(NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());

        let raw = StreakRecord::from_streak(&streak).encode().unwrap();
        assert!(raw.contains("\"lastStreakCreditDate\":\"2024-03-02\""));
        assert!(raw.contains("\"reviewStreak\":2"));

        assert_eq!(StreakRecord::decode(&raw).unwrap().into_streak(), streak);
    }
}
