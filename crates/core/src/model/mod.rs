mod card;
mod ids;
mod mastery;
mod review;
mod session;
mod stats;
mod streak;

pub use ids::{ParseIdError, QuestionId};

pub use card::{CardError, Difficulty, InvalidDifficultyError, ReviewCard};
pub use mastery::{MasteryColor, MasteryLevel, MasteryLevelError, mastery_color, mastery_label};
pub use review::{InvalidRatingError, Rating, ReviewEntry};
pub use session::{SessionCounts, SessionSummary, SessionSummaryError};
pub use stats::SrsStats;
pub use streak::StreakState;
