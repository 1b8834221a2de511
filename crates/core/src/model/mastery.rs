use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("mastery level {provided} exceeds maximum tier {max}", max = MasteryLevel::MAX)]
pub struct MasteryLevelError {
    pub provided: u8,
}

/// Coarse familiarity tier of a learner with one question.
///
/// Tier 0 is a brand-new card; tier [`MasteryLevel::MAX`] is mastered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct MasteryLevel(u8);

impl MasteryLevel {
    pub const MAX: u8 = 5;
    pub const NEW: MasteryLevel = MasteryLevel(0);
    pub const MASTERED: MasteryLevel = MasteryLevel(Self::MAX);

    /// # Errors
    ///
    /// Returns `MasteryLevelError` if `level` is above [`MasteryLevel::MAX`].
    pub fn new(level: u8) -> Result<Self, MasteryLevelError> {
        if level > Self::MAX {
            return Err(MasteryLevelError { provided: level });
        }
        Ok(Self(level))
    }

    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }

    /// Next tier up, saturating at mastered.
    #[must_use]
    pub fn promoted(self) -> Self {
        Self(self.0.saturating_add(1).min(Self::MAX))
    }

    #[must_use]
    pub fn is_mastered(self) -> bool {
        self.0 == Self::MAX
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        mastery_label(self.0)
    }

    #[must_use]
    pub fn color(self) -> MasteryColor {
        mastery_color(self.0)
    }
}

impl TryFrom<u8> for MasteryLevel {
    type Error = MasteryLevelError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MasteryLevel> for u8 {
    fn from(value: MasteryLevel) -> Self {
        value.0
    }
}

impl fmt::Display for MasteryLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Display color category for a mastery tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MasteryColor {
    Slate,
    Red,
    Orange,
    Yellow,
    Lime,
    Green,
    Unknown,
}

impl MasteryColor {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MasteryColor::Slate => "slate",
            MasteryColor::Red => "red",
            MasteryColor::Orange => "orange",
            MasteryColor::Yellow => "yellow",
            MasteryColor::Lime => "lime",
            MasteryColor::Green => "green",
            MasteryColor::Unknown => "neutral",
        }
    }
}

/// Label shown for a raw tier value. Out-of-range tiers read as `"Unknown"`.
#[must_use]
pub fn mastery_label(level: u8) -> &'static str {
    match level {
        0 => "New",
        1 => "Learning",
        2 => "Familiar",
        3 => "Proficient",
        4 => "Advanced",
        5 => "Mastered",
        _ => "Unknown",
    }
}

/// Color category for a raw tier value. Out-of-range tiers map to `Unknown`.
#[must_use]
pub fn mastery_color(level: u8) -> MasteryColor {
    match level {
        0 => MasteryColor::Slate,
        1 => MasteryColor::Red,
        2 => MasteryColor::Orange,
        3 => MasteryColor::Yellow,
        4 => MasteryColor::Lime,
        5 => MasteryColor::Green,
        _ => MasteryColor::Unknown,
    }
}
