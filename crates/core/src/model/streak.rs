use chrono::NaiveDate;

/// Consecutive-day review streak, credited at most once per local calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreakState {
    last_credit_date: Option<NaiveDate>,
    current: u32,
    longest: u32,
}

impl StreakState {
    #[must_use]
    pub fn from_persisted(last_credit_date: Option<NaiveDate>, current: u32, longest: u32) -> Self {
        Self {
            last_credit_date,
            current,
            longest: longest.max(current),
        }
    }

    /// Credit a completed review on `today`.
    ///
    /// Returns `true` if the stored state changed.
    pub fn credit(&mut self, today: NaiveDate) -> bool {
        match self.last_credit_date {
            Some(last) if last >= today => return false,
            Some(last) if last.succ_opt() == Some(today) => {
                self.current = self.current.saturating_add(1);
            }
            _ => self.current = 1,
        }
        self.last_credit_date = Some(today);
        self.longest = self.longest.max(self.current);
        true
    }

    /// Streak as it should be displayed on `today`: a streak whose last credit is
    /// older than yesterday is already broken and reads as zero.
    #[must_use]
    pub fn current_as_of(&self, today: NaiveDate) -> u32 {
        match self.last_credit_date {
            Some(last) if last == today || last.succ_opt() == Some(today) => self.current,
            _ => 0,
        }
    }

    #[must_use]
    pub fn last_credit_date(&self) -> Option<NaiveDate> {
        self.last_credit_date
    }

    /// Raw persisted streak counter.
    #[must_use]
    pub fn current(&self) -> u32 {
        self.current
    }

    #[must_use]
    pub fn longest(&self) -> u32 {
        self.longest
    }
}
