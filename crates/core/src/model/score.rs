use serde::{Deserialize, Serialize};

/// Rounded percentage of `part` over `whole`, half rounding up. Zero when `whole` is zero.
#[must_use]
pub fn rounded_percentage(part: u32, whole: u32) -> u32 {
    if whole == 0 {
        return 0;
    }
    let part = u64::from(part);
    let whole = u64::from(whole);
    let rounded = (part * 200 + whole) / (whole * 2);
    u32::try_from(rounded).unwrap_or(u32::MAX)
}

/// Derived score view; never stored on its own.
///
/// `correct + wrong + skipped` counts what has been graded so far, which can be
/// less than `total` when a session ends before every question was visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub correct: u32,
    pub wrong: u32,
    pub skipped: u32,
    pub total: u32,
    pub percentage: u32,
}

impl ScoreSummary {
    #[must_use]
    pub fn from_counts(correct: u32, wrong: u32, skipped: u32, total: u32) -> Self {
        Self {
            correct,
            wrong,
            skipped,
            total,
            percentage: rounded_percentage(correct, total),
        }
    }

    #[must_use]
    pub fn graded(&self) -> u32 {
        self.correct
            .saturating_add(self.wrong)
            .saturating_add(self.skipped)
    }
}
