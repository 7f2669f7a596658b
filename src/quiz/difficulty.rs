//! Difficulty classification from recent correctness

use crate::types::{DifficultyTier, PerformanceRecord};

/// Number of most recent attempts the classifier looks at
pub const RECENT_WINDOW: usize = 5;

/// Map the number of correct answers among recent attempts to a tier.
///
/// Below 2 is easy, 2 and 3 are medium, above 3 is hard. A learner with
/// no history has a count of 0 and gets easy.
pub fn classify(correct_count: usize) -> DifficultyTier {
    match correct_count {
        0 | 1 => DifficultyTier::Easy,
        2 | 3 => DifficultyTier::Medium,
        _ => DifficultyTier::Hard,
    }
}

/// Count correct attempts among the first `window` records.
///
/// Records must be ordered newest first.
pub fn count_correct(records: &[PerformanceRecord], window: usize) -> usize {
    records.iter().take(window).filter(|r| r.correct).count()
}
