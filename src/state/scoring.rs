//! Score keeping for completed bingo lines.

use serde::{Deserialize, Serialize};

use crate::state::lines::DiagonalRule;

/// Points awarded for every newly completed line.
pub const DEFAULT_POINTS_PER_LINE: u32 = 100;

/// Rules applied when turning completed lines into points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringRules {
    pub points_per_line: u32,
    /// Whether diagonals count as lines.
    pub diagonals: DiagonalRule,
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            points_per_line: DEFAULT_POINTS_PER_LINE,
            diagonals: DiagonalRule::default(),
        }
    }
}

impl ScoringRules {
    /// Score under the plain "count of lines" model; may go down when cells are unmarked.
    pub fn line_count_score(&self, completed: usize) -> u32 {
        saturating_count(completed).saturating_mul(self.points_per_line)
    }
}

/// Ratcheting score of a single player.
///
/// `bingo_count` is the highest number of simultaneously completed lines ever
/// observed. Points are only handed out when that watermark rises, so the score
/// never decreases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScoreCard {
    pub score: u32,
    pub bingo_count: u32,
}

impl ScoreCard {
    /// Card restored from persisted values.
    pub fn new(score: u32, bingo_count: u32) -> Self {
        Self { score, bingo_count }
    }

    /// Feed the freshly computed completed-line count, returning the points awarded.
    pub fn record(&mut self, completed: usize, rules: &ScoringRules) -> u32 {
        let completed = saturating_count(completed);
        if completed <= self.bingo_count {
            return 0;
        }
        let awarded = (completed - self.bingo_count).saturating_mul(rules.points_per_line);
        self.score = self.score.saturating_add(awarded);
        self.bingo_count = completed;
        awarded
    }
}

fn saturating_count(completed: usize) -> u32 {
    u32::try_from(completed).unwrap_or(u32::MAX)
}
