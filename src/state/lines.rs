//! Bingo line detection over a [`Grid`].
//!
//! A line is a full row, a full column or, depending on the [`DiagonalRule`],
//! one of the two main diagonals. It is completed when every cell in it holds
//! a song and is marked.

use serde::{Deserialize, Serialize};

use crate::state::grid::Grid;

/// Which grid sizes count diagonals as bingo lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagonalRule {
    /// Diagonals only count on 4×4 grids.
    #[default]
    FourByFourOnly,
    /// Diagonals count on every grid size.
    AllSizes,
    /// Only rows and columns count.
    Never,
}

impl DiagonalRule {
    /// Whether diagonals count on a grid of side `size`.
    pub fn applies_to(self, size: usize) -> bool {
        match self {
            DiagonalRule::FourByFourOnly => size == 4,
            DiagonalRule::AllSizes => true,
            DiagonalRule::Never => false,
        }
    }
}

/// A candidate bingo line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "index", rename_all = "snake_case")]
pub enum Line {
    /// Zero-based row.
    Row(usize),
    /// Zero-based column.
    Column(usize),
    /// Top-left to bottom-right.
    Diagonal,
    /// Top-right to bottom-left.
    AntiDiagonal,
}

impl Line {
    /// Row-major cell indices covered by this line on a `size`×`size` grid.
    pub fn indices(self, size: usize) -> Vec<usize> {
        match self {
            Line::Row(row) => (0..size).map(|col| row * size + col).collect(),
            Line::Column(col) => (0..size).map(|row| row * size + col).collect(),
            Line::Diagonal => (0..size).map(|i| i * size + i).collect(),
            Line::AntiDiagonal => (0..size).map(|i| i * size + (size - 1 - i)).collect(),
        }
    }
}

/// Every line that can score on a grid of the given size.
pub fn candidate_lines(size: usize, rule: DiagonalRule) -> Vec<Line> {
    let mut lines = Vec::with_capacity(2 * size + 2);
    lines.extend((0..size).map(Line::Row));
    lines.extend((0..size).map(Line::Column));
    if rule.applies_to(size) {
        lines.push(Line::Diagonal);
        lines.push(Line::AntiDiagonal);
    }
    lines
}

/// Lines whose cells are all assigned and marked, in row, column, diagonal order.
pub fn completed_lines(grid: &Grid, rule: DiagonalRule) -> Vec<Line> {
    candidate_lines(grid.size(), rule)
        .into_iter()
        .filter(|line| is_completed(grid, *line))
        .collect()
}

/// Number of completed lines, without collecting them.
pub fn count_completed(grid: &Grid, rule: DiagonalRule) -> usize {
    candidate_lines(grid.size(), rule)
        .into_iter()
        .filter(|line| is_completed(grid, *line))
        .count()
}

/// Lines complete in `after` that were not complete in `before`.
pub fn newly_completed(before: &Grid, after: &Grid, rule: DiagonalRule) -> Vec<Line> {
    let previous = completed_lines(before, rule);
    completed_lines(after, rule)
        .into_iter()
        .filter(|line| !previous.contains(line))
        .collect()
}

fn is_completed(grid: &Grid, line: Line) -> bool {
    line.indices(grid.size())
        .into_iter()
        .all(|index| grid.cell(index).is_some_and(|cell| cell.is_complete()))
}
