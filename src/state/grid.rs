use std::{collections::HashSet, fmt};

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Identifier of a song as handed out by the search provider.
///
/// Providers use either numeric or textual ids; both are kept as their
/// decimal/textual representation so comparisons are exact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SongId(String);

impl SongId {
    /// Wrap a textual provider id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as sent on the wire.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SongId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SongId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<u64> for SongId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for SongId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawSongId {
            Text(String),
            Unsigned(u64),
            Signed(i64),
        }

        Ok(match RawSongId::deserialize(deserializer)? {
            RawSongId::Text(text) => Self(text),
            RawSongId::Unsigned(number) => Self(number.to_string()),
            RawSongId::Signed(number) => Self(number.to_string()),
        })
    }
}

/// Song picked into a grid cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Song {
    pub id: SongId,
    /// Track title as shown on the card.
    pub title: String,
    /// Performing artist.
    pub artist: String,
    /// Cover art URL.
    pub cover: String,
    /// Short audio preview URL; upstream links expire and get refreshed out of band.
    pub preview: Option<String>,
}

/// One square of a bingo grid.
///
/// The id is tied to the position and never changes; the song and mark travel
/// with swaps. A cell without a song is never marked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    id: String,
    song: Option<Song>,
    marked: bool,
}

impl Cell {
    fn empty(index: usize) -> Self {
        Self {
            id: cell_id(index),
            song: None,
            marked: false,
        }
    }

    /// Stable id of the position, `cell-<index>`.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Song assigned to the cell, if any.
    pub fn song(&self) -> Option<&Song> {
        self.song.as_ref()
    }

    /// Whether the song in this cell has been called.
    pub fn is_marked(&self) -> bool {
        self.marked
    }

    /// True when the cell holds a song that has been called.
    pub fn is_complete(&self) -> bool {
        self.song.is_some() && self.marked
    }

    fn holds(&self, song_id: &SongId) -> bool {
        self.song.as_ref().is_some_and(|song| &song.id == song_id)
    }
}

/// Errors raised by grid construction and mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    /// A grid needs at least one cell per side.
    #[error("grid size must be at least 1")]
    ZeroSize,
    /// Persisted cells do not fill the grid exactly.
    #[error("grid of size {size} needs {expected} cells, got {actual}")]
    CellCount {
        size: usize,
        expected: usize,
        actual: usize,
    },
    /// A persisted cell claims a mark without a song.
    #[error("cell `{0}` is marked without a song")]
    MarkedWithoutSong(String),
    /// Two persisted cells share an id.
    #[error("cell id `{0}` appears more than once")]
    DuplicateCellId(String),
    /// No cell carries the requested id.
    #[error("cell `{0}` not found")]
    CellNotFound(String),
    /// A swap index past the end of the grid.
    #[error("cell index {index} is outside a grid of {len} cells")]
    IndexOutOfRange { index: usize, len: usize },
    /// Assigning into a cell that must be cleared first.
    #[error("cell `{0}` already holds a song")]
    CellOccupied(String),
}

/// Square bingo grid stored in row-major order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    size: usize,
    cells: Vec<Cell>,
}

impl Grid {
    /// Build an empty `size`×`size` grid with ids `cell-0 .. cell-(n-1)`.
    pub fn new(size: usize) -> Result<Self, GridError> {
        if size == 0 {
            return Err(GridError::ZeroSize);
        }
        Ok(Self {
            size,
            cells: (0..size * size).map(Cell::empty).collect(),
        })
    }

    /// Rebuild a grid from persisted parts, checking every grid invariant.
    pub fn from_parts(
        size: usize,
        parts: impl IntoIterator<Item = (String, Option<Song>, bool)>,
    ) -> Result<Self, GridError> {
        if size == 0 {
            return Err(GridError::ZeroSize);
        }

        let mut seen = HashSet::new();
        let cells = parts
            .into_iter()
            .map(|(id, song, marked)| {
                if marked && song.is_none() {
                    return Err(GridError::MarkedWithoutSong(id));
                }
                if !seen.insert(id.clone()) {
                    return Err(GridError::DuplicateCellId(id));
                }
                Ok(Cell { id, song, marked })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let expected = size * size;
        if cells.len() != expected {
            return Err(GridError::CellCount {
                size,
                expected,
                actual: cells.len(),
            });
        }

        Ok(Self { size, cells })
    }

    /// Side length of the grid.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of cells, `size * size`.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Never true for a grid built through [`Grid::new`] or [`Grid::from_parts`].
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cells in row-major order.
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Cell at a row-major index.
    pub fn cell(&self, index: usize) -> Option<&Cell> {
        self.cells.get(index)
    }

    /// Cell at `(row, col)`; `None` outside the grid.
    pub fn cell_at(&self, row: usize, col: usize) -> Option<&Cell> {
        if row >= self.size || col >= self.size {
            return None;
        }
        self.cells.get(row * self.size + col)
    }

    /// Row-major index of the cell with `cell_id`.
    pub fn index_of(&self, cell_id: &str) -> Option<usize> {
        self.cells.iter().position(|cell| cell.id == cell_id)
    }

    /// Whether any cell holds `song_id`, marked or not.
    pub fn contains_song(&self, song_id: &SongId) -> bool {
        self.cells.iter().any(|cell| cell.holds(song_id))
    }

    /// Whether a marked cell holds `song_id`.
    pub fn holds_marked(&self, song_id: &SongId) -> bool {
        self.cells
            .iter()
            .any(|cell| cell.marked && cell.holds(song_id))
    }

    /// Exchange the contents of two cells, keeping each position's id.
    ///
    /// Returns `Ok(false)` when both indices are the same.
    pub fn swap(&mut self, a: usize, b: usize) -> Result<bool, GridError> {
        let len = self.cells.len();
        for index in [a, b] {
            if index >= len {
                return Err(GridError::IndexOutOfRange { index, len });
            }
        }
        if a == b {
            return Ok(false);
        }

        let (low, high) = if a < b { (a, b) } else { (b, a) };
        let (head, tail) = self.cells.split_at_mut(high);
        let first = &mut head[low];
        let second = &mut tail[0];
        std::mem::swap(&mut first.song, &mut second.song);
        std::mem::swap(&mut first.marked, &mut second.marked);
        Ok(true)
    }

    /// Put a song into an empty cell. The cell starts unmarked.
    pub fn assign(&mut self, cell_id: &str, song: Song) -> Result<(), GridError> {
        let cell = self.cell_mut(cell_id)?;
        if cell.song.is_some() {
            return Err(GridError::CellOccupied(cell_id.to_owned()));
        }
        cell.song = Some(song);
        cell.marked = false;
        Ok(())
    }

    /// Empty a cell. Returns whether anything changed.
    pub fn clear(&mut self, cell_id: &str) -> Result<bool, GridError> {
        let cell = self.cell_mut(cell_id)?;
        let changed = cell.song.is_some() || cell.marked;
        cell.song = None;
        cell.marked = false;
        Ok(changed)
    }

    /// Set the mark of every cell holding `song_id`. Returns whether any cell changed.
    pub fn set_song_marked(&mut self, song_id: &SongId, marked: bool) -> bool {
        let mut changed = false;
        for cell in self.cells.iter_mut().filter(|cell| cell.holds(song_id)) {
            if cell.marked != marked {
                cell.marked = marked;
                changed = true;
            }
        }
        changed
    }

    fn cell_mut(&mut self, cell_id: &str) -> Result<&mut Cell, GridError> {
        self.cells
            .iter_mut()
            .find(|cell| cell.id == cell_id)
            .ok_or_else(|| GridError::CellNotFound(cell_id.to_owned()))
    }
}

fn cell_id(index: usize) -> String {
    format!("cell-{index}")
}
