//! Grid engine - terrain matrix and its decay/growth automaton.
//!
//! The terrain is a rectangular matrix of [`Cell`]s stored row-major
//! (`y * width + x`). START is the top-left cell and GOAL the bottom-right
//! cell; both are exempt from the automaton rule.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// An EMPTY cell with strictly more occupied neighbors than this may grow.
pub const GROWTH_MIN_EXCLUSIVE: u8 = 1;
/// An EMPTY cell with strictly fewer occupied neighbors than this may grow.
pub const GROWTH_MAX_EXCLUSIVE: u8 = 5;
/// An OCCUPIED cell survives with at least this many occupied neighbors.
pub const SURVIVAL_MIN: u8 = 4;
/// An OCCUPIED cell survives with at most this many occupied neighbors.
pub const SURVIVAL_MAX: u8 = 5;

/// Fingerprint value for cells outside the grid.
pub const OUT_OF_BOUNDS: i8 = -1;

/// State of a single terrain cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Cell {
    #[default]
    Empty = 0,
    Occupied = 1,
}

impl Cell {
    /// Apply the automaton rule given the number of occupied neighbors.
    #[inline]
    pub fn next(self, occupied_neighbors: u8) -> Cell {
        match self {
            Cell::Empty
                if occupied_neighbors > GROWTH_MIN_EXCLUSIVE
                    && occupied_neighbors < GROWTH_MAX_EXCLUSIVE =>
            {
                Cell::Occupied
            }
            Cell::Occupied
                if !(SURVIVAL_MIN..=SURVIVAL_MAX).contains(&occupied_neighbors) =>
            {
                Cell::Empty
            }
            unchanged => unchanged,
        }
    }

    /// Numeric value as used in terrain files and fingerprints.
    #[inline]
    pub fn value(self) -> i8 {
        self as i8
    }
}

/// Integer grid coordinate. Origin is START (top-left).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    /// Manhattan distance to another position.
    #[inline]
    pub fn manhattan(self, other: Position) -> usize {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// Euclidean distance to another position.
    #[inline]
    pub fn euclidean(self, other: Position) -> f32 {
        let dx = self.x.abs_diff(other.x) as f32;
        let dy = self.y.abs_diff(other.y) as f32;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Local neighborhood snapshot used as a preference lookup key.
///
/// Cells are listed row by row across the square window, with
/// [`OUT_OF_BOUNDS`] standing in for cells outside the grid.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(Vec<i8>);

impl Fingerprint {
    pub fn from_cells(cells: Vec<i8>) -> Self {
        Self(cells)
    }

    pub fn cells(&self) -> &[i8] {
        &self.0
    }
}

/// Terrain parse errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MalformedGridError {
    #[error("Terrain contains no cells")]
    Empty,
    #[error("Row {row} is blank")]
    BlankRow { row: usize },
    #[error("Row {row} has {found} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("Row {row}, column {column}: cell value {value} is not 0 or 1")]
    InvalidValue { row: usize, column: usize, value: i64 },
    #[error("Row {row}, column {column}: '{token}' is not an integer")]
    InvalidToken {
        row: usize,
        column: usize,
        token: String,
    },
}

/// Errors loading terrain from disk.
#[derive(Debug, thiserror::Error)]
pub enum TerrainError {
    #[error("Failed to read terrain: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed terrain: {0}")]
    Malformed(#[from] MalformedGridError),
}

/// Rectangular terrain matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl Grid {
    /// Create an all-empty grid.
    pub fn new(width: usize, height: usize) -> Self {
        assert!(width > 0 && height > 0, "grid dimensions must be non-zero");
        Self {
            width,
            height,
            cells: vec![Cell::Empty; width * height],
        }
    }

    /// Parse a whitespace-delimited 0/1 matrix, one row per line.
    ///
    /// Trailing blank lines are ignored; any other inconsistency fails.
    pub fn parse(source: &str) -> Result<Self, MalformedGridError> {
        let mut width = None;
        let mut height = 0;
        let mut cells = Vec::new();

        for (row, line) in source.trim_end().lines().enumerate() {
            let start = cells.len();
            for (column, token) in line.split_whitespace().enumerate() {
                let value: i64 = token.parse().map_err(|_| MalformedGridError::InvalidToken {
                    row,
                    column,
                    token: token.to_string(),
                })?;
                let cell = match value {
                    0 => Cell::Empty,
                    1 => Cell::Occupied,
                    _ => return Err(MalformedGridError::InvalidValue { row, column, value }),
                };
                cells.push(cell);
            }

            let found = cells.len() - start;
            if found == 0 {
                return Err(MalformedGridError::BlankRow { row });
            }
            let expected = *width.get_or_insert(found);
            if found != expected {
                return Err(MalformedGridError::RaggedRow {
                    row,
                    expected,
                    found,
                });
            }
            height += 1;
        }

        match width {
            Some(width) if height > 0 => Ok(Self {
                width,
                height,
                cells,
            }),
            _ => Err(MalformedGridError::Empty),
        }
    }

    /// Read and parse a terrain file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, TerrainError> {
        let source = fs::read_to_string(path)?;
        Ok(Self::parse(&source)?)
    }

    /// Grid width (columns).
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Grid height (rows).
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Top-left cell.
    #[inline]
    pub fn start(&self) -> Position {
        Position::new(0, 0)
    }

    /// Bottom-right cell.
    #[inline]
    pub fn goal(&self) -> Position {
        Position::new(self.width - 1, self.height - 1)
    }

    /// Whether a position is START or GOAL.
    #[inline]
    pub fn is_anchor(&self, pos: Position) -> bool {
        pos == self.start() || pos == self.goal()
    }

    /// Raw cell storage, row-major.
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    #[inline]
    fn idx(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    /// Cell at an in-bounds position.
    #[inline]
    pub fn get(&self, pos: Position) -> Cell {
        self.cells[self.idx(pos.x, pos.y)]
    }

    /// Overwrite a cell. Panics when out of bounds.
    pub fn set(&mut self, pos: Position, cell: Cell) {
        let idx = self.idx(pos.x, pos.y);
        self.cells[idx] = cell;
    }

    /// Resolve a signed coordinate to a position inside the grid.
    #[inline]
    pub fn position(&self, x: isize, y: isize) -> Option<Position> {
        if x < 0 || y < 0 {
            return None;
        }
        let (x, y) = (x as usize, y as usize);
        (x < self.width && y < self.height).then_some(Position::new(x, y))
    }

    /// Translate a position by a displacement, `None` if it leaves the grid.
    #[inline]
    pub fn offset(&self, pos: Position, (dx, dy): (isize, isize)) -> Option<Position> {
        self.position(pos.x as isize + dx, pos.y as isize + dy)
    }

    /// In bounds and not occupied.
    #[inline]
    pub fn is_safe(&self, pos: Option<Position>) -> bool {
        pos.is_some_and(|p| self.get(p) == Cell::Empty)
    }

    /// Count occupied cells among the 8 neighbors, clipped at the edges.
    pub fn occupied_neighbors(&self, x: usize, y: usize) -> u8 {
        let mut count = 0;
        for ny in y.saturating_sub(1)..=(y + 1).min(self.height - 1) {
            for nx in x.saturating_sub(1)..=(x + 1).min(self.width - 1) {
                if (nx, ny) != (x, y) && self.cells[self.idx(nx, ny)] == Cell::Occupied {
                    count += 1;
                }
            }
        }
        count
    }

    /// Number of occupied cells.
    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|&&c| c == Cell::Occupied).count()
    }

    /// Advance the automaton by one step, returning a new grid.
    ///
    /// Every cell is computed from the frozen current state; START and GOAL
    /// are copied unchanged.
    pub fn step(&self) -> Grid {
        let mut next = self.clone();
        let width = self.width;

        next.cells
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, cell) in row.iter_mut().enumerate() {
                    if self.is_anchor(Position::new(x, y)) {
                        continue;
                    }
                    *cell = self.cells[y * width + x].next(self.occupied_neighbors(x, y));
                }
            });

        next
    }

    /// Read the square window of side `2 * radius + 1` centered on `pos`.
    pub fn fingerprint(&self, pos: Position, radius: usize) -> Fingerprint {
        let r = radius as isize;
        let side = 2 * radius + 1;
        let mut cells = Vec::with_capacity(side * side);

        for dy in -r..=r {
            for dx in -r..=r {
                let value = self
                    .offset(pos, (dx, dy))
                    .map_or(OUT_OF_BOUNDS, |p| self.get(p).value());
                cells.push(value);
            }
        }

        Fingerprint(cells)
    }
}

impl FromStr for Grid {
    type Err = MalformedGridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.cells.chunks(self.width) {
            let line: Vec<&str> = row
                .iter()
                .map(|c| match c {
                    Cell::Empty => "0",
                    Cell::Occupied => "1",
                })
                .collect();
            writeln!(f, "{}", line.join(" "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic() {
        let grid = Grid::parse("0 1 0\n0 0 1\n").unwrap();
        assert_eq!(grid.width(), 3);
        assert_eq!(grid.height(), 2);
        assert_eq!(grid.get(Position::new(1, 0)), Cell::Occupied);
        assert_eq!(grid.goal(), Position::new(2, 1));
    }

    #[test]
    fn test_parse_ragged() {
        let err = Grid::parse("0 0 0\n0 0\n").unwrap_err();
        assert_eq!(
            err,
            MalformedGridError::RaggedRow {
                row: 1,
                expected: 3,
                found: 2
            }
        );
    }

    #[test]
    fn test_parse_invalid_value() {
        let err = Grid::parse("0 2\n0 0").unwrap_err();
        assert!(matches!(
            err,
            MalformedGridError::InvalidValue { value: 2, .. }
        ));
    }

    #[test]
    fn test_parse_invalid_token() {
        assert!(matches!(
            Grid::parse("0 x\n0 0"),
            Err(MalformedGridError::InvalidToken { .. })
        ));
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(Grid::parse("   \n\n"), Err(MalformedGridError::Empty));
    }

    #[test]
    fn test_parse_interior_blank_line() {
        assert_eq!(
            Grid::parse("0 0\n\n0 0"),
            Err(MalformedGridError::BlankRow { row: 1 })
        );
    }

    #[test]
    fn test_parse_leading_blank_line() {
        let err = Grid::parse("\n0 0\n0 0").unwrap_err();
        assert_eq!(err, MalformedGridError::BlankRow { row: 0 });
        assert_eq!(err.to_string(), "Row 0 is blank");
    }

    #[test]
    fn test_display_roundtrip() {
        let source = "0 1 0\n1 0 1\n";
        let grid = Grid::parse(source).unwrap();
        assert_eq!(grid.to_string(), source);
    }

    #[test]
    fn test_rule_thresholds() {
        // Growth window is (1, 5) exclusive.
        assert_eq!(Cell::Empty.next(1), Cell::Empty);
        assert_eq!(Cell::Empty.next(2), Cell::Occupied);
        assert_eq!(Cell::Empty.next(4), Cell::Occupied);
        assert_eq!(Cell::Empty.next(5), Cell::Empty);
        // Survival window is [4, 5].
        assert_eq!(Cell::Occupied.next(3), Cell::Empty);
        assert_eq!(Cell::Occupied.next(4), Cell::Occupied);
        assert_eq!(Cell::Occupied.next(5), Cell::Occupied);
        assert_eq!(Cell::Occupied.next(6), Cell::Empty);
    }

    #[test]
    fn test_neighbors_clipped_at_corner() {
        let grid = Grid::parse("0 1\n1 1").unwrap();
        assert_eq!(grid.occupied_neighbors(0, 0), 3);
        assert_eq!(grid.occupied_neighbors(1, 1), 2);
    }

    #[test]
    fn test_step_grows_and_decays() {
        // Center-row pair: the cells between them see two neighbors and grow,
        // while each occupied cell has a single neighbor and decays.
        let grid = Grid::parse("0 0 0 0\n0 1 1 0\n0 0 0 0\n0 0 0 0").unwrap();
        let next = grid.step();
        assert_eq!(next.get(Position::new(1, 1)), Cell::Empty);
        assert_eq!(next.get(Position::new(2, 1)), Cell::Empty);
        assert_eq!(next.get(Position::new(1, 0)), Cell::Occupied);
        assert_eq!(next.get(Position::new(2, 2)), Cell::Occupied);
    }

    #[test]
    fn test_step_keeps_anchors() {
        let grid = Grid::parse("0 1 1\n1 1 1\n1 1 1").unwrap();
        let next = grid.step();
        assert_eq!(next.get(grid.start()), Cell::Empty);
        assert_eq!(next.get(grid.goal()), Cell::Occupied);
        assert_eq!(next.width(), 3);
        assert_eq!(next.height(), 3);
    }

    #[test]
    fn test_step_does_not_mutate_source() {
        let grid = Grid::parse("0 0 0\n0 1 1\n0 0 0").unwrap();
        let before = grid.clone();
        let _ = grid.step();
        assert_eq!(grid, before);
    }

    #[test]
    fn test_occupied_count() {
        let grid = Grid::parse("0 1 1\n1 0 0").unwrap();
        assert_eq!(grid.occupied_count(), 3);
        assert_eq!(Grid::new(4, 2).occupied_count(), 0);
    }

    #[test]
    fn test_empty_grid_is_stable() {
        let grid = Grid::new(5, 5);
        assert_eq!(grid.step(), grid);
    }

    #[test]
    fn test_fingerprint_window() {
        let grid = Grid::parse("1 0\n0 0").unwrap();
        let fp = grid.fingerprint(Position::new(0, 0), 1);
        assert_eq!(fp.cells(), &[-1, -1, -1, -1, 1, 0, -1, 0, 0]);
        assert_eq!(grid.fingerprint(Position::new(1, 1), 2).cells().len(), 25);
    }

    #[test]
    fn test_offset_and_safety() {
        let grid = Grid::parse("0 1\n0 0").unwrap();
        let start = grid.start();
        assert_eq!(grid.offset(start, (0, -1)), None);
        assert!(!grid.is_safe(grid.offset(start, (1, 0))));
        assert!(grid.is_safe(grid.offset(start, (0, 1))));
    }

    #[test]
    fn test_distances() {
        let a = Position::new(0, 0);
        let b = Position::new(3, 4);
        assert_eq!(a.manhattan(b), 7);
        assert!((a.euclidean(b) - 5.0).abs() < 1e-6);
    }
}
