//! Grid geometry: cell positions and the four orthogonal directions.
//!
//! The world is a square grid of `grid_size * grid_size` cells with the
//! origin in the top-left corner. `up` decreases `y`, `down` increases it,
//! `left` decreases `x`, `right` increases it. Diagonal steps do not exist.

use core::fmt;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// A cell on the grid, `0 <= x, y < grid_size`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export, export_to = "bindings/")]
pub struct Position {
    /// Column, counted from the left edge.
    pub x: u32,
    /// Row, counted from the top edge.
    pub y: u32,
}

impl Position {
    /// Create a position from its coordinates.
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Whether this position lies inside a grid of the given size.
    pub const fn in_bounds(self, grid_size: u32) -> bool {
        self.x < grid_size && self.y < grid_size
    }

    /// The neighboring cell one step in `direction`, or `None` when that
    /// step would leave a grid of the given size.
    pub fn neighbor(self, direction: Direction, grid_size: u32) -> Option<Self> {
        let (x, y) = match direction {
            Direction::Up => (Some(self.x), self.y.checked_sub(1)),
            Direction::Down => (Some(self.x), self.y.checked_add(1)),
            Direction::Left => (self.x.checked_sub(1), Some(self.y)),
            Direction::Right => (self.x.checked_add(1), Some(self.y)),
        };
        let next = Self::new(x?, y?);
        next.in_bounds(grid_size).then_some(next)
    }

    /// Manhattan distance between two cells.
    pub const fn manhattan(self, other: Self) -> u32 {
        self.x
            .abs_diff(other.x)
            .saturating_add(self.y.abs_diff(other.y))
    }

    /// Whether two cells share an edge (Manhattan distance exactly 1).
    pub const fn is_adjacent(self, other: Self) -> bool {
        self.manhattan(other) == 1
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// One of the four orthogonal movement directions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum Direction {
    /// Toward row 0.
    Up,
    /// Away from row 0.
    Down,
    /// Toward column 0.
    Left,
    /// Away from column 0.
    Right,
}

impl Direction {
    /// All directions in the order legal moves are enumerated.
    pub const ALL: [Self; 4] = [Self::Up, Self::Down, Self::Left, Self::Right];

    /// The lowercase wire name (`up`, `down`, `left`, `right`).
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
        }
    }

    /// Parse an exact lowercase wire name. Anything else is rejected.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.as_str() == name)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
