use serde::{Deserialize, Serialize};

pub mod action;
pub mod agent;
pub mod map;
pub mod search;
pub mod session;
pub mod tile;
pub mod world;

pub use action::{Action, Direction};
pub use agent::{ActionPlanner, Agent, Decision, Rule};
pub use tile::Tile;
pub use world::{Observation, ObservationError, WorldModel};

#[cfg(test)]
mod testing;

/// A cell coordinate on the level grid.
///
/// Ordering is row-major, so sorting positions matches sorting their
/// flattened indices.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl Position {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Flattened row-major index for a grid of the given width.
    #[inline]
    pub fn to_index(self, width: usize) -> usize {
        self.row * width + self.col
    }

    /// Inverse of [`Position::to_index`].
    #[inline]
    pub fn from_index(index: usize, width: usize) -> Self {
        Self {
            row: index / width,
            col: index % width,
        }
    }

    /// Shifts the position by a signed offset, or `None` when it would leave
    /// the non-negative quadrant. Upper bounds are the grid's concern.
    pub fn offset(self, d_row: isize, d_col: isize) -> Option<Position> {
        Some(Position {
            row: self.row.checked_add_signed(d_row)?,
            col: self.col.checked_add_signed(d_col)?,
        })
    }

    pub fn manhattan_distance(self, other: Position) -> usize {
        self.row.abs_diff(other.row) + self.col.abs_diff(other.col)
    }

    /// True for the four orthogonal neighbours only.
    pub fn is_adjacent(self, other: Position) -> bool {
        self.manhattan_distance(other) == 1
    }
}

/// Colour shared by a key and the doors it opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyColor {
    Red,
    Green,
    Blue,
}

impl KeyColor {
    pub const ALL: [KeyColor; 3] = [KeyColor::Red, KeyColor::Green, KeyColor::Blue];

    pub fn key_tile(self) -> Tile {
        match self {
            KeyColor::Red => Tile::KeyRed,
            KeyColor::Green => Tile::KeyGreen,
            KeyColor::Blue => Tile::KeyBlue,
        }
    }

    pub fn door_tile(self) -> Tile {
        match self {
            KeyColor::Red => Tile::DoorRed,
            KeyColor::Green => Tile::DoorGreen,
            KeyColor::Blue => Tile::DoorBlue,
        }
    }

    pub fn inventory(self) -> Inventory {
        match self {
            KeyColor::Red => Inventory::KeyRed,
            KeyColor::Green => Inventory::KeyGreen,
            KeyColor::Blue => Inventory::KeyBlue,
        }
    }
}

/// The agent's single carry slot, as reported by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Inventory {
    #[default]
    None,
    KeyRed,
    KeyGreen,
    KeyBlue,
    Boulder,
}

impl Inventory {
    /// Colour of the carried key, if the slot holds one.
    pub fn key_color(self) -> Option<KeyColor> {
        match self {
            Inventory::KeyRed => Some(KeyColor::Red),
            Inventory::KeyGreen => Some(KeyColor::Green),
            Inventory::KeyBlue => Some(KeyColor::Blue),
            Inventory::None | Inventory::Boulder => None,
        }
    }
}
