use serde::{Deserialize, Serialize};

use crate::Position;

/// One of the four orthogonal directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    /// `(d_row, d_col)` of a single step.
    pub const fn delta(self) -> (isize, isize) {
        match self {
            Direction::North => (-1, 0),
            Direction::East => (0, 1),
            Direction::South => (1, 0),
            Direction::West => (0, -1),
        }
    }

    /// Direction of a single orthogonal step from `from` to `to`.
    ///
    /// Returns `None` unless the two squares are adjacent.
    pub fn between(from: Position, to: Position) -> Option<Direction> {
        let d_row = to.row as isize - from.row as isize;
        let d_col = to.col as isize - from.col as isize;
        match (d_row, d_col) {
            (-1, 0) => Some(Direction::North),
            (0, 1) => Some(Direction::East),
            (1, 0) => Some(Direction::South),
            (0, -1) => Some(Direction::West),
            _ => None,
        }
    }

    pub fn apply(self, pos: Position) -> Option<Position> {
        let (d_row, d_col) = self.delta();
        pos.offset(d_row, d_col)
    }
}

/// The single action sent to the session each turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Action {
    #[default]
    None,
    MoveNorth,
    MoveEast,
    MoveSouth,
    MoveWest,
    UseNorth,
    UseEast,
    UseSouth,
    UseWest,
}

impl Action {
    pub const fn moving(direction: Direction) -> Self {
        match direction {
            Direction::North => Action::MoveNorth,
            Direction::East => Action::MoveEast,
            Direction::South => Action::MoveSouth,
            Direction::West => Action::MoveWest,
        }
    }

    pub const fn using(direction: Direction) -> Self {
        match direction {
            Direction::North => Action::UseNorth,
            Direction::East => Action::UseEast,
            Direction::South => Action::UseSouth,
            Direction::West => Action::UseWest,
        }
    }

    /// Move toward an adjacent square.
    pub fn move_to(from: Position, to: Position) -> Option<Self> {
        Direction::between(from, to).map(Action::moving)
    }

    /// Interact with an adjacent square without moving.
    pub fn use_on(from: Position, to: Position) -> Option<Self> {
        Direction::between(from, to).map(Action::using)
    }

    pub fn direction(self) -> Option<Direction> {
        match self {
            Action::None => None,
            Action::MoveNorth | Action::UseNorth => Some(Direction::North),
            Action::MoveEast | Action::UseEast => Some(Direction::East),
            Action::MoveSouth | Action::UseSouth => Some(Direction::South),
            Action::MoveWest | Action::UseWest => Some(Direction::West),
        }
    }

    pub fn is_move(self) -> bool {
        matches!(
            self,
            Action::MoveNorth | Action::MoveEast | Action::MoveSouth | Action::MoveWest
        )
    }

    pub fn is_use(self) -> bool {
        matches!(
            self,
            Action::UseNorth | Action::UseEast | Action::UseSouth | Action::UseWest
        )
    }
}
