use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

use crate::Position;

/// Orthogonal offsets in north, south, west, east order.
pub const ORTHOGONAL: [(isize, isize); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// All eight surrounding offsets, row by row.
pub const SURROUNDING: [(isize, isize); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// Represents errors that can occur within the grid operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("Position ({row}, {col}) is out of bounds for grid size {height}x{width}")]
    OutOfBounds {
        row: usize,
        col: usize,
        width: usize,
        height: usize,
    },
    #[error("Expected {expected} cells for the grid, got {actual}")]
    CellCount { expected: usize, actual: usize },
}

/// A fixed-size 2D grid stored row-major in a flat vector.
///
/// All access goes through [`Position`]; the flattened index never leaves
/// this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid<T> {
    width: usize,
    height: usize,
    cells: Vec<T>,
}

impl<T> Grid<T> {
    /// Creates a new grid with the specified dimensions, filled with `value`.
    ///
    /// # Panics
    ///
    /// Panics if `width * height` overflows `usize`.
    pub fn filled(width: usize, height: usize, value: T) -> Self
    where
        T: Clone,
    {
        let size = width.checked_mul(height).expect("Grid size overflow");
        Grid {
            width,
            height,
            cells: vec![value; size],
        }
    }

    /// Creates a new grid with the specified dimensions, filled with default values.
    pub fn new(width: usize, height: usize) -> Self
    where
        T: Default + Clone,
    {
        Self::filled(width, height, T::default())
    }

    /// Builds a grid from cells already laid out in row-major order.
    pub fn from_cells(width: usize, height: usize, cells: Vec<T>) -> Result<Self, GridError> {
        let expected = width.saturating_mul(height);
        if cells.len() != expected {
            return Err(GridError::CellCount {
                expected,
                actual: cells.len(),
            });
        }
        Ok(Grid {
            width,
            height,
            cells,
        })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Checks if the given position lies within the grid boundaries.
    #[inline]
    pub fn contains(&self, pos: Position) -> bool {
        pos.row < self.height && pos.col < self.width
    }

    #[inline]
    fn index_of(&self, pos: Position) -> Option<usize> {
        self.contains(pos).then(|| pos.to_index(self.width))
    }

    /// True when the position sits on the outermost ring of cells.
    pub fn is_border(&self, pos: Position) -> bool {
        pos.row == 0 || pos.col == 0 || pos.row + 1 == self.height || pos.col + 1 == self.width
    }

    pub fn get(&self, pos: Position) -> Option<&T> {
        self.cells.get(self.index_of(pos)?)
    }

    pub fn get_mut(&mut self, pos: Position) -> Option<&mut T> {
        let index = self.index_of(pos)?;
        self.cells.get_mut(index)
    }

    /// Sets the value of the cell at the given position.
    pub fn set(&mut self, pos: Position, value: T) -> Result<(), GridError> {
        let index = self.index_of(pos).ok_or(GridError::OutOfBounds {
            row: pos.row,
            col: pos.col,
            width: self.width,
            height: self.height,
        })?;
        self.cells[index] = value;
        Ok(())
    }

    /// Overwrites every cell with `value`.
    pub fn fill(&mut self, value: T)
    where
        T: Clone,
    {
        self.cells.fill(value);
    }

    /// Shifts `pos` by an offset, keeping the result only if it is in bounds.
    pub fn step(&self, pos: Position, d_row: isize, d_col: isize) -> Option<Position> {
        pos.offset(d_row, d_col).filter(|next| self.contains(*next))
    }

    /// In-bounds orthogonal neighbours of `pos`.
    pub fn neighbors(&self, pos: Position) -> impl Iterator<Item = Position> + '_ {
        ORTHOGONAL
            .iter()
            .filter_map(move |&(dr, dc)| self.step(pos, dr, dc))
    }

    /// Returns an iterator over the cells of the grid in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.cells.iter()
    }

    /// Returns an iterator that yields `(Position, &T)` for each cell.
    pub fn enumerate(&self) -> impl Iterator<Item = (Position, &T)> {
        let width = self.width;
        self.cells
            .iter()
            .enumerate()
            .map(move |(index, cell)| (Position::from_index(index, width), cell))
    }
}

impl<T> Index<Position> for Grid<T> {
    type Output = T;

    #[inline]
    fn index(&self, pos: Position) -> &Self::Output {
        match self.index_of(pos) {
            Some(idx) => &self.cells[idx],
            None => panic!(
                "Grid index ({}, {}) out of bounds for grid size {}x{}",
                pos.row, pos.col, self.height, self.width
            ),
        }
    }
}

impl<T> IndexMut<Position> for Grid<T> {
    #[inline]
    fn index_mut(&mut self, pos: Position) -> &mut Self::Output {
        let (width, height) = (self.width, self.height);
        match self.index_of(pos) {
            Some(idx) => &mut self.cells[idx],
            None => panic!(
                "Grid index ({}, {}) out of bounds for grid size {}x{}",
                pos.row, pos.col, height, width
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_out_of_bounds_is_an_error() {
        let mut grid: Grid<u8> = Grid::new(3, 2);
        assert_eq!(
            grid.set(Position::new(2, 0), 1),
            Err(GridError::OutOfBounds {
                row: 2,
                col: 0,
                width: 3,
                height: 2
            })
        );
        assert!(grid.set(Position::new(1, 2), 1).is_ok());
        assert_eq!(grid[Position::new(1, 2)], 1);
    }

    #[test]
    fn corner_has_two_neighbours() {
        let grid: Grid<u8> = Grid::new(4, 4);
        let neighbours: Vec<_> = grid.neighbors(Position::new(0, 0)).collect();
        assert_eq!(neighbours, vec![Position::new(1, 0), Position::new(0, 1)]);
        assert_eq!(grid.neighbors(Position::new(2, 2)).count(), 4);
    }

    #[test]
    fn border_detection() {
        let grid: Grid<u8> = Grid::new(5, 4);
        assert!(grid.is_border(Position::new(0, 2)));
        assert!(grid.is_border(Position::new(3, 2)));
        assert!(grid.is_border(Position::new(2, 4)));
        assert!(!grid.is_border(Position::new(2, 2)));
    }

    #[test]
    fn from_cells_checks_length() {
        assert!(Grid::from_cells(2, 2, vec![0u8; 4]).is_ok());
        assert_eq!(
            Grid::from_cells(2, 2, vec![0u8; 3]),
            Err(GridError::CellCount {
                expected: 4,
                actual: 3
            })
        );
    }

    #[test]
    fn enumerate_yields_positions() {
        let grid = Grid::from_cells(2, 2, vec!['a', 'b', 'c', 'd']).unwrap();
        let found: Vec<_> = grid.enumerate().filter(|(_, c)| **c == 'c').collect();
        assert_eq!(found, vec![(Position::new(1, 0), &'c')]);
    }
}
