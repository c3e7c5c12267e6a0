use std::collections::VecDeque;

use tracing::trace;

use crate::{Position, Tile, WorldModel, map::Grid};

const UNREACHED: u32 = u32::MAX;

/// Breadth-first distances and predecessors from the agent's square over the
/// believed map.
///
/// Buffers are sized once and overwritten by every [`PathSearch::compute`];
/// nothing carries over between turns.
#[derive(Debug, Clone)]
pub struct PathSearch {
    origin: Position,
    distances: Grid<u32>,
    predecessors: Grid<Option<Position>>,
}

impl PathSearch {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            origin: Position::default(),
            distances: Grid::filled(width, height, UNREACHED),
            predecessors: Grid::filled(width, height, None),
        }
    }

    /// Recomputes everything from the agent's current square.
    pub fn compute(&mut self, world: &WorldModel) {
        self.distances.fill(UNREACHED);
        self.predecessors.fill(None);

        let origin = world.player();
        self.origin = origin;
        if self.distances.set(origin, 0).is_err() {
            return;
        }

        let grid = world.grid();
        let mut queue = VecDeque::from([origin]);
        let mut reached = 1usize;
        while let Some(current) = queue.pop_front() {
            let next_distance = self.distances[current] + 1;
            for neighbor in grid.neighbors(current) {
                if grid[neighbor].is_blocking() || next_distance >= self.distances[neighbor] {
                    continue;
                }
                self.distances[neighbor] = next_distance;
                self.predecessors[neighbor] = Some(current);
                queue.push_back(neighbor);
                reached += 1;
            }
        }
        trace!(origin = ?origin, reached, "Computed distances");
    }

    /// Path length from the origin, or `None` if `pos` cannot be reached.
    pub fn distance(&self, pos: Position) -> Option<u32> {
        self.distances
            .get(pos)
            .copied()
            .filter(|&distance| distance != UNREACHED)
    }

    pub fn is_reachable(&self, pos: Position) -> bool {
        self.distance(pos).is_some()
    }

    /// Shortest route to `target`, first step first, excluding the origin.
    /// Empty when `target` is the origin; `None` when it is unreachable.
    pub fn path_to(&self, target: Position) -> Option<Vec<Position>> {
        self.distance(target)?;
        let mut path = Vec::new();
        let mut current = target;
        while current != self.origin {
            path.push(current);
            current = self.predecessors.get(current).copied().flatten()?;
        }
        path.reverse();
        Some(path)
    }

    /// The square adjacent to the origin on a shortest route to `target`.
    pub fn next_hop_toward(&self, target: Position) -> Option<Position> {
        let mut current = target;
        loop {
            let previous = self.predecessors.get(current).copied().flatten()?;
            if previous == self.origin {
                return Some(current);
            }
            current = previous;
        }
    }

    /// The reachable candidate with the smallest distance. Ties go to the
    /// lowest row-major position.
    pub fn closest_of<I>(&self, candidates: I) -> Option<Position>
    where
        I: IntoIterator<Item = Position>,
    {
        candidates
            .into_iter()
            .filter_map(|pos| self.distance(pos).map(|distance| (distance, pos)))
            .min()
            .map(|(_, pos)| pos)
    }

    /// `Empty` orthogonal neighbours of the targets: the squares from which a
    /// blocking tile such as a door or boulder can be used.
    pub fn adjacent_walkable_neighbors<I>(world: &WorldModel, targets: I) -> Vec<Position>
    where
        I: IntoIterator<Item = Position>,
    {
        let grid = world.grid();
        targets
            .into_iter()
            .flat_map(|target| grid.neighbors(target))
            .filter(|&pos| grid[pos] == Tile::Empty)
            .collect()
    }
}
