use std::{
    collections::{BTreeSet, HashMap},
    fmt,
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{Inventory, Position, Tile, map::Grid};

/// What the session reveals to the agent at the start of a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub level: u32,
    pub player: Position,
    pub inventory: Inventory,
    /// Row-major `(2r+1)²` window centred on `player`.
    pub surroundings: Vec<Tile>,
}

/// An observation that breaks the session contract.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ObservationError {
    #[error("Surroundings hold {actual} tiles, expected {expected}")]
    SurroundingsSize { expected: usize, actual: usize },
    #[error("Player position ({row}, {col}) is outside the {height}x{width} map")]
    PlayerOutOfBounds {
        row: usize,
        col: usize,
        width: usize,
        height: usize,
    },
}

/// The agent's persistent belief about the level.
///
/// Every known cell is filed in exactly one bucket of the tile index, keyed
/// by its current tile. Unknown cells are not indexed.
#[derive(Debug, Clone)]
pub struct WorldModel {
    grid: Grid<Tile>,
    tile_positions: HashMap<Tile, BTreeSet<Position>>,
    player: Position,
    inventory: Inventory,
    level: Option<u32>,
    visibility_range: usize,
}

impl WorldModel {
    pub fn new(width: usize, height: usize, visibility_range: usize) -> Self {
        Self {
            grid: Grid::filled(width, height, Tile::Unknown),
            tile_positions: HashMap::new(),
            player: Position::default(),
            inventory: Inventory::None,
            level: None,
            visibility_range,
        }
    }

    pub fn width(&self) -> usize {
        self.grid.width()
    }

    pub fn height(&self) -> usize {
        self.grid.height()
    }

    pub fn visibility_range(&self) -> usize {
        self.visibility_range
    }

    pub fn grid(&self) -> &Grid<Tile> {
        &self.grid
    }

    pub fn player(&self) -> Position {
        self.player
    }

    pub fn inventory(&self) -> Inventory {
        self.inventory
    }

    pub fn level(&self) -> Option<u32> {
        self.level
    }

    /// Believed tile at `pos`; anything off the map reads as `Unknown`.
    pub fn tile(&self, pos: Position) -> Tile {
        self.grid.get(pos).copied().unwrap_or(Tile::Unknown)
    }

    /// Known cells currently holding `tile`, in row-major order.
    pub fn positions_of(&self, tile: Tile) -> impl Iterator<Item = Position> + '_ {
        self.tile_positions
            .get(&tile)
            .into_iter()
            .flat_map(|positions| positions.iter().copied())
    }

    pub fn has_tiles(&self, tile: Tile) -> bool {
        self.tile_positions
            .get(&tile)
            .is_some_and(|positions| !positions.is_empty())
    }

    /// Side length of the observation window.
    pub fn window_size(&self) -> usize {
        2 * self.visibility_range + 1
    }

    /// Merges one observation into the belief.
    ///
    /// A new level id wipes the belief first. Cells outside the window, and
    /// cells the window reports as `Unknown`, keep their last known value.
    /// Fusing the same observation twice leaves the state unchanged.
    pub fn fuse(&mut self, observation: &Observation) -> Result<(), ObservationError> {
        self.validate(observation)?;

        if self.level != Some(observation.level) {
            info!(
                level = observation.level,
                previous = ?self.level,
                "Level changed, resetting belief"
            );
            self.grid.fill(Tile::Unknown);
            self.tile_positions.clear();
            self.level = Some(observation.level);
        }

        self.player = observation.player;

        let range = self.visibility_range as isize;
        let window = self.window_size();
        let mut changed = 0usize;
        for (i, &reported) in observation.surroundings.iter().enumerate() {
            if reported == Tile::Unknown {
                continue;
            }
            // Agents are transient; never let one block a corridor in memory.
            let tile = if reported == Tile::Player {
                Tile::Empty
            } else {
                reported
            };
            let d_row = (i / window) as isize - range;
            let d_col = (i % window) as isize - range;
            let Some(pos) = self.grid.step(observation.player, d_row, d_col) else {
                continue;
            };
            if self.set_tile(pos, tile) {
                changed += 1;
            }
        }

        self.set_tile(self.player, Tile::Player);
        self.inventory = observation.inventory;

        debug!(
            changed,
            player = ?self.player,
            inventory = ?self.inventory,
            "Fused observation"
        );
        Ok(())
    }

    fn validate(&self, observation: &Observation) -> Result<(), ObservationError> {
        let expected = self.window_size() * self.window_size();
        if observation.surroundings.len() != expected {
            return Err(ObservationError::SurroundingsSize {
                expected,
                actual: observation.surroundings.len(),
            });
        }
        if !self.grid.contains(observation.player) {
            return Err(ObservationError::PlayerOutOfBounds {
                row: observation.player.row,
                col: observation.player.col,
                width: self.width(),
                height: self.height(),
            });
        }
        Ok(())
    }

    /// Writes a cell and moves it between index buckets. Returns whether the
    /// stored tile changed.
    fn set_tile(&mut self, pos: Position, tile: Tile) -> bool {
        let Some(cell) = self.grid.get_mut(pos) else {
            return false;
        };
        let old = *cell;
        if old == tile {
            return false;
        }
        *cell = tile;

        if let Some(bucket) = self.tile_positions.get_mut(&old) {
            bucket.remove(&pos);
            if bucket.is_empty() {
                self.tile_positions.remove(&old);
            }
        }
        if tile != Tile::Unknown {
            self.tile_positions.entry(tile).or_default().insert(pos);
        }
        true
    }
}

impl fmt::Display for WorldModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..self.height() {
            for col in 0..self.width() {
                f.write_str(self.tile(Position::new(row, col)).glyph())?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    /// Builds a window from picture rows.
    fn window(rows: &[&str]) -> Vec<Tile> {
        rows.iter()
            .flat_map(|row| row.chars())
            .map(testing::tile_from_char)
            .collect()
    }

    fn observation(level: u32, row: usize, col: usize, rows: &[&str]) -> Observation {
        Observation {
            level,
            player: Position::new(row, col),
            inventory: Inventory::None,
            surroundings: window(rows),
        }
    }

    fn assert_index_partitions_grid(world: &WorldModel) {
        for (pos, tile) in world.grid().enumerate() {
            let buckets: Vec<_> = world
                .tile_positions
                .iter()
                .filter(|(_, positions)| positions.contains(&pos))
                .map(|(t, _)| *t)
                .collect();
            if *tile == Tile::Unknown {
                assert!(buckets.is_empty(), "unknown {pos:?} indexed as {buckets:?}");
            } else {
                assert_eq!(buckets, vec![*tile], "bucket mismatch at {pos:?}");
            }
        }
    }

    #[test]
    fn fuse_writes_window_and_player() {
        let mut world = WorldModel::new(6, 6, 1);
        world
            .fuse(&observation(1, 2, 2, &["#.#", ".P.", "#E#"]))
            .unwrap();

        assert_eq!(world.player(), Position::new(2, 2));
        assert_eq!(world.window_size(), 2 * world.visibility_range() + 1);
        assert_eq!(world.tile(Position::new(2, 2)), Tile::Player);
        assert_eq!(world.tile(Position::new(1, 1)), Tile::Wall);
        assert_eq!(world.tile(Position::new(3, 2)), Tile::Exit);
        assert_eq!(world.tile(Position::new(0, 0)), Tile::Unknown);
        assert_eq!(
            world.positions_of(Tile::Exit).collect::<Vec<_>>(),
            vec![Position::new(3, 2)]
        );
        assert_eq!(
            world.positions_of(Tile::Player).collect::<Vec<_>>(),
            vec![Position::new(2, 2)]
        );
        assert_index_partitions_grid(&world);
    }

    #[test]
    fn other_agents_are_remembered_as_empty() {
        let mut world = WorldModel::new(5, 5, 1);
        world
            .fuse(&observation(1, 2, 2, &["...", ".PP", "..."]))
            .unwrap();
        assert_eq!(world.tile(Position::new(2, 3)), Tile::Empty);
        assert!(!world.tile(Position::new(2, 3)).is_blocking());
    }

    #[test]
    fn fuse_is_idempotent() {
        let mut world = WorldModel::new(6, 6, 1);
        let obs = observation(3, 1, 1, &["###", "#Pr", "#.R"]);
        world.fuse(&obs).unwrap();
        let grid = world.grid().clone();
        let index = world.tile_positions.clone();

        world.fuse(&obs).unwrap();
        assert_eq!(world.grid(), &grid);
        assert_eq!(world.tile_positions, index);
        assert_index_partitions_grid(&world);
    }

    #[test]
    fn memory_is_sticky_outside_the_window() {
        let mut world = WorldModel::new(8, 3, 1);
        world
            .fuse(&observation(1, 1, 1, &["###", "rP.", "###"]))
            .unwrap();
        world
            .fuse(&observation(1, 1, 5, &["###", ".P.", "###"]))
            .unwrap();

        assert_eq!(world.tile(Position::new(1, 0)), Tile::KeyRed);
        // The previously occupied square is only updated once seen again.
        assert_eq!(world.tile(Position::new(1, 1)), Tile::Player);
        assert_eq!(world.positions_of(Tile::Player).count(), 2);

        world
            .fuse(&observation(1, 1, 2, &["###", ".P.", "###"]))
            .unwrap();
        assert_eq!(world.tile(Position::new(1, 1)), Tile::Empty);
        assert_eq!(world.tile(Position::new(1, 5)), Tile::Player);
        assert_index_partitions_grid(&world);
    }

    #[test]
    fn unknown_reports_do_not_erase_memory() {
        let mut world = WorldModel::new(5, 5, 1);
        world
            .fuse(&observation(1, 2, 2, &["#.#", ".P.", "#.#"]))
            .unwrap();
        world
            .fuse(&observation(1, 2, 2, &["???", "?P?", "???"]))
            .unwrap();
        assert_eq!(world.tile(Position::new(1, 1)), Tile::Wall);
    }

    #[test]
    fn level_change_resets_belief() {
        let mut world = WorldModel::new(5, 5, 1);
        world
            .fuse(&observation(1, 2, 2, &["#E#", ".P.", "#.#"]))
            .unwrap();
        assert!(world.has_tiles(Tile::Exit));

        world
            .fuse(&observation(2, 3, 3, &["...", ".P.", "..."]))
            .unwrap();
        assert_eq!(world.level(), Some(2));
        assert!(!world.has_tiles(Tile::Exit));
        assert!(!world.has_tiles(Tile::Wall));
        assert_eq!(world.tile(Position::new(1, 2)), Tile::Unknown);
        assert_index_partitions_grid(&world);
    }

    #[test]
    fn window_is_clipped_at_map_edges() {
        let mut world = WorldModel::new(3, 3, 1);
        world
            .fuse(&observation(1, 0, 0, &["###", "#P.", "#.."]))
            .unwrap();
        assert_eq!(world.tile(Position::new(0, 1)), Tile::Empty);
        assert_eq!(world.tile(Position::new(1, 1)), Tile::Empty);
        assert_index_partitions_grid(&world);
    }

    #[test]
    fn inventory_is_taken_verbatim() {
        let mut world = WorldModel::new(3, 3, 1);
        let mut obs = observation(1, 1, 1, &["...", ".P.", "..."]);
        obs.inventory = Inventory::Boulder;
        world.fuse(&obs).unwrap();
        assert_eq!(world.inventory(), Inventory::Boulder);
    }

    #[test]
    fn malformed_observations_are_rejected() {
        let mut world = WorldModel::new(4, 4, 1);
        let mut obs = observation(1, 1, 1, &["...", ".P.", "..."]);
        obs.surroundings.pop();
        assert_eq!(
            world.fuse(&obs),
            Err(ObservationError::SurroundingsSize {
                expected: 9,
                actual: 8
            })
        );

        let obs = observation(1, 4, 0, &["...", ".P.", "..."]);
        assert!(matches!(
            world.fuse(&obs),
            Err(ObservationError::PlayerOutOfBounds { row: 4, .. })
        ));
        assert_eq!(world.level(), None);
    }

    #[test]
    fn random_observation_streams_keep_the_index_consistent() {
        use rand::{Rng, SeedableRng, rngs::StdRng};

        const PALETTE: [Tile; 6] = [
            Tile::Empty,
            Tile::Empty,
            Tile::Wall,
            Tile::KeyGreen,
            Tile::DoorBlue,
            Tile::Unknown,
        ];
        let mut rng = StdRng::seed_from_u64(0xf05e);
        let (width, height, range) = (9, 7, 2);
        let size = 2 * range + 1;
        let mut world = WorldModel::new(width, height, range);

        for step in 0..200 {
            let player = Position::new(rng.random_range(0..height), rng.random_range(0..width));
            let surroundings = (0..size * size)
                .map(|i| {
                    if i == size * size / 2 {
                        Tile::Player
                    } else {
                        PALETTE[rng.random_range(0..PALETTE.len())]
                    }
                })
                .collect();
            let obs = Observation {
                level: step / 50,
                player,
                inventory: Inventory::None,
                surroundings,
            };

            world.fuse(&obs).unwrap();
            assert_index_partitions_grid(&world);
            let grid = world.grid().clone();
            world.fuse(&obs).unwrap();
            assert_eq!(world.grid(), &grid);
        }
    }

    #[test]
    fn display_renders_glyphs() {
        let mut world = WorldModel::new(3, 1, 1);
        world
            .fuse(&observation(1, 0, 1, &["???", "#PE", "???"]))
            .unwrap();
        assert_eq!(world.to_string(), "██{}><\n");
    }
}
