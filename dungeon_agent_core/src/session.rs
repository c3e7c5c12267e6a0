//! A local stand-in for the authoritative game session.
//!
//! It owns the true level layout, hands the agent one observation window per
//! turn and applies the returned action. The planner never reads from it
//! except through [`Observation`]s.

use tracing::{debug, info};

use crate::{
    Action, Agent, Inventory, Observation, ObservationError, Position, Tile,
    map::{Grid, GridError},
};

/// Errors raised while parsing level files.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MapError {
    #[error("Map string is empty")]
    Empty,
    #[error("Inconsistent width at row {row}: expected {expected}, found {found}")]
    InconsistentWidth {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("Unknown map code '{token}' at position ({row}, {col})")]
    UnknownToken {
        token: String,
        row: usize,
        col: usize,
    },
    #[error("Multiple start positions ('ST') found")]
    MultipleStarts,
    #[error("No start position ('ST') found in map")]
    MissingStart,
    #[error(
        "Level {index} is {width}x{height}, expected {expected_width}x{expected_height} like the first level"
    )]
    DimensionMismatch {
        index: usize,
        width: usize,
        height: usize,
        expected_width: usize,
        expected_height: usize,
    },
    #[error(transparent)]
    Grid(#[from] GridError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("No levels to play")]
    NoLevels,
    #[error("Session is already finished")]
    Finished,
    #[error(transparent)]
    Map(#[from] MapError),
    #[error("Agent rejected the observation: {0}")]
    Observation(#[from] ObservationError),
}

/// A parsed level: the true tiles and where the agent starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Level {
    pub tiles: Grid<Tile>,
    pub start: Position,
}

/// Represents the outcome of processing an agent's action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionResult {
    Success,
    Failure(String),
    /// The exit was reached and the next level has started.
    LevelComplete,
    /// The exit of the last level was reached.
    Finished,
}

/// One observe, decide, act round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReport {
    pub tick: u64,
    pub action: Action,
    pub result: ActionResult,
}

/// Manages the simulated game.
#[derive(Debug, Clone)]
pub struct Session {
    levels: Vec<Level>,
    level_index: usize,
    tiles: Grid<Tile>,
    player: Position,
    inventory: Inventory,
    visibility_range: usize,
    tick: u64,
    finished: bool,
}

impl Session {
    /// Starts a session on the first level. All levels must share the first
    /// level's dimensions.
    pub fn new(levels: Vec<Level>, visibility_range: usize) -> Result<Self, SessionError> {
        let first = levels.first().ok_or(SessionError::NoLevels)?;
        let (width, height) = (first.tiles.width(), first.tiles.height());
        for (index, level) in levels.iter().enumerate() {
            if level.tiles.width() != width || level.tiles.height() != height {
                return Err(MapError::DimensionMismatch {
                    index,
                    width: level.tiles.width(),
                    height: level.tiles.height(),
                    expected_width: width,
                    expected_height: height,
                }
                .into());
            }
        }

        let tiles = first.tiles.clone();
        let player = first.start;
        Ok(Session {
            levels,
            level_index: 0,
            tiles,
            player,
            inventory: Inventory::None,
            visibility_range,
            tick: 0,
            finished: false,
        })
    }

    pub fn width(&self) -> usize {
        self.tiles.width()
    }

    pub fn height(&self) -> usize {
        self.tiles.height()
    }

    pub fn visibility_range(&self) -> usize {
        self.visibility_range
    }

    /// Identifier of the level currently being played.
    pub fn level(&self) -> u32 {
        self.level_index as u32
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn player(&self) -> Position {
        self.player
    }

    pub fn inventory(&self) -> Inventory {
        self.inventory
    }

    /// The true layout of the current level, without the agent.
    pub fn tiles(&self) -> &Grid<Tile> {
        &self.tiles
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Builds the agent's view: a `(2r+1)²` window centred on the agent.
    /// Cells off the map or farther than `r` away read as `Unknown`.
    pub fn observation(&self) -> Observation {
        let range = self.visibility_range as isize;
        let mut surroundings = Vec::with_capacity((2 * self.visibility_range + 1).pow(2));
        for d_row in -range..=range {
            for d_col in -range..=range {
                let visible = d_row * d_row + d_col * d_col <= range * range;
                let tile = match self.tiles.step(self.player, d_row, d_col) {
                    Some(pos) if visible && pos == self.player => Tile::Player,
                    Some(pos) if visible => self.tiles[pos],
                    _ => Tile::Unknown,
                };
                surroundings.push(tile);
            }
        }
        Observation {
            level: self.level(),
            player: self.player,
            inventory: self.inventory,
            surroundings,
        }
    }

    /// Applies one action against the true layout.
    pub fn act(&mut self, action: Action) -> ActionResult {
        if self.finished {
            return ActionResult::Failure("Session is already finished.".to_string());
        }
        self.tick += 1;

        let Some(direction) = action.direction() else {
            return ActionResult::Success;
        };
        let Some(target) = direction
            .apply(self.player)
            .filter(|pos| self.tiles.contains(*pos))
        else {
            return ActionResult::Failure("Target position is out of bounds.".to_string());
        };

        if action.is_move() {
            self.move_to(target)
        } else {
            self.use_on(target)
        }
    }

    /// Runs one turn: observe, ask the agent, act.
    pub fn run_turn(&mut self, agent: &mut dyn Agent) -> Result<TurnReport, SessionError> {
        if self.finished {
            return Err(SessionError::Finished);
        }
        let observation = self.observation();
        let action = agent.next_action(&observation)?;
        let result = self.act(action);
        if let ActionResult::Failure(reason) = &result {
            debug!(tick = self.tick, ?action, reason = %reason, "Action rejected");
        }
        Ok(TurnReport {
            tick: self.tick,
            action,
            result,
        })
    }

    fn move_to(&mut self, target: Position) -> ActionResult {
        match self.tiles[target] {
            Tile::Empty | Tile::Treasure => {
                self.tiles[target] = Tile::Empty;
                self.player = target;
                ActionResult::Success
            }
            tile @ (Tile::KeyRed | Tile::KeyGreen | Tile::KeyBlue) => {
                if self.inventory != Inventory::None {
                    return ActionResult::Failure("Inventory is full.".to_string());
                }
                if let Some(color) = tile.key_color() {
                    self.inventory = color.inventory();
                }
                self.tiles[target] = Tile::Empty;
                self.player = target;
                ActionResult::Success
            }
            // Enemies are scenery: the agent shares their square.
            Tile::Enemy => {
                self.player = target;
                ActionResult::Success
            }
            Tile::Exit => {
                if self.inventory == Inventory::Boulder {
                    return ActionResult::Failure(
                        "Cannot leave the level while carrying a boulder.".to_string(),
                    );
                }
                self.player = target;
                self.complete_level()
            }
            tile => ActionResult::Failure(format!("Cannot move into {tile:?}.")),
        }
    }

    fn use_on(&mut self, target: Position) -> ActionResult {
        let tile = self.tiles[target];
        let door_color = tile.door_color();
        let opens_door = door_color.is_some() && door_color == self.inventory.key_color();
        match (tile, self.inventory) {
            (door, _) if opens_door => {
                // One key opens every door of its colour.
                let doors: Vec<Position> = self
                    .tiles
                    .enumerate()
                    .filter(|(_, t)| **t == door)
                    .map(|(pos, _)| pos)
                    .collect();
                for pos in doors {
                    self.tiles[pos] = Tile::Empty;
                }
                self.inventory = Inventory::None;
                ActionResult::Success
            }
            (Tile::Boulder, Inventory::None) => {
                self.tiles[target] = Tile::Empty;
                self.inventory = Inventory::Boulder;
                ActionResult::Success
            }
            (Tile::Empty, Inventory::Boulder) => {
                self.tiles[target] = Tile::Boulder;
                self.inventory = Inventory::None;
                ActionResult::Success
            }
            (tile, Inventory::None) => ActionResult::Failure(format!(
                "Nothing to use on {tile:?} with an empty inventory."
            )),
            (tile, held) => ActionResult::Failure(format!("Cannot use {held:?} on {tile:?}.")),
        }
    }

    fn complete_level(&mut self) -> ActionResult {
        let next = self.level_index + 1;
        match self.levels.get(next) {
            Some(level) => {
                info!(level = next, tick = self.tick, "Level complete");
                self.level_index = next;
                self.tiles = level.tiles.clone();
                self.player = level.start;
                self.inventory = Inventory::None;
                ActionResult::LevelComplete
            }
            None => {
                info!(tick = self.tick, "Final level complete");
                self.finished = true;
                ActionResult::Finished
            }
        }
    }
}

/// Loads one level from whitespace-separated two-letter codes, one row per
/// line. `ST` marks the start square and is floor underneath.
pub fn load_level_from_string(map_string: &str) -> Result<Level, MapError> {
    let lines: Vec<&str> = map_string
        .trim()
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect();
    if lines.is_empty() {
        return Err(MapError::Empty);
    }

    let width = lines[0].split_whitespace().count();
    let height = lines.len();
    let mut cells = Vec::with_capacity(width * height);
    let mut start: Option<Position> = None;

    for (row, line) in lines.iter().enumerate() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() != width {
            return Err(MapError::InconsistentWidth {
                row,
                expected: width,
                found: tokens.len(),
            });
        }
        for (col, token) in tokens.into_iter().enumerate() {
            if token == "ST" {
                if start.is_some() {
                    return Err(MapError::MultipleStarts);
                }
                start = Some(Position::new(row, col));
                cells.push(Tile::Empty);
                continue;
            }
            let tile = Tile::from_token(token).ok_or_else(|| MapError::UnknownToken {
                token: token.to_string(),
                row,
                col,
            })?;
            cells.push(tile);
        }
    }

    let start = start.ok_or(MapError::MissingStart)?;
    Ok(Level {
        tiles: Grid::from_cells(width, height, cells)?,
        start,
    })
}

/// Loads a sequence of levels separated by lines containing only `---`.
pub fn load_levels_from_string(file_string: &str) -> Result<Vec<Level>, MapError> {
    let mut levels = Vec::new();
    let mut current = String::new();
    for line in file_string.lines() {
        if line.trim() == "---" {
            levels.push(load_level_from_string(&current)?);
            current.clear();
        } else {
            current.push_str(line);
            current.push('\n');
        }
    }
    if !current.trim().is_empty() || levels.is_empty() {
        levels.push(load_level_from_string(&current)?);
    }
    Ok(levels)
}
