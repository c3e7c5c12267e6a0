use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    Action, Inventory, KeyColor, Observation, ObservationError, Position, Tile, WorldModel,
    map::SURROUNDING, search::PathSearch,
};

/// Trait defining the behavior of an agent.
/// Agents receive one observation per turn and answer with one action.
pub trait Agent {
    /// Folds the observation into the agent's state and picks the next action.
    ///
    /// Returns `Action::None` when the agent has nothing useful to do. An
    /// observation that breaks the session contract is rejected without
    /// touching the agent's belief.
    fn next_action(&mut self, observation: &Observation) -> Result<Action, ObservationError>;
}

/// The goals the planner checks each turn, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rule {
    ReachExit,
    FetchKey,
    OpenDoor,
    StashBoulder,
    Explore,
    PickUpBoulder,
}

/// The outcome of the rule that fired this turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub rule: Rule,
    /// Square the action works toward: the goal itself, or the square next
    /// to it when the goal has to be used from a neighbour.
    pub target: Position,
    pub action: Action,
}

/// Greedy planner over a fused world model.
///
/// Distances are recomputed from scratch every turn, so a rejected action or
/// a belief corrected by a fresh observation never leaves stale routes behind.
#[derive(Debug, Clone)]
pub struct ActionPlanner {
    world: WorldModel,
    search: PathSearch,
    last_decision: Option<Decision>,
}

impl ActionPlanner {
    pub fn new(width: usize, height: usize, visibility_range: usize) -> Self {
        Self {
            world: WorldModel::new(width, height, visibility_range),
            search: PathSearch::new(width, height),
            last_decision: None,
        }
    }

    pub fn world(&self) -> &WorldModel {
        &self.world
    }

    pub fn search(&self) -> &PathSearch {
        &self.search
    }

    /// The decision behind the most recent action, `None` after a stuck turn.
    pub fn last_decision(&self) -> Option<&Decision> {
        self.last_decision.as_ref()
    }

    /// Evaluates the rules in priority order against the current belief.
    /// The first rule that yields an action wins.
    pub fn decide(&self) -> Option<Decision> {
        self.try_reach_exit()
            .or_else(|| self.try_fetch_key())
            .or_else(|| self.try_open_door())
            .or_else(|| self.try_stash_boulder())
            .or_else(|| self.try_explore())
            .or_else(|| self.try_pick_up_boulder())
    }

    fn try_reach_exit(&self) -> Option<Decision> {
        if self.world.inventory() == Inventory::Boulder {
            return None;
        }
        self.move_toward(Rule::ReachExit, self.world.positions_of(Tile::Exit))
    }

    fn try_fetch_key(&self) -> Option<Decision> {
        if self.world.inventory() != Inventory::None {
            return None;
        }
        let keys: Vec<Position> = KeyColor::ALL
            .into_iter()
            .filter(|color| self.world.has_tiles(color.door_tile()))
            .flat_map(|color| self.world.positions_of(color.key_tile()))
            .collect();
        self.move_toward(Rule::FetchKey, keys)
    }

    fn try_open_door(&self) -> Option<Decision> {
        let color = self.world.inventory().key_color()?;
        let doors: Vec<Position> = self.world.positions_of(color.door_tile()).collect();
        if doors.is_empty() {
            return None;
        }
        self.use_toward(Rule::OpenDoor, doors)
    }

    fn try_stash_boulder(&self) -> Option<Decision> {
        if self.world.inventory() != Inventory::Boulder {
            return None;
        }
        // Only drop once the exit is known to be reachable.
        self.search.closest_of(self.world.positions_of(Tile::Exit))?;
        let targets = self.safe_drop_cells();
        if targets.is_empty() {
            return None;
        }
        self.use_toward(Rule::StashBoulder, targets)
    }

    fn try_explore(&self) -> Option<Decision> {
        self.move_toward(Rule::Explore, self.frontier_cells())
    }

    fn try_pick_up_boulder(&self) -> Option<Decision> {
        if self.world.inventory() != Inventory::None {
            return None;
        }
        let boulders: Vec<Position> = self.world.positions_of(Tile::Boulder).collect();
        if boulders.is_empty() {
            return None;
        }
        self.use_toward(Rule::PickUpBoulder, boulders)
    }

    /// `Empty` cells whose eight surrounding cells are all walkable floor, so
    /// a boulder dropped there cannot seal a corridor or doorway.
    ///
    /// The agent's own square counts as floor; it is empty underneath.
    pub fn safe_drop_cells(&self) -> Vec<Position> {
        let grid = self.world.grid();
        let is_floor = |pos: Position| matches!(grid[pos], Tile::Empty | Tile::Player);
        self.world
            .positions_of(Tile::Empty)
            .filter(|&pos| {
                SURROUNDING
                    .iter()
                    .all(|&(dr, dc)| grid.step(pos, dr, dc).is_some_and(is_floor))
            })
            .collect()
    }

    /// Known `Empty` cells off the border ring with an `Unknown` orthogonal
    /// neighbour.
    pub fn frontier_cells(&self) -> Vec<Position> {
        let grid = self.world.grid();
        self.world
            .positions_of(Tile::Empty)
            .filter(|&pos| !grid.is_border(pos))
            .filter(|&pos| grid.neighbors(pos).any(|n| grid[n] == Tile::Unknown))
            .collect()
    }

    /// Takes one step along a shortest route to the closest reachable
    /// candidate.
    fn move_toward<I>(&self, rule: Rule, candidates: I) -> Option<Decision>
    where
        I: IntoIterator<Item = Position>,
    {
        let target = self.search.closest_of(candidates)?;
        let hop = self.search.next_hop_toward(target)?;
        let action = Action::move_to(self.world.player(), hop)?;
        Some(Decision {
            rule,
            target,
            action,
        })
    }

    /// Uses an adjacent target, or walks to the nearest empty square next to
    /// one of them.
    fn use_toward(&self, rule: Rule, targets: Vec<Position>) -> Option<Decision> {
        let player = self.world.player();
        if let Some(&target) = targets.iter().find(|target| target.is_adjacent(player)) {
            let action = Action::use_on(player, target)?;
            return Some(Decision {
                rule,
                target,
                action,
            });
        }
        let approaches = PathSearch::adjacent_walkable_neighbors(&self.world, targets);
        self.move_toward(rule, approaches)
    }
}

impl Agent for ActionPlanner {
    fn next_action(&mut self, observation: &Observation) -> Result<Action, ObservationError> {
        self.world.fuse(observation)?;
        self.search.compute(&self.world);

        self.last_decision = self.decide();
        match &self.last_decision {
            Some(decision) => {
                debug!(
                    rule = ?decision.rule,
                    target = ?decision.target,
                    action = ?decision.action,
                    "Rule fired"
                );
                Ok(decision.action)
            }
            None => {
                debug!(player = ?self.world.player(), "No rule produced an action");
                Ok(Action::None)
            }
        }
    }
}
