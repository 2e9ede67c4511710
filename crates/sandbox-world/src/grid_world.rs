//! The authoritative position store and legality oracle.
//!
//! A [`GridWorld`] holds every agent on a square grid, sorted by name. That
//! order is fixed when the world is built and is the order agents act in
//! during a turn. All queries are pure functions of the current board; there
//! is no caching between calls, so a move applied earlier in a turn is
//! visible to every later legality check and application.

use std::collections::BTreeMap;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index;
use sandbox_types::{ActionOutcome, AgentInbox, Direction, LegalActionSet, Position};
use tracing::debug;

use crate::error::WorldError;

/// One agent's mutable state.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AgentState {
    /// Stable name, assigned once when the world is built.
    pub name: String,
    /// Current cell.
    pub position: Position,
    /// At most one undelivered message. A new delivery overwrites it.
    pub inbox: Option<AgentInbox>,
    /// Outcome of the most recently applied action. Diagnostics only.
    pub last_outcome: Option<ActionOutcome>,
}

impl AgentState {
    fn new(name: String, position: Position) -> Self {
        Self {
            name,
            position,
            inbox: None,
            last_outcome: None,
        }
    }
}

/// A square grid with agents on distinct cells.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct GridWorld {
    grid_size: u32,
    /// Sorted by name; this is the processing order.
    agents: Vec<AgentState>,
}

impl GridWorld {
    /// Build a world from explicit placements.
    ///
    /// Agents are re-sorted by name regardless of input order.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::OutOfBounds`] for a position outside the grid,
    /// [`WorldError::CellOccupied`] when two agents share a cell, and
    /// [`WorldError::DuplicateAgent`] when two agents share a name.
    pub fn new(
        grid_size: u32,
        placements: impl IntoIterator<Item = (String, Position)>,
    ) -> Result<Self, WorldError> {
        let mut agents: Vec<AgentState> = Vec::new();
        for (name, position) in placements {
            if !position.in_bounds(grid_size) {
                return Err(WorldError::OutOfBounds {
                    position,
                    grid_size,
                });
            }
            if agents.iter().any(|a| a.name == name) {
                return Err(WorldError::DuplicateAgent(name));
            }
            if agents.iter().any(|a| a.position == position) {
                return Err(WorldError::CellOccupied(position));
            }
            agents.push(AgentState::new(name, position));
        }
        agents.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(Self { grid_size, agents })
    }

    /// Place the named agents on distinct random cells.
    ///
    /// With a seed the placement is reproducible: the same seed, grid size,
    /// and names always yield the same cells.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::GridTooSmall`] when there are more agents than
    /// cells, or [`WorldError::DuplicateAgent`] for repeated names.
    pub fn scatter(
        grid_size: u32,
        names: Vec<String>,
        seed: Option<u64>,
    ) -> Result<Self, WorldError> {
        let too_small = WorldError::GridTooSmall {
            grid_size,
            agents: names.len(),
        };
        let cells = u64::from(grid_size)
            .checked_mul(u64::from(grid_size))
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| too_small.clone())?;
        if names.len() > cells {
            return Err(too_small);
        }

        let mut rng = seed.map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
        let picks = index::sample(&mut rng, cells, names.len());

        let mut placements = Vec::with_capacity(names.len());
        for (name, cell) in names.into_iter().zip(picks) {
            let position = cell_position(cell, grid_size).ok_or_else(|| too_small.clone())?;
            placements.push((name, position));
        }
        let world = Self::new(grid_size, placements)?;
        debug!(grid_size, agents = world.agents.len(), ?seed, "scattered agents");
        Ok(world)
    }

    /// Side length of the grid.
    pub const fn grid_size(&self) -> u32 {
        self.grid_size
    }

    /// All agents in processing order.
    pub fn agents(&self) -> &[AgentState] {
        &self.agents
    }

    /// Agent names in processing order.
    pub fn agent_names(&self) -> Vec<String> {
        self.agents.iter().map(|a| a.name.clone()).collect()
    }

    /// Look up an agent by name.
    pub fn agent(&self, name: &str) -> Option<&AgentState> {
        self.agents.iter().find(|a| a.name == name)
    }

    fn agent_mut(&mut self, name: &str) -> Result<&mut AgentState, WorldError> {
        self.agents
            .iter_mut()
            .find(|a| a.name == name)
            .ok_or_else(|| WorldError::AgentNotFound(name.to_owned()))
    }

    /// Current cell of an agent.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::AgentNotFound`] for an unknown name.
    pub fn position_of(&self, name: &str) -> Result<Position, WorldError> {
        self.agent(name)
            .map(|a| a.position)
            .ok_or_else(|| WorldError::AgentNotFound(name.to_owned()))
    }

    /// Every agent's current cell, keyed by name.
    pub fn positions(&self) -> BTreeMap<String, Position> {
        self.agents
            .iter()
            .map(|a| (a.name.clone(), a.position))
            .collect()
    }

    /// The agent standing on `position`, if any.
    pub fn occupant_at(&self, position: Position) -> Option<&str> {
        self.agents
            .iter()
            .find(|a| a.position == position)
            .map(|a| a.name.as_str())
    }

    /// Whether two existing agents are orthogonally adjacent right now.
    ///
    /// Returns `false` if either agent does not exist.
    pub fn are_adjacent(&self, a: &str, b: &str) -> bool {
        match (self.agent(a), self.agent(b)) {
            (Some(a), Some(b)) => a.position.is_adjacent(b.position),
            _ => false,
        }
    }

    /// The legal actions for `name` against the current board.
    ///
    /// `Wait` first, then one `Move` per open in-bounds neighbor in
    /// [`Direction::ALL`] order, then one `Talk` per adjacent agent in
    /// processing order.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::AgentNotFound`] for an unknown name.
    pub fn legal_actions(&self, name: &str) -> Result<LegalActionSet, WorldError> {
        let here = self.position_of(name)?;
        let moves = Direction::ALL.into_iter().filter(|&direction| {
            here.neighbor(direction, self.grid_size)
                .is_some_and(|dest| self.occupant_at(dest).is_none())
        });
        let talk_targets = self
            .agents
            .iter()
            .filter(|other| other.name != name && other.position.is_adjacent(here))
            .map(|other| other.name.clone());
        Ok(LegalActionSet::new(moves, talk_targets))
    }

    /// Step `name` one cell in `direction`.
    ///
    /// The destination is checked against the current board. An
    /// out-of-bounds or occupied destination leaves the agent in place and
    /// yields [`ActionOutcome::Blocked`].
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::AgentNotFound`] for an unknown name.
    pub fn apply_move(
        &mut self,
        name: &str,
        direction: Direction,
    ) -> Result<ActionOutcome, WorldError> {
        let here = self.position_of(name)?;
        let open = here
            .neighbor(direction, self.grid_size)
            .filter(|&dest| self.occupant_at(dest).is_none());
        let outcome = match open {
            Some(dest) => {
                self.agent_mut(name)?.position = dest;
                ActionOutcome::Moved { to: dest }
            }
            None => {
                debug!(agent = name, %direction, "move blocked");
                ActionOutcome::Blocked { toward: direction }
            }
        };
        Ok(outcome)
    }

    /// Remove and return an agent's pending inbox message.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::AgentNotFound`] for an unknown name.
    pub fn take_inbox(&mut self, name: &str) -> Result<Option<AgentInbox>, WorldError> {
        Ok(self.agent_mut(name)?.inbox.take())
    }

    /// Put a message in an agent's inbox, replacing any undelivered one.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::AgentNotFound`] for an unknown name.
    pub fn set_inbox(&mut self, name: &str, inbox: AgentInbox) -> Result<(), WorldError> {
        self.agent_mut(name)?.inbox = Some(inbox);
        Ok(())
    }

    /// Remember the outcome of the action an agent just applied.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::AgentNotFound`] for an unknown name.
    pub fn set_last_outcome(
        &mut self,
        name: &str,
        outcome: ActionOutcome,
    ) -> Result<(), WorldError> {
        self.agent_mut(name)?.last_outcome = Some(outcome);
        Ok(())
    }
}

/// Map a row-major cell index to a position.
///
/// Each coordinate is below `grid_size`, so it fits in `u32` even when the
/// cell index does not. `None` only for an index outside the grid.
fn cell_position(cell: usize, grid_size: u32) -> Option<Position> {
    let width = usize::try_from(grid_size).ok()?;
    let x = u32::try_from(cell.checked_rem(width)?).ok()?;
    let y = u32::try_from(cell.checked_div(width)?).ok()?;
    (y < grid_size).then_some(Position::new(x, y))
}
