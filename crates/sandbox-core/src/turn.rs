//! The per-session turn state machine.
//!
//! A [`Simulation`] is one session: a grid world, its roster, the history,
//! and the oracle that decides for autonomous agents. Each call to
//! [`Simulation::step`] starts a turn and processes agents in name order:
//!
//! 1. **Observe** -- compute the agent's legal set, consume its inbox, and
//!    build its [`Observation`].
//! 2. **Decide** -- ask the oracle (autonomous) or suspend (interactive).
//! 3. **Validate** -- decode the reply and enforce legality; failures
//!    degrade to `Wait`.
//! 4. **Apply** -- move on the grid or deliver a talk, and append a debug
//!    trace.
//!
//! After the last agent the turn is sealed into history.
//!
//! Suspension does not block. The in-progress turn is kept as a
//! [`TurnCursor`] inside the session, and [`Simulation::apply_player_action`]
//! picks it up later, possibly from a different request.
//!
//! If the oracle fails mid-turn the cursor is dropped: actions already
//! applied earlier in the turn stay applied, the turn number is consumed,
//! and nothing is written to history.

use sandbox_types::{
    Action, ActionOutcome, AgentView, Controller, ConversationEntry, DebugTrace, DecisionSource,
    Observation, PendingPlayerRequest, Position, StepOutcome, TurnRecord, WorldSnapshot,
};
use sandbox_world::{GridWorld, WorldError};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::channel::{self, History};
use crate::config::WorldConfig;
use crate::decision::{Oracle, OracleError};
use crate::roster::Roster;
use crate::validation::{self, PlayerInputError};

/// Errors returned by session operations.
///
/// Each one rejects only the offending call. Sealed history is never
/// touched by a failed call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimulationError {
    /// A turn operation was called before `reset`.
    #[error("simulation not initialised; call reset first")]
    NotInitialized,

    /// `step` was called while a player decision is outstanding.
    #[error("awaiting player action; resolve it before advancing the turn")]
    ReentrantTurnStart,

    /// A player action was submitted with nothing pending.
    #[error("no player action is pending")]
    NoPendingPlayerDecision,

    /// The player action was rejected. The pending request is unchanged.
    #[error("invalid player action: {source}")]
    PlayerInputInvalid {
        /// Why the input was rejected.
        #[from]
        source: PlayerInputError,
    },

    /// The oracle failed to answer. Earlier slots of the turn stay applied.
    #[error("oracle failed for {agent}: {source}")]
    OracleTransport {
        /// The agent whose slot was being decided.
        agent: String,
        /// The underlying oracle error.
        source: OracleError,
    },

    /// A grid operation failed.
    #[error("world error: {source}")]
    World {
        /// The underlying world error.
        #[from]
        source: WorldError,
    },

    /// The reset parameters describe an impossible world.
    #[error("invalid setup: {0}")]
    InvalidSetup(String),
}

/// Parameters for starting a fresh session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetParams {
    /// Side length of the square grid (at least 1).
    pub grid_size: u32,
    /// Number of agents (at least 2, at most `grid_size^2`).
    pub num_agents: usize,
    /// Placement seed. Unseeded when `None`.
    pub seed: Option<u64>,
    /// Whether the last agent is controlled by the player.
    pub player_agent: bool,
}

impl From<&WorldConfig> for ResetParams {
    fn from(config: &WorldConfig) -> Self {
        Self {
            grid_size: config.grid_size,
            num_agents: config.num_agents,
            seed: config.seed,
            player_agent: config.player_agent,
        }
    }
}

impl Default for ResetParams {
    fn default() -> Self {
        Self::from(&WorldConfig::default())
    }
}

/// Where a session is in the turn cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnState {
    /// No `reset` has happened yet.
    NotInitialized,
    /// No turn is in progress; `step` may be called.
    Idle,
    /// A turn is suspended on the interactive agent.
    AwaitingPlayer {
        /// The turn in progress.
        turn: u64,
        /// The interactive agent.
        agent: String,
    },
}

/// The interactive slot a suspended turn is waiting on.
#[derive(Debug, Clone)]
struct PendingSlot {
    /// The request handed to the caller, legal set frozen.
    request: PendingPlayerRequest,
    /// Index of this slot's skeleton trace in the cursor.
    trace_index: usize,
}

/// Continuation of an in-progress turn.
#[derive(Debug, Clone)]
struct TurnCursor {
    turn: u64,
    next_index: usize,
    messages: Vec<ConversationEntry>,
    debug: Vec<DebugTrace>,
    pending: Option<PendingSlot>,
}

impl TurnCursor {
    const fn new(turn: u64) -> Self {
        Self {
            turn,
            next_index: 0,
            messages: Vec::new(),
            debug: Vec::new(),
            pending: None,
        }
    }
}

/// Everything that exists after a reset.
#[derive(Debug, Clone)]
struct Session {
    world: GridWorld,
    roster: Roster,
    history: History,
    turn: u64,
    /// Present only while suspended on the player.
    cursor: Option<TurnCursor>,
}

/// One simulation session, driven by the caller.
///
/// There is no internal locking: concurrent callers must serialize access
/// to the same instance.
#[derive(Debug)]
pub struct Simulation<O> {
    oracle: O,
    session: Option<Session>,
}

impl<O: Oracle> Simulation<O> {
    /// Create an uninitialised simulation. Call [`Self::reset`] before
    /// stepping.
    pub const fn new(oracle: O) -> Self {
        Self {
            oracle,
            session: None,
        }
    }

    /// Start a fresh session with agents scattered over the grid.
    ///
    /// Discards any previous world, history, and pending player decision.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::InvalidSetup`] for fewer than 2 agents, an
    /// empty grid, or more agents than cells. Nothing is allocated for the
    /// agents until the counts are known to fit.
    pub fn reset(&mut self, params: ResetParams) -> Result<WorldSnapshot, SimulationError> {
        validate_setup(params.grid_size, params.num_agents)?;
        let roster = Roster::new(params.num_agents, params.player_agent);
        let world = GridWorld::scatter(params.grid_size, roster.names().to_vec(), params.seed)
            .map_err(|e| SimulationError::InvalidSetup(e.to_string()))?;
        info!(
            grid_size = params.grid_size,
            num_agents = params.num_agents,
            seed = ?params.seed,
            player_agent = params.player_agent,
            "Simulation reset"
        );
        self.install(world, roster)
    }

    /// Start a fresh session with `agent1..agentN` on the given cells.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::InvalidSetup`] for fewer than 2 agents,
    /// an empty grid, or positions that are out of bounds or shared.
    pub fn reset_with_placements(
        &mut self,
        grid_size: u32,
        positions: &[Position],
        player_agent: bool,
    ) -> Result<WorldSnapshot, SimulationError> {
        validate_setup(grid_size, positions.len())?;
        let roster = Roster::new(positions.len(), player_agent);
        let world = GridWorld::new(
            grid_size,
            roster.names().iter().cloned().zip(positions.iter().copied()),
        )
        .map_err(|e| SimulationError::InvalidSetup(e.to_string()))?;
        info!(grid_size, num_agents = positions.len(), player_agent, "Simulation reset");
        self.install(world, roster)
    }

    fn install(
        &mut self,
        world: GridWorld,
        roster: Roster,
    ) -> Result<WorldSnapshot, SimulationError> {
        self.session = Some(Session {
            world,
            roster,
            history: History::new(),
            turn: 0,
            cursor: None,
        });
        self.snapshot()
    }

    /// Start and run the next turn.
    ///
    /// Returns the sealed record, or a pending request if the turn reaches
    /// the interactive agent.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::NotInitialized`] before `reset`,
    /// [`SimulationError::ReentrantTurnStart`] while a player decision is
    /// outstanding, and [`SimulationError::OracleTransport`] if the oracle
    /// fails mid-turn.
    pub async fn step(&mut self) -> Result<StepOutcome, SimulationError> {
        let Self { oracle, session } = self;
        let session = session.as_mut().ok_or(SimulationError::NotInitialized)?;
        if session.cursor.is_some() {
            return Err(SimulationError::ReentrantTurnStart);
        }

        session.turn = session.turn.saturating_add(1);
        info!(turn = session.turn, "Turn started");
        run_slots(oracle, session, TurnCursor::new(session.turn)).await
    }

    /// Resume a suspended turn with the player's action.
    ///
    /// The action is validated against the legal set frozen at suspension.
    /// On success it is applied and the remaining agents act.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::NoPendingPlayerDecision`] when no turn is
    /// suspended, [`SimulationError::PlayerInputInvalid`] for rejected input
    /// (the pending request stays in place for a retry), [`SimulationError::World`]
    /// if the action cannot be applied (the request also stays in place), and
    /// [`SimulationError::OracleTransport`] if a later slot's oracle fails.
    pub async fn apply_player_action(
        &mut self,
        input: &Value,
    ) -> Result<StepOutcome, SimulationError> {
        let Self { oracle, session } = self;
        let session = session.as_mut().ok_or(SimulationError::NotInitialized)?;
        let mut cursor = session
            .cursor
            .take()
            .ok_or(SimulationError::NoPendingPlayerDecision)?;
        let Some(pending) = cursor.pending.take() else {
            return Err(SimulationError::NoPendingPlayerDecision);
        };

        let agent = pending.request.agent.clone();
        let action = match validation::validate_player_action(
            input,
            &pending.request.legal_actions,
            &agent,
        ) {
            Ok(action) => action,
            Err(e) => {
                warn!(turn = cursor.turn, agent = %agent, error = %e, "Player action rejected");
                cursor.pending = Some(pending);
                session.cursor = Some(cursor);
                return Err(e.into());
            }
        };

        let outcome = match apply_action(session, &mut cursor, &agent, &action) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(
                    turn = cursor.turn,
                    agent = %agent,
                    error = %e,
                    "Player action failed to apply"
                );
                cursor.pending = Some(pending);
                session.cursor = Some(cursor);
                return Err(e);
            }
        };
        info!(
            turn = cursor.turn,
            agent = %agent,
            action = action.kind(),
            note = %outcome,
            "Player decision applied"
        );
        if let Some(trace) = cursor.debug.get_mut(pending.trace_index) {
            trace.response = serde_json::to_string(&action).ok();
            trace.action = Some(action);
            trace.notes.push(outcome.to_string());
        }
        cursor.next_index = cursor.next_index.saturating_add(1);
        run_slots(oracle, session, cursor).await
    }

    /// Current positions, profiles, and conversation log.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::NotInitialized`] before `reset`.
    pub fn snapshot(&self) -> Result<WorldSnapshot, SimulationError> {
        let session = self.session()?;
        let agents = session
            .world
            .agents()
            .iter()
            .map(|a| AgentView {
                name: a.name.clone(),
                position: a.position,
                controller: session.roster.controller_of(&a.name),
            })
            .collect();
        Ok(WorldSnapshot {
            turn: session.turn,
            grid_size: session.world.grid_size(),
            agents,
            traits: session.roster.profiles().clone(),
            messages: session.history.conversation().to_vec(),
            backend: self.oracle.name().to_owned(),
            player_agent: session.roster.interactive_agent().is_some(),
            awaiting_player: session.cursor.is_some(),
        })
    }

    /// Sealed turn records in order. Empty before `reset`.
    pub fn history(&self) -> &[TurnRecord] {
        match &self.session {
            Some(session) => session.history.records(),
            None => &[],
        }
    }

    /// The outstanding player request, if a turn is suspended.
    pub fn pending(&self) -> Option<&PendingPlayerRequest> {
        self.session
            .as_ref()
            .and_then(|session| session.cursor.as_ref())
            .and_then(|cursor| cursor.pending.as_ref())
            .map(|pending| &pending.request)
    }

    /// Where the session is in the turn cycle.
    pub fn state(&self) -> TurnState {
        match &self.session {
            None => TurnState::NotInitialized,
            Some(_) => match self.pending() {
                Some(request) => TurnState::AwaitingPlayer {
                    turn: request.turn,
                    agent: request.agent.clone(),
                },
                None => TurnState::Idle,
            },
        }
    }

    /// The grid world, once reset.
    pub fn world(&self) -> Option<&GridWorld> {
        self.session.as_ref().map(|session| &session.world)
    }

    /// The decision source.
    pub const fn oracle(&self) -> &O {
        &self.oracle
    }

    fn session(&self) -> Result<&Session, SimulationError> {
        self.session.as_ref().ok_or(SimulationError::NotInitialized)
    }
}

fn validate_setup(grid_size: u32, num_agents: usize) -> Result<(), SimulationError> {
    if num_agents < 2 {
        return Err(SimulationError::InvalidSetup(format!(
            "at least 2 agents are required, got {num_agents}"
        )));
    }
    if grid_size == 0 {
        return Err(SimulationError::InvalidSetup(String::from(
            "grid size must be at least 1",
        )));
    }
    let cells = u64::from(grid_size)
        .checked_mul(u64::from(grid_size))
        .unwrap_or(u64::MAX);
    if !u64::try_from(num_agents).is_ok_and(|n| n <= cells) {
        return Err(SimulationError::InvalidSetup(format!(
            "a {grid_size}x{grid_size} grid cannot hold {num_agents} agents"
        )));
    }
    Ok(())
}

/// Process slots from `cursor.next_index` until the turn seals or suspends.
async fn run_slots<O: Oracle>(
    oracle: &mut O,
    session: &mut Session,
    mut cursor: TurnCursor,
) -> Result<StepOutcome, SimulationError> {
    while let Some(name) = session
        .world
        .agents()
        .get(cursor.next_index)
        .map(|a| a.name.clone())
    {
        let mut legal = session.world.legal_actions(&name)?;
        legal.annotate_titles(|target| session.roster.title_of(target));
        let inbox = session.world.take_inbox(&name)?;
        let observation = Observation {
            you: name.clone(),
            positions: session.world.positions(),
            grid_size: session.world.grid_size(),
            turn: cursor.turn,
            legal_actions: legal.clone(),
            traits: session.roster.profiles().clone(),
            message: inbox.clone(),
        };
        let prompt = serde_json::to_string(&observation).unwrap_or_default();
        debug!(turn = cursor.turn, agent = %name, legal = legal.len(), "Slot started");

        if session.roster.controller_of(&name) == Controller::Interactive {
            cursor.debug.push(DebugTrace {
                agent: name.clone(),
                source: DecisionSource::Player,
                prompt,
                legal_actions: legal.clone(),
                response: None,
                action: None,
                notes: Vec::new(),
            });
            let request = PendingPlayerRequest {
                turn: cursor.turn,
                agent: name.clone(),
                legal_actions: legal,
                profile: session.roster.profile(&name).cloned(),
                message: inbox,
                turn_messages: cursor.messages.clone(),
                debug: cursor.debug.clone(),
            };
            cursor.pending = Some(PendingSlot {
                request: request.clone(),
                trace_index: cursor.debug.len().saturating_sub(1),
            });
            info!(turn = cursor.turn, agent = %name, "Awaiting player decision");
            session.cursor = Some(cursor);
            return Ok(StepOutcome::AwaitingPlayer(request));
        }

        let raw = match oracle.decide(&observation).await {
            Ok(raw) if raw.trim().is_empty() => Err(OracleError::EmptyReply {
                agent: name.clone(),
            }),
            other => other,
        }
        .map_err(|source| {
            warn!(turn = cursor.turn, agent = %name, error = %source, "Oracle failed, aborting turn");
            SimulationError::OracleTransport {
                agent: name.clone(),
                source,
            }
        })?;

        let decoded = validation::decode_oracle_reply(&raw);
        let mut notes = Vec::new();
        if let Some(failure) = decoded.failure {
            notes.push(format!("Reply from {name} not understood ({failure}); waited instead."));
        }
        let (action, rejection) = validation::enforce_legality(decoded.action, &legal, &name);
        notes.extend(rejection);

        let outcome = apply_action(session, &mut cursor, &name, &action)?;
        debug!(
            turn = cursor.turn,
            agent = %name,
            action = action.kind(),
            note = %outcome,
            "Oracle decision applied"
        );
        notes.push(outcome.to_string());
        cursor.debug.push(DebugTrace {
            agent: name,
            source: DecisionSource::Oracle,
            prompt,
            legal_actions: legal,
            response: Some(raw),
            action: Some(action),
            notes,
        });
        cursor.next_index = cursor.next_index.saturating_add(1);
    }

    let record = session.history.seal(TurnRecord {
        turn: cursor.turn,
        positions: session.world.positions(),
        messages: cursor.messages,
        debug: cursor.debug,
    });
    info!(
        turn = record.turn,
        messages = record.messages.len(),
        history = session.history.len(),
        "Turn sealed"
    );
    Ok(StepOutcome::Completed(record))
}

/// Apply a validated action for `agent` and remember its outcome.
fn apply_action(
    session: &mut Session,
    cursor: &mut TurnCursor,
    agent: &str,
    action: &Action,
) -> Result<ActionOutcome, SimulationError> {
    let outcome = match action {
        Action::Wait => ActionOutcome::Waited,
        Action::Move { direction } => session.world.apply_move(agent, *direction)?,
        Action::Talk { target, message } => {
            let delivery =
                channel::deliver_talk(&mut session.world, agent, target, message, cursor.turn)?;
            if let Some(entry) = delivery.entry {
                cursor.messages.push(entry.clone());
                session.history.log_message(entry);
            }
            delivery.outcome
        }
    };
    session.world.set_last_outcome(agent, outcome.clone())?;
    Ok(outcome)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use std::collections::BTreeSet;

    use sandbox_types::{AgentInbox, Direction, LegalAction};
    use serde_json::json;

    use super::*;
    use crate::decision::{ScriptedOracle, StubOracle};

    const WAIT: &str = r#"{"action": "wait"}"#;

    fn params(num_agents: usize, player_agent: bool) -> ResetParams {
        ResetParams {
            grid_size: 3,
            num_agents,
            seed: Some(42),
            player_agent,
        }
    }

    fn placed<O: Oracle>(oracle: O, cells: &[(u32, u32)], player: bool) -> Simulation<O> {
        let positions: Vec<Position> = cells.iter().map(|&(x, y)| Position::new(x, y)).collect();
        let mut sim = Simulation::new(oracle);
        sim.reset_with_placements(3, &positions, player).unwrap();
        sim
    }

    fn completed(outcome: StepOutcome) -> TurnRecord {
        match outcome {
            StepOutcome::Completed(record) => record,
            StepOutcome::AwaitingPlayer(request) => {
                panic!("expected a sealed turn, got a pending request for {}", request.agent)
            }
        }
    }

    fn awaiting(outcome: StepOutcome) -> PendingPlayerRequest {
        match outcome {
            StepOutcome::AwaitingPlayer(request) => request,
            StepOutcome::Completed(record) => {
                panic!("expected a pending request, got sealed turn {}", record.turn)
            }
        }
    }

    fn assert_board_is_consistent<O: Oracle>(sim: &Simulation<O>) {
        let world = sim.world().unwrap();
        let cells: BTreeSet<Position> = world.agents().iter().map(|a| a.position).collect();
        assert_eq!(cells.len(), world.agents().len(), "two agents share a cell");
        assert!(cells.iter().all(|p| p.in_bounds(world.grid_size())));
    }

    // Scenario A
    #[tokio::test]
    async fn seeded_reset_is_deterministic_and_step_seals() {
        let mut first = Simulation::new(StubOracle::new());
        let mut second = Simulation::new(StubOracle::new());
        let a = first.reset(params(2, false)).unwrap();
        let b = second.reset(params(2, false)).unwrap();
        assert_eq!(a.agents, b.agents);
        assert_ne!(
            a.agents.first().unwrap().position,
            a.agents.get(1).unwrap().position
        );
        assert_eq!(a.turn, 0);
        assert!(!a.player_agent);

        let record = completed(first.step().await.unwrap());
        assert_eq!(record.turn, 1);
        assert_eq!(record.debug.len(), 2);
        assert!(record.debug.iter().all(|t| t.source == DecisionSource::Oracle));
        assert_eq!(first.history().len(), 1);
    }

    // Scenario B
    #[tokio::test]
    async fn player_slot_suspends_and_resumes() {
        let mut sim = Simulation::new(StubOracle::new());
        let snapshot = sim.reset(params(2, true)).unwrap();
        assert!(snapshot.player_agent);

        let request = awaiting(sim.step().await.unwrap());
        assert_eq!(request.agent, "agent2");
        assert_eq!(request.turn, 1);
        assert_eq!(request.legal_actions.as_slice().first(), Some(&LegalAction::Wait));
        assert_eq!(request.debug.len(), 2);
        assert_eq!(request.profile.as_ref().unwrap().title, "Player");
        assert!(sim.snapshot().unwrap().awaiting_player);
        assert_eq!(
            sim.state(),
            TurnState::AwaitingPlayer {
                turn: 1,
                agent: String::from("agent2")
            }
        );

        assert_eq!(sim.step().await, Err(SimulationError::ReentrantTurnStart));
        assert!(sim.history().is_empty());

        let record = completed(sim.apply_player_action(&json!({"action": "wait"})).await.unwrap());
        assert_eq!(record.turn, 1);
        assert_eq!(sim.history().len(), 1);
        assert_eq!(sim.state(), TurnState::Idle);

        let trace = record.debug.get(1).unwrap();
        assert_eq!(trace.source, DecisionSource::Player);
        assert_eq!(trace.action, Some(Action::Wait));
        assert!(trace.response.is_some());
        assert_eq!(trace.notes, vec![String::from("Waited.")]);
    }

    // Scenario C
    #[tokio::test]
    async fn talk_between_adjacent_agents_reaches_inbox() {
        let oracle = ScriptedOracle::new([
            r#"I'll say hello. {"action": "talk", "target": "agent2", "message": "hi"}"#,
            WAIT,
        ]);
        let mut sim = placed(oracle, &[(0, 0), (1, 0)], false);

        let record = completed(sim.step().await.unwrap());
        let expected = ConversationEntry {
            from: String::from("agent1"),
            to: String::from("agent2"),
            message: String::from("hi"),
            turn: 1,
        };
        assert_eq!(record.messages, vec![expected.clone()]);
        assert_eq!(sim.snapshot().unwrap().messages, vec![expected]);

        // agent2 read the message at the start of its own slot
        let seen = sim.oracle().seen();
        assert_eq!(
            seen.get(1).unwrap().message,
            Some(AgentInbox {
                from: String::from("agent1"),
                message: String::from("hi"),
            })
        );
        assert!(sim.world().unwrap().agent("agent2").unwrap().inbox.is_none());
        assert_eq!(
            record.debug.first().unwrap().notes,
            vec![String::from("Spoke to agent2.")]
        );
    }

    #[tokio::test]
    async fn inbox_waits_until_the_next_slot_then_clears() {
        // agent2 speaks after agent1 has acted, so agent1 hears it next turn
        let oracle = ScriptedOracle::new([
            WAIT,
            r#"{"action": "talk", "target": "agent1", "message": "over here"}"#,
            WAIT,
            WAIT,
            WAIT,
            WAIT,
        ]);
        let mut sim = placed(oracle, &[(0, 0), (1, 0)], false);

        completed(sim.step().await.unwrap());
        assert_eq!(
            sim.world().unwrap().agent("agent1").unwrap().inbox,
            Some(AgentInbox {
                from: String::from("agent2"),
                message: String::from("over here"),
            })
        );

        completed(sim.step().await.unwrap());
        completed(sim.step().await.unwrap());
        let seen = sim.oracle().seen();
        assert!(seen.get(2).unwrap().message.is_some());
        assert!(seen.get(4).unwrap().message.is_none());
    }

    // Scenario D
    #[tokio::test]
    async fn move_into_occupied_cell_is_blocked() {
        let oracle = ScriptedOracle::new([r#"{"action": "move", "direction": "right"}"#, WAIT]);
        let mut sim = placed(oracle, &[(0, 0), (1, 0)], false);

        let record = completed(sim.step().await.unwrap());
        let trace = record.debug.first().unwrap();
        // right is not in the legal set, so enforcement already turns it into Wait
        assert_eq!(trace.action, Some(Action::Wait));
        assert_eq!(
            trace.notes,
            vec![
                String::from("Illegal move rejected for agent1 (right is blocked)"),
                String::from("Waited.")
            ]
        );
        assert_eq!(
            record.positions.get("agent1"),
            Some(&Position::new(0, 0))
        );
    }

    #[tokio::test]
    async fn move_blocked_by_earlier_agent_in_same_turn() {
        // agent1 and agent2 both want (1, 1); agent1 moves first
        let oracle = ScriptedOracle::new([
            r#"{"action": "move", "direction": "down"}"#,
            r#"{"action": "move", "direction": "left"}"#,
        ]);
        let mut sim = placed(oracle, &[(1, 0), (2, 1)], false);

        let record = completed(sim.step().await.unwrap());
        assert_eq!(record.positions.get("agent1"), Some(&Position::new(1, 1)));
        assert_eq!(record.positions.get("agent2"), Some(&Position::new(2, 1)));
        // agent2's legal set was computed after agent1 moved, so left is illegal
        let trace = record.debug.get(1).unwrap();
        assert_eq!(trace.action, Some(Action::Wait));
        assert!(!trace.legal_actions.allows_move(Direction::Left));
        assert_board_is_consistent(&sim);
    }

    #[tokio::test]
    async fn undecodable_reply_waits_with_note() {
        let oracle = ScriptedOracle::new(["no idea, sorry", WAIT]);
        let mut sim = placed(oracle, &[(0, 0), (2, 2)], false);

        let record = completed(sim.step().await.unwrap());
        let trace = record.debug.first().unwrap();
        assert_eq!(trace.action, Some(Action::Wait));
        assert_eq!(trace.response.as_deref(), Some("no idea, sorry"));
        assert!(trace.notes.first().unwrap().contains("not understood"));
        assert_eq!(trace.notes.last().unwrap(), "Waited.");
    }

    #[tokio::test]
    async fn illegal_talk_is_rejected() {
        let oracle = ScriptedOracle::new([
            r#"{"action": "talk", "target": "agent2", "message": "hello?"}"#,
            WAIT,
        ]);
        let mut sim = placed(oracle, &[(0, 0), (2, 2)], false);

        let record = completed(sim.step().await.unwrap());
        assert!(record.messages.is_empty());
        assert_eq!(
            record.debug.first().unwrap().notes.first().map(String::as_str),
            Some("Illegal talk rejected for agent1")
        );
    }

    #[tokio::test]
    async fn transport_failure_keeps_earlier_slots_and_skips_history() {
        let oracle = ScriptedOracle::new([r#"{"action": "move", "direction": "down"}"#])
            .then_fail("connection refused");
        let mut sim = placed(oracle, &[(0, 0), (2, 2)], false);

        let err = sim.step().await.unwrap_err();
        assert_eq!(
            err,
            SimulationError::OracleTransport {
                agent: String::from("agent2"),
                source: OracleError::Transport(String::from("connection refused")),
            }
        );
        assert!(sim.history().is_empty());
        assert_eq!(sim.state(), TurnState::Idle);
        // agent1's move stays applied
        assert_eq!(
            sim.world().unwrap().position_of("agent1").unwrap(),
            Position::new(0, 1)
        );

        // the next turn runs normally and takes the next number
        let record = completed(sim.step().await.unwrap());
        assert_eq!(record.turn, 2);
        assert_eq!(sim.history().len(), 1);
    }

    #[tokio::test]
    async fn empty_reply_is_a_transport_failure() {
        let oracle = ScriptedOracle::new(["   "]);
        let mut sim = placed(oracle, &[(0, 0), (2, 2)], false);
        let err = sim.step().await.unwrap_err();
        assert_eq!(
            err,
            SimulationError::OracleTransport {
                agent: String::from("agent1"),
                source: OracleError::EmptyReply {
                    agent: String::from("agent1")
                },
            }
        );
    }

    #[tokio::test]
    async fn operations_before_reset_fail() {
        let mut sim = Simulation::new(StubOracle::new());
        assert_eq!(sim.step().await, Err(SimulationError::NotInitialized));
        assert_eq!(
            sim.apply_player_action(&json!({})).await,
            Err(SimulationError::NotInitialized)
        );
        assert_eq!(sim.snapshot(), Err(SimulationError::NotInitialized));
        assert!(sim.history().is_empty());
        assert_eq!(sim.state(), TurnState::NotInitialized);
    }

    #[tokio::test]
    async fn player_action_without_pending_turn_fails() {
        let mut sim = Simulation::new(StubOracle::new());
        sim.reset(params(2, true)).unwrap();
        assert_eq!(
            sim.apply_player_action(&json!({"action": "wait"})).await,
            Err(SimulationError::NoPendingPlayerDecision)
        );
    }

    #[tokio::test]
    async fn invalid_player_input_leaves_turn_pending() {
        let mut sim = placed(StubOracle::new(), &[(0, 0), (2, 2)], true);
        let before = awaiting(sim.step().await.unwrap());

        let err = sim
            .apply_player_action(&json!({"action": "talk", "target": "agent1"}))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SimulationError::PlayerInputInvalid {
                source: PlayerInputError::IllegalTarget(String::from("agent1"))
            }
        );
        assert_eq!(sim.pending(), Some(&before));
        assert!(sim.history().is_empty());

        let err = sim.apply_player_action(&json!(["wait"])).await.unwrap_err();
        assert!(matches!(err, SimulationError::PlayerInputInvalid { .. }));

        let record = completed(
            sim.apply_player_action(&json!({"action": "move", "direction": "up"}))
                .await
                .unwrap(),
        );
        assert_eq!(record.positions.get("agent2"), Some(&Position::new(2, 1)));
    }

    #[tokio::test]
    async fn player_talk_defaults_to_greeting() {
        let mut sim = placed(StubOracle::new(), &[(0, 0), (1, 0)], true);
        let request = awaiting(sim.step().await.unwrap());
        assert!(request.legal_actions.talk_entry("agent1").is_some());

        let record = completed(
            sim.apply_player_action(&json!({"action": "talk", "target": "agent1"}))
                .await
                .unwrap(),
        );
        let entry = record.messages.first().unwrap();
        assert_eq!(entry.from, "agent2");
        assert_eq!(entry.message, "Hey Alex, let's keep moving!");
    }

    #[tokio::test]
    async fn resume_continues_with_later_agents() {
        // agent10 sorts before agent2, so the player slot is second of ten
        let mut sim = Simulation::new(ScriptedOracle::default());
        sim.reset(ResetParams {
            grid_size: 4,
            num_agents: 10,
            seed: Some(3),
            player_agent: true,
        })
        .unwrap();

        let request = awaiting(sim.step().await.unwrap());
        assert_eq!(request.agent, "agent10");
        assert_eq!(request.debug.len(), 2);
        assert_eq!(sim.oracle().seen().len(), 1);

        let record = completed(sim.apply_player_action(&json!({})).await.unwrap());
        assert_eq!(record.debug.len(), 10);
        assert_eq!(sim.oracle().seen().len(), 9);
        let order: Vec<&str> = record.debug.iter().map(|t| t.agent.as_str()).collect();
        let mut sorted = order.clone();
        sorted.sort_unstable();
        assert_eq!(order, sorted);
    }

    #[tokio::test]
    async fn history_counts_only_sealed_turns() {
        let mut sim = Simulation::new(StubOracle::new());
        sim.reset(params(2, true)).unwrap();
        for sealed in 0..3_usize {
            awaiting(sim.step().await.unwrap());
            assert_eq!(sim.history().len(), sealed);
            completed(sim.apply_player_action(&json!({"action": "wait"})).await.unwrap());
            assert_eq!(sim.history().len(), sealed.saturating_add(1));
        }
        let turns: Vec<u64> = sim.history().iter().map(|r| r.turn).collect();
        assert_eq!(turns, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn board_stays_consistent_over_many_turns() {
        let moves = ["up", "down", "left", "right"];
        let script: Vec<String> = (0..60)
            .map(|i| {
                let direction = moves.get(i % moves.len()).unwrap();
                format!(r#"{{"action": "move", "direction": "{direction}"}}"#)
            })
            .collect();
        let mut sim = Simulation::new(ScriptedOracle::new(script));
        sim.reset(ResetParams {
            grid_size: 3,
            num_agents: 4,
            seed: Some(9),
            player_agent: false,
        })
        .unwrap();
        for _ in 0..15 {
            completed(sim.step().await.unwrap());
            assert_board_is_consistent(&sim);
        }
        assert_eq!(sim.history().len(), 15);
    }

    #[test]
    fn reset_rejects_impossible_worlds() {
        let mut sim = Simulation::new(StubOracle::new());
        assert!(matches!(
            sim.reset(params(1, false)),
            Err(SimulationError::InvalidSetup(_))
        ));
        assert!(matches!(
            sim.reset(ResetParams {
                grid_size: 0,
                ..params(2, false)
            }),
            Err(SimulationError::InvalidSetup(_))
        ));
        assert!(matches!(
            sim.reset(params(10, false)),
            Err(SimulationError::InvalidSetup(_))
        ));
        assert_eq!(sim.state(), TurnState::NotInitialized);
    }

    #[tokio::test]
    async fn reset_discards_pending_turn() {
        let mut sim = Simulation::new(StubOracle::new());
        sim.reset(params(2, true)).unwrap();
        awaiting(sim.step().await.unwrap());
        let snapshot = sim.reset(params(2, true)).unwrap();
        assert_eq!(snapshot.turn, 0);
        assert!(!snapshot.awaiting_player);
        assert_eq!(sim.state(), TurnState::Idle);
    }

    #[test]
    fn reset_rejects_huge_agent_counts_before_naming_them() {
        let mut sim = Simulation::new(StubOracle::new());
        let result = sim.reset(ResetParams {
            grid_size: 1,
            num_agents: 1 << 40,
            seed: Some(1),
            player_agent: false,
        });
        assert_eq!(
            result,
            Err(SimulationError::InvalidSetup(String::from(
                "a 1x1 grid cannot hold 1099511627776 agents"
            )))
        );
        assert_eq!(sim.state(), TurnState::NotInitialized);
    }

    #[test]
    fn reset_accepts_grids_wider_than_u16() {
        let mut sim = Simulation::new(StubOracle::new());
        let snapshot = sim
            .reset(ResetParams {
                grid_size: 100_000,
                num_agents: 2,
                seed: Some(1),
                player_agent: false,
            })
            .unwrap();
        assert_eq!(snapshot.grid_size, 100_000);
        assert!(snapshot.agents.iter().all(|a| a.position.in_bounds(100_000)));
        assert_board_is_consistent(&sim);
    }

    #[tokio::test]
    async fn failed_player_apply_keeps_turn_pending() {
        let mut sim = placed(StubOracle::new(), &[(0, 0), (2, 2)], true);
        let before = awaiting(sim.step().await.unwrap());

        // Swap in a board without the interactive agent so applying fails.
        let board = GridWorld::new(
            3,
            [
                (String::from("agent1"), Position::new(0, 0)),
                (String::from("agent3"), Position::new(2, 2)),
            ],
        )
        .unwrap();
        sim.session.as_mut().unwrap().world = board;

        let result = sim.apply_player_action(&json!({"action": "wait"})).await;
        assert_eq!(
            result,
            Err(SimulationError::World {
                source: WorldError::AgentNotFound(String::from("agent2"))
            })
        );
        assert_eq!(sim.pending(), Some(&before));
        assert_eq!(
            sim.state(),
            TurnState::AwaitingPlayer {
                turn: 1,
                agent: String::from("agent2")
            }
        );
        assert!(sim.history().is_empty());
    }
}
