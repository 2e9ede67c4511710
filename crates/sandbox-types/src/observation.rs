//! Payloads exchanged with the outside world.
//!
//! [`Observation`] is what a decision oracle sees for one slot.
//! [`WorldSnapshot`], [`PendingPlayerRequest`], and [`StepOutcome`] are what
//! session callers receive.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::actions::LegalActionSet;
use crate::grid::Position;
use crate::records::{AgentInbox, ConversationEntry, DebugTrace, TurnRecord};

/// Display profile of an agent: a title to address it by and a persona
/// line for prompting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AgentProfile {
    /// Display title (e.g. `Alex`, `Player`).
    pub title: String,
    /// One-sentence persona used in the system prompt.
    pub persona: String,
}

/// Everything an oracle is shown for one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Observation {
    /// Name of the acting agent.
    pub you: String,
    /// Every agent's current position.
    pub positions: BTreeMap<String, Position>,
    /// Side length of the square grid.
    pub grid_size: u32,
    /// Current turn number.
    pub turn: u64,
    /// The legal actions for this slot.
    pub legal_actions: LegalActionSet,
    /// Display profiles of every agent.
    pub traits: BTreeMap<String, AgentProfile>,
    /// The inbox message consumed at the start of this slot, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub message: Option<AgentInbox>,
}

/// How an agent's decisions are obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum Controller {
    /// Decisions come from the oracle.
    Autonomous,
    /// Decisions are supplied by an external caller; the turn suspends.
    Interactive,
}

/// One agent as shown in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AgentView {
    /// Stable agent name.
    pub name: String,
    /// Current cell.
    pub position: Position,
    /// Who decides for this agent.
    pub controller: Controller,
}

/// Current state of one simulation, as returned by `reset` and `snapshot`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct WorldSnapshot {
    /// Number of the latest started turn (0 before the first step).
    pub turn: u64,
    /// Side length of the square grid.
    pub grid_size: u32,
    /// Agents in processing order.
    pub agents: Vec<AgentView>,
    /// Display profiles of every agent.
    pub traits: BTreeMap<String, AgentProfile>,
    /// The full conversation log.
    pub messages: Vec<ConversationEntry>,
    /// Name of the decision oracle backend.
    pub backend: String,
    /// Whether an interactive slot exists.
    pub player_agent: bool,
    /// Whether a turn is suspended waiting for the interactive participant.
    pub awaiting_player: bool,
}

/// A suspended turn's request for the interactive participant's decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PendingPlayerRequest {
    /// The turn in progress.
    pub turn: u64,
    /// Name of the interactive agent.
    pub agent: String,
    /// The legal set, frozen at suspension.
    pub legal_actions: LegalActionSet,
    /// Display profile of the interactive agent.
    pub profile: Option<AgentProfile>,
    /// The inbox message consumed at the start of this slot, if any.
    pub message: Option<AgentInbox>,
    /// Messages delivered earlier in this turn.
    pub turn_messages: Vec<ConversationEntry>,
    /// Traces of the slots processed so far, ending with this slot's skeleton.
    pub debug: Vec<DebugTrace>,
}

/// Result of advancing a turn: either sealed, or suspended on a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "status", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum StepOutcome {
    /// Every slot resolved and the turn was sealed into history.
    Completed(TurnRecord),
    /// The turn is suspended until the player's action is applied.
    AwaitingPlayer(PendingPlayerRequest),
}

impl StepOutcome {
    /// The sealed record, if the turn completed.
    pub const fn record(&self) -> Option<&TurnRecord> {
        match self {
            Self::Completed(record) => Some(record),
            Self::AwaitingPlayer(_) => None,
        }
    }

    /// The pending request, if the turn suspended.
    pub const fn pending(&self) -> Option<&PendingPlayerRequest> {
        match self {
            Self::Completed(_) => None,
            Self::AwaitingPlayer(request) => Some(request),
        }
    }
}
