//! Messages, debug traces, and sealed turn records.
//!
//! Everything here is append-only once produced: conversation entries are
//! never edited, and a [`TurnRecord`] is immutable after the turn seals.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::actions::{Action, LegalActionSet};
use crate::grid::Position;

/// An undelivered message waiting in an agent's inbox.
///
/// An agent holds at most one; a new delivery overwrites the old one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AgentInbox {
    /// Name of the speaker.
    pub from: String,
    /// Message body.
    pub message: String,
}

/// One delivered `Talk`, as kept in the permanent transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ConversationEntry {
    /// Name of the speaker.
    pub from: String,
    /// Name of the listener.
    pub to: String,
    /// Message body.
    pub message: String,
    /// Turn during which the message was delivered.
    pub turn: u64,
}

/// Who supplied the decision for a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum DecisionSource {
    /// The autonomous decision oracle.
    Oracle,
    /// The interactive participant.
    Player,
}

/// Per-slot diagnostic entry.
///
/// An interactive slot's trace is appended as a skeleton (no `response`,
/// no `action`) when the turn suspends and filled in on resumption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct DebugTrace {
    /// The acting agent.
    pub agent: String,
    /// Where the decision came from.
    pub source: DecisionSource,
    /// The serialized observation presented for this slot.
    pub prompt: String,
    /// The legal set computed at the start of the slot.
    pub legal_actions: LegalActionSet,
    /// Raw oracle text or the player's submitted JSON.
    pub response: Option<String>,
    /// The action that was applied.
    pub action: Option<Action>,
    /// Degradation notes followed by the application outcome.
    pub notes: Vec<String>,
}

/// One fully resolved turn. Immutable once sealed into history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TurnRecord {
    /// Turn number, starting at 1.
    pub turn: u64,
    /// Every agent's position after the last slot.
    pub positions: BTreeMap<String, Position>,
    /// Conversation entries delivered during this turn.
    pub messages: Vec<ConversationEntry>,
    /// One trace per slot, in processing order.
    pub debug: Vec<DebugTrace>,
}
