//! Shared type definitions for the grid sandbox simulation.
//!
//! This crate is the single source of truth for every value that crosses a
//! crate boundary: grid geometry, actions and legal action sets, per-turn
//! records, observations handed to decision oracles, and the snapshots and
//! pending requests returned to session callers. Types flow downstream to
//! `TypeScript` via `ts-rs` for the browser front end.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers (session identifiers)
//! - [`grid`] -- [`Position`] and [`Direction`] with bounds-checked stepping
//! - [`actions`] -- [`Action`], [`LegalAction`], [`LegalActionSet`], [`ActionOutcome`]
//! - [`records`] -- Conversation entries, debug traces, sealed turn records
//! - [`observation`] -- Oracle observations, snapshots, pending player requests

pub mod actions;
pub mod grid;
pub mod ids;
pub mod observation;
pub mod records;

// Re-export all public types at crate root for convenience.
pub use actions::{Action, ActionOutcome, LegalAction, LegalActionSet};
pub use grid::{Direction, Position};
pub use ids::SessionId;
pub use observation::{
    AgentProfile, AgentView, Controller, Observation, PendingPlayerRequest, StepOutcome,
    WorldSnapshot,
};
pub use records::{AgentInbox, ConversationEntry, DebugTrace, DecisionSource, TurnRecord};
