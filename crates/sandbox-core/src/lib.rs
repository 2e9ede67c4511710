//! Turn resolution for the sandbox simulation.
//!
//! This crate owns the turn cycle that drives a session: each agent, in a
//! fixed order, receives an observation, produces a decision (from the
//! oracle, or from an interactive participant via suspension), and has that
//! decision validated and applied before the next agent acts. After the last
//! agent the turn is sealed into history.
//!
//! # Modules
//!
//! - [`channel`] -- Talk delivery between adjacent agents and the
//!   append-only history and conversation log.
//! - [`config`] -- Configuration loading from `sandbox-config.yaml` into
//!   strongly-typed structs.
//! - [`decision`] -- [`Oracle`] trait, [`ScriptedOracle`], and [`StubOracle`].
//! - [`roster`] -- Agent naming, display profiles, and the interactive slot.
//! - [`turn`] -- [`Simulation`], the per-session turn state machine.
//! - [`validation`] -- Oracle reply decoding, legality enforcement, and
//!   player input validation.
//!
//! [`Oracle`]: decision::Oracle
//! [`ScriptedOracle`]: decision::ScriptedOracle
//! [`StubOracle`]: decision::StubOracle
//! [`Simulation`]: turn::Simulation

pub mod channel;
pub mod config;
pub mod decision;
pub mod roster;
pub mod turn;
pub mod validation;

pub use config::{ConfigError, SandboxConfig};
pub use decision::{Oracle, OracleError, ScriptedOracle, StubOracle};
pub use turn::{ResetParams, Simulation, SimulationError, TurnState};
pub use validation::PlayerInputError;
