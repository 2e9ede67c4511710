//! The grid world for the sandbox simulation.
//!
//! This crate owns the authoritative position store: where every agent
//! stands, what each agent is currently allowed to do, and what happens when
//! a move is applied. It knows nothing about oracles, prompts, or turns.
//!
//! # Modules
//!
//! - [`error`] -- Error types for grid operations.
//! - [`grid_world`] -- [`GridWorld`] and [`AgentState`]: seeded placement,
//!   occupancy and adjacency queries, legal-action enumeration, and move
//!   application against the current board.

pub mod error;
pub mod grid_world;

pub use error::WorldError;
pub use grid_world::{AgentState, GridWorld};
