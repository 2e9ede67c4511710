//! Error types for the `sandbox-world` crate.
//!
//! All fallible operations in this crate return [`WorldError`].

use sandbox_types::Position;

/// Errors that can occur while building or querying a grid world.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorldError {
    /// No agent with this name exists in the world.
    #[error("agent not found: {0}")]
    AgentNotFound(String),

    /// A starting position lies outside the grid.
    #[error("position {position} is outside a {grid_size}x{grid_size} grid")]
    OutOfBounds {
        /// The offending position.
        position: Position,
        /// Side length of the grid.
        grid_size: u32,
    },

    /// Two agents were placed on the same cell.
    #[error("cell {0} is already occupied")]
    CellOccupied(Position),

    /// Two agents share a name.
    #[error("duplicate agent name: {0}")]
    DuplicateAgent(String),

    /// More agents were requested than the grid has cells.
    #[error("a {grid_size}x{grid_size} grid cannot hold {agents} agents")]
    GridTooSmall {
        /// Side length of the grid.
        grid_size: u32,
        /// Number of agents requested.
        agents: usize,
    },
}
