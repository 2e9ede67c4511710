//! Session API server for the grid sandbox simulation.
//!
//! This crate provides an Axum HTTP server through which callers create
//! sessions, advance turns, answer pending player decisions, and read
//! session state. Each session owns one [`Simulation`] behind its own async
//! mutex, so concurrent requests to one session are serialized while
//! separate sessions proceed independently.
//!
//! [`Simulation`]: sandbox_core::Simulation

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use router::build_router;
pub use server::{ServerError, start_server};
pub use state::AppState;
