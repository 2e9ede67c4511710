//! Random decision source for offline runs and tests.
//!
//! Picks a uniformly random entry from the legal set and answers in the
//! same JSON shape a language model is asked for, so replies exercise the
//! normal decode path.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use sandbox_core::{Oracle, OracleError};
use sandbox_types::{LegalAction, Observation};
use serde_json::json;

/// A seeded random oracle.
#[derive(Debug, Clone)]
pub struct MockOracle {
    rng: StdRng,
}

impl MockOracle {
    /// Create a mock oracle. The same seed yields the same choices.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = seed.map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
        Self { rng }
    }

    /// Choose a legal entry and render it as a reply.
    pub fn pick(&mut self, observation: &Observation) -> String {
        let reply = match observation.legal_actions.as_slice().choose(&mut self.rng) {
            Some(LegalAction::Move { direction }) => {
                json!({"action": "move", "direction": direction})
            }
            Some(LegalAction::Talk {
                target,
                target_title,
            }) => {
                let name = target_title.as_deref().unwrap_or(target);
                json!({
                    "action": "talk",
                    "target": target,
                    "message": format!("Hey {name}, let's keep moving!"),
                })
            }
            Some(LegalAction::Wait) | None => json!({"action": "wait"}),
        };
        reply.to_string()
    }
}

impl Oracle for MockOracle {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn decide(&mut self, observation: &Observation) -> Result<String, OracleError> {
        Ok(self.pick(observation))
    }
}
