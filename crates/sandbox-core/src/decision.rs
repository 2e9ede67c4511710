//! Decision source trait and simple in-process implementations.
//!
//! For every autonomous slot the turn cycle hands an [`Observation`] to an
//! [`Oracle`] and awaits free-form text in response. The [`Oracle`] trait
//! abstracts where that text comes from: an LLM over HTTP, a CLI subprocess,
//! a random mock, or a test script.
//!
//! The call is awaited to completion before the next agent acts. There is no
//! timeout here; an oracle that never answers stalls the turn.

use std::collections::VecDeque;
use std::future::Future;

use sandbox_types::Observation;

/// Errors raised when a decision source fails to respond.
///
/// Malformed replies are not errors; they degrade to `Wait` during
/// validation. These variants cover the oracle not answering at all.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    /// The network call or subprocess failed.
    #[error("oracle transport failed: {0}")]
    Transport(String),

    /// The oracle answered with no text.
    #[error("oracle returned an empty reply for {agent}")]
    EmptyReply {
        /// The agent whose slot was being decided.
        agent: String,
    },
}

/// A source of autonomous decisions.
///
/// `decide` returns the oracle's raw text. The caller decodes and validates
/// it; implementations must not try to repair or interpret replies.
pub trait Oracle {
    /// Short backend name shown in snapshots (e.g. `mock`, `gemini`).
    fn name(&self) -> &str;

    /// Produce a reply for one slot.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError`] if no reply could be obtained.
    fn decide(
        &mut self,
        observation: &Observation,
    ) -> impl Future<Output = Result<String, OracleError>> + Send;
}

/// A decision source that always waits.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubOracle;

impl StubOracle {
    /// Create a new stub oracle.
    pub const fn new() -> Self {
        Self
    }
}

impl Oracle for StubOracle {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn decide(&mut self, _observation: &Observation) -> Result<String, OracleError> {
        Ok(String::from(r#"{"action": "wait"}"#))
    }
}

/// A decision source that replays a fixed script of replies in order.
///
/// Once the script runs out every further slot waits. Each observation it
/// is shown is kept, so tests can inspect what an agent saw.
#[derive(Debug, Clone, Default)]
pub struct ScriptedOracle {
    replies: VecDeque<Result<String, OracleError>>,
    seen: Vec<Observation>,
}

impl ScriptedOracle {
    /// Create an oracle that answers with `replies` in order.
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: replies.into_iter().map(|r| Ok(r.into())).collect(),
            seen: Vec::new(),
        }
    }

    /// Queue a transport failure as the next reply.
    #[must_use]
    pub fn then_fail(mut self, message: &str) -> Self {
        self.replies
            .push_back(Err(OracleError::Transport(message.to_owned())));
        self
    }

    /// Queue another reply after the existing ones.
    #[must_use]
    pub fn then_reply(mut self, reply: &str) -> Self {
        self.replies.push_back(Ok(reply.to_owned()));
        self
    }

    /// Every observation shown so far, in order.
    pub fn seen(&self) -> &[Observation] {
        &self.seen
    }
}

impl Oracle for ScriptedOracle {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn decide(&mut self, observation: &Observation) -> Result<String, OracleError> {
        self.seen.push(observation.clone());
        self.replies
            .pop_front()
            .unwrap_or_else(|| Ok(String::from(r#"{"action": "wait"}"#)))
    }
}
