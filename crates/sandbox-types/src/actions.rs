//! Actions an agent can take in one slot, and the legal set offered to it.
//!
//! Both [`Action`] and [`LegalAction`] serialize as flat tagged records
//! matching the oracle wire shape:
//!
//! ```json
//! {"action": "wait"}
//! {"action": "move", "direction": "up"}
//! {"action": "talk", "target": "agent2", "message": "hi"}
//! ```

use core::fmt;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::grid::{Direction, Position};

/// A structured action, already decoded and ready to be applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "action", rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum Action {
    /// Do nothing this slot.
    Wait,
    /// Step one cell in a direction.
    Move {
        /// The direction of the step.
        direction: Direction,
    },
    /// Speak to an orthogonally adjacent agent.
    Talk {
        /// Name of the addressed agent.
        target: String,
        /// Message body.
        message: String,
    },
}

impl Action {
    /// The wire name of the active variant (`wait`, `move`, `talk`).
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Wait => "wait",
            Self::Move { .. } => "move",
            Self::Talk { .. } => "talk",
        }
    }
}

/// One entry of a legal action set.
///
/// `Talk` entries name a target but carry no message; the message is chosen
/// by whoever decides. `target_title` is the target's display title, shown
/// to oracles and players so they can address the target by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "action", rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum LegalAction {
    /// Waiting is always legal.
    Wait,
    /// A step into an open, in-bounds, unoccupied neighbor cell.
    Move {
        /// The direction of the step.
        direction: Direction,
    },
    /// Talking to an orthogonally adjacent agent.
    Talk {
        /// Name of the adjacent agent.
        target: String,
        /// Display title of the adjacent agent, when known.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        #[ts(optional)]
        target_title: Option<String>,
    },
}

/// The ordered legal actions for one agent at the start of its slot.
///
/// Always begins with `Wait`, followed by `Move` entries in
/// [`Direction::ALL`] order, followed by `Talk` entries in agent order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct LegalActionSet(Vec<LegalAction>);

impl LegalActionSet {
    /// Build a legal set from move directions and talk targets.
    ///
    /// `Wait` is always prepended, so the set is never empty.
    pub fn new(
        moves: impl IntoIterator<Item = Direction>,
        talk_targets: impl IntoIterator<Item = String>,
    ) -> Self {
        let mut entries = vec![LegalAction::Wait];
        entries.extend(moves.into_iter().map(|direction| LegalAction::Move { direction }));
        entries.extend(talk_targets.into_iter().map(|target| LegalAction::Talk {
            target,
            target_title: None,
        }));
        Self(entries)
    }

    /// The entries in order.
    pub fn as_slice(&self) -> &[LegalAction] {
        &self.0
    }

    /// Iterate over the entries in order.
    pub fn iter(&self) -> core::slice::Iter<'_, LegalAction> {
        self.0.iter()
    }

    /// Number of entries (at least 1).
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`: `Wait` is always present.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether a move in `direction` is legal.
    pub fn allows_move(&self, direction: Direction) -> bool {
        self.0
            .iter()
            .any(|entry| matches!(entry, LegalAction::Move { direction: d } if *d == direction))
    }

    /// The `Talk` entry addressing `target`, if talking to it is legal.
    pub fn talk_entry(&self, target: &str) -> Option<&LegalAction> {
        self.0
            .iter()
            .find(|entry| matches!(entry, LegalAction::Talk { target: t, .. } if t == target))
    }

    /// Legal move directions in order.
    pub fn move_directions(&self) -> impl Iterator<Item = Direction> + '_ {
        self.0.iter().filter_map(|entry| match entry {
            LegalAction::Move { direction } => Some(*direction),
            _ => None,
        })
    }

    /// Legal talk targets in order.
    pub fn talk_targets(&self) -> impl Iterator<Item = &str> {
        self.0.iter().filter_map(|entry| match entry {
            LegalAction::Talk { target, .. } => Some(target.as_str()),
            _ => None,
        })
    }

    /// Attach display titles to `Talk` entries using `title_of`.
    pub fn annotate_titles(&mut self, title_of: impl Fn(&str) -> Option<String>) {
        for entry in &mut self.0 {
            if let LegalAction::Talk {
                target,
                target_title,
            } = entry
            {
                *target_title = title_of(target);
            }
        }
    }
}

impl<'a> IntoIterator for &'a LegalActionSet {
    type Item = &'a LegalAction;
    type IntoIter = core::slice::Iter<'a, LegalAction>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// What actually happened when an action was applied.
///
/// Kept on the agent for diagnostics and rendered into debug trace notes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "outcome", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ActionOutcome {
    /// The agent waited.
    Waited,
    /// The agent stepped into a new cell.
    Moved {
        /// The cell the agent now occupies.
        to: Position,
    },
    /// The destination was out of bounds or occupied at application time.
    Blocked {
        /// The attempted direction.
        toward: Direction,
    },
    /// The message was delivered to the target's inbox.
    Spoke {
        /// The agent that received the message.
        to: String,
    },
    /// The target was missing or no longer adjacent; nothing was delivered.
    TalkDropped {
        /// The addressed agent.
        target: String,
    },
}

impl fmt::Display for ActionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waited => f.write_str("Waited."),
            Self::Moved { to } => write!(f, "Moved to {to}."),
            Self::Blocked { .. } => f.write_str("Move blocked; stayed in place."),
            Self::Spoke { to } => write!(f, "Spoke to {to}."),
            Self::TalkDropped { .. } => f.write_str("Talk target invalid or not adjacent."),
        }
    }
}
