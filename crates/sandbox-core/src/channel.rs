//! Talk delivery and the append-only history.
//!
//! A `Talk` is re-checked when it is applied, not when the legal set was
//! computed: an earlier agent in the same turn may have moved away. A talk
//! to an agent that is no longer adjacent is dropped without a fallback.

use sandbox_types::{ActionOutcome, AgentInbox, ConversationEntry, TurnRecord};
use sandbox_world::{GridWorld, WorldError};
use tracing::debug;

/// The result of applying one `Talk`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// What happened, for the debug trace.
    pub outcome: ActionOutcome,
    /// The transcript entry, present only when the message was delivered.
    pub entry: Option<ConversationEntry>,
}

/// Deliver `message` from `from` to `target` if they are adjacent now.
///
/// On delivery the target's inbox is overwritten with the message.
///
/// # Errors
///
/// Returns [`WorldError::AgentNotFound`] if the target vanishes between the
/// adjacency check and the inbox write, which cannot happen within a turn.
pub fn deliver_talk(
    world: &mut GridWorld,
    from: &str,
    target: &str,
    message: &str,
    turn: u64,
) -> Result<Delivery, WorldError> {
    if from == target || !world.are_adjacent(from, target) {
        debug!(turn, agent = from, target, "talk dropped, target not adjacent");
        return Ok(Delivery {
            outcome: ActionOutcome::TalkDropped {
                target: target.to_owned(),
            },
            entry: None,
        });
    }

    world.set_inbox(
        target,
        AgentInbox {
            from: from.to_owned(),
            message: message.to_owned(),
        },
    )?;
    debug!(turn, agent = from, target, "talk delivered");
    Ok(Delivery {
        outcome: ActionOutcome::Spoke {
            to: target.to_owned(),
        },
        entry: Some(ConversationEntry {
            from: from.to_owned(),
            to: target.to_owned(),
            message: message.to_owned(),
            turn,
        }),
    })
}

/// Sealed turn records plus the running conversation log.
///
/// Both are append-only for the lifetime of a session. A reset replaces the
/// whole value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct History {
    records: Vec<TurnRecord>,
    conversation: Vec<ConversationEntry>,
}

impl History {
    /// Create an empty history.
    pub const fn new() -> Self {
        Self {
            records: Vec::new(),
            conversation: Vec::new(),
        }
    }

    /// Sealed turns in order.
    pub fn records(&self) -> &[TurnRecord] {
        &self.records
    }

    /// Every delivered message in order.
    pub fn conversation(&self) -> &[ConversationEntry] {
        &self.conversation
    }

    /// Number of sealed turns.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no turn has been sealed yet.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Append a delivered message to the conversation log.
    pub fn log_message(&mut self, entry: ConversationEntry) {
        self.conversation.push(entry);
    }

    /// Append a completed turn and return a copy for the caller.
    pub fn seal(&mut self, record: TurnRecord) -> TurnRecord {
        self.records.push(record.clone());
        record
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use sandbox_types::{Direction, Position};

    use super::*;

    fn world() -> GridWorld {
        GridWorld::new(
            3,
            [
                (String::from("agent1"), Position::new(0, 0)),
                (String::from("agent2"), Position::new(1, 0)),
            ],
        )
        .unwrap()
    }

    #[test]
    fn adjacent_talk_fills_inbox() {
        let mut world = world();
        let delivery = deliver_talk(&mut world, "agent1", "agent2", "hi", 1).unwrap();
        assert_eq!(
            delivery.outcome,
            ActionOutcome::Spoke {
                to: String::from("agent2")
            }
        );
        assert_eq!(
            delivery.entry,
            Some(ConversationEntry {
                from: String::from("agent1"),
                to: String::from("agent2"),
                message: String::from("hi"),
                turn: 1,
            })
        );
        assert_eq!(
            world.agent("agent2").unwrap().inbox,
            Some(AgentInbox {
                from: String::from("agent1"),
                message: String::from("hi"),
            })
        );
    }

    #[test]
    fn talk_after_target_moved_away_is_dropped() {
        let mut world = world();
        world.apply_move("agent2", Direction::Right).unwrap();
        let delivery = deliver_talk(&mut world, "agent1", "agent2", "hi", 1).unwrap();
        assert_eq!(
            delivery.outcome,
            ActionOutcome::TalkDropped {
                target: String::from("agent2")
            }
        );
        assert!(delivery.entry.is_none());
        assert!(world.agent("agent2").unwrap().inbox.is_none());
    }

    #[test]
    fn talk_to_unknown_agent_is_dropped() {
        let mut world = world();
        let delivery = deliver_talk(&mut world, "agent1", "ghost", "hi", 1).unwrap();
        assert!(delivery.entry.is_none());
    }

    #[test]
    fn history_is_append_only() {
        let mut history = History::new();
        assert!(history.is_empty());
        let record = TurnRecord {
            turn: 1,
            positions: std::collections::BTreeMap::new(),
            messages: Vec::new(),
            debug: Vec::new(),
        };
        let sealed = history.seal(record.clone());
        assert_eq!(sealed, record);
        assert_eq!(history.len(), 1);
        assert_eq!(history.records().first(), Some(&record));
    }
}
