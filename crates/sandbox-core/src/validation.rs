//! Action validation: decoding oracle replies and checking legality.
//!
//! Two separate jobs live here and are never mixed:
//!
//! - [`decode_oracle_reply`] turns free-form oracle text into an [`Action`].
//!   Anything that cannot be decoded becomes [`Action::Wait`].
//! - [`enforce_legality`] checks a decoded action against the legal set
//!   computed at the start of the slot. An illegal oracle action also
//!   becomes [`Action::Wait`], with a note for the debug trace.
//!
//! Player input goes through [`validate_player_action`] instead, which
//! rejects bad input with a [`PlayerInputError`] rather than degrading it,
//! so the caller can resubmit.

use core::fmt;

use sandbox_types::{Action, Direction, LegalAction, LegalActionSet};
use serde_json::{Map, Value};
use tracing::warn;

/// Why an oracle reply could not be decoded.
///
/// Never surfaced as an error. The reply degrades to [`Action::Wait`] and
/// this reason is written into the slot's debug trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeFailure {
    /// No `{ ... }` span anywhere in the text.
    NoJsonObject,
    /// A span was found but is not valid JSON.
    InvalidJson(String),
    /// The JSON value is not an object.
    NotAnObject,
    /// `action` is missing or not one of `move`, `talk`, `wait`.
    UnknownAction(Option<String>),
    /// A `move` without a valid direction.
    MissingDirection,
    /// A `talk` without string `target` and `message`.
    MissingTalkFields,
}

impl fmt::Display for DecodeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoJsonObject => f.write_str("no JSON object in reply"),
            Self::InvalidJson(e) => write!(f, "invalid JSON: {e}"),
            Self::NotAnObject => f.write_str("reply is not a JSON object"),
            Self::UnknownAction(Some(a)) => write!(f, "unknown action '{a}'"),
            Self::UnknownAction(None) => f.write_str("missing action"),
            Self::MissingDirection => f.write_str("move without a valid direction"),
            Self::MissingTalkFields => f.write_str("talk without string target and message"),
        }
    }
}

/// The result of decoding one oracle reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDecision {
    /// The decoded action, or `Wait` on failure.
    pub action: Action,
    /// Set when the reply degraded to `Wait`.
    pub failure: Option<DecodeFailure>,
}

/// Decode free-form oracle text into an action.
///
/// Tries the trimmed text as JSON first, then the span from the first `{`
/// to the last `}`, so commentary around the object is tolerated. Every
/// failure degrades to [`Action::Wait`].
pub fn decode_oracle_reply(raw: &str) -> ParsedDecision {
    match try_decode(raw) {
        Ok(action) => ParsedDecision {
            action,
            failure: None,
        },
        Err(failure) => {
            warn!(reason = %failure, raw_response = raw, "undecodable oracle reply, waiting");
            ParsedDecision {
                action: Action::Wait,
                failure: Some(failure),
            }
        }
    }
}

fn try_decode(raw: &str) -> Result<Action, DecodeFailure> {
    let trimmed = raw.trim();

    // Strategy 1: the whole reply is the object
    if let Ok(value) = serde_json::from_str::<Value>(trimmed)
        && value.is_object()
    {
        return decode_value(&value);
    }

    // Strategy 2: the object is embedded in prose
    let block = extract_json_block(trimmed).ok_or(DecodeFailure::NoJsonObject)?;
    let value: Value = serde_json::from_str(block)
        .map_err(|e| DecodeFailure::InvalidJson(e.to_string()))?;
    decode_value(&value)
}

/// The greedy span from the first `{` to the last `}`.
fn extract_json_block(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    text.get(start..=end)
}

fn decode_value(value: &Value) -> Result<Action, DecodeFailure> {
    let obj = value.as_object().ok_or(DecodeFailure::NotAnObject)?;
    match obj.get("action").and_then(Value::as_str) {
        Some("wait") => Ok(Action::Wait),
        Some("move") => obj
            .get("direction")
            .and_then(Value::as_str)
            .and_then(Direction::from_name)
            .map(|direction| Action::Move { direction })
            .ok_or(DecodeFailure::MissingDirection),
        Some("talk") => match (string_field(obj, "target"), string_field(obj, "message")) {
            (Some(target), Some(message)) => Ok(Action::Talk {
                target: target.to_owned(),
                message: message.to_owned(),
            }),
            _ => Err(DecodeFailure::MissingTalkFields),
        },
        other => Err(DecodeFailure::UnknownAction(other.map(str::to_owned))),
    }
}

fn string_field<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Value::as_str)
}

/// Check a decoded oracle action against the slot's legal set.
///
/// A `Move` in a direction not offered, or a `Talk` to a target not
/// offered, becomes `Wait` and the returned note says why. `Wait` is always
/// legal.
pub fn enforce_legality(
    action: Action,
    legal: &LegalActionSet,
    agent: &str,
) -> (Action, Option<String>) {
    let rejected = match &action {
        Action::Wait => None,
        Action::Move { direction } => (!legal.allows_move(*direction))
            .then(|| format!("Illegal move rejected for {agent} ({direction} is blocked)")),
        Action::Talk { target, .. } => legal
            .talk_entry(target)
            .is_none()
            .then(|| format!("Illegal talk rejected for {agent}")),
    };
    match rejected {
        Some(note) => {
            warn!(agent, action = action.kind(), note = %note, "illegal oracle action, waiting");
            (Action::Wait, Some(note))
        }
        None => (action, None),
    }
}

/// Errors returned for invalid interactive input.
///
/// The simulation state is left untouched when one of these is returned,
/// so the same pending request can be answered again.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlayerInputError {
    /// The submitted action is not a JSON object.
    #[error("player action must be a JSON object")]
    NotAnObject,

    /// The `action` field names something other than `move`, `talk`, `wait`.
    #[error("unsupported player action '{0}'")]
    UnsupportedAction(String),

    /// The requested move direction is not in the legal set.
    #[error("direction '{direction}' not allowed for {agent}")]
    IllegalDirection {
        /// The interactive agent.
        agent: String,
        /// The submitted direction, as given.
        direction: String,
    },

    /// The requested talk target is not in the legal set.
    #[error("target '{0}' not available for talk")]
    IllegalTarget(String),
}

/// Validate an interactive participant's action against the frozen legal set.
///
/// A missing or `null` `action` means `Wait`. A `talk` with no usable
/// message gets a short greeting addressed to the target's display title.
///
/// # Errors
///
/// Returns [`PlayerInputError`] for non-object input, an unsupported action
/// name, or a direction or target outside the legal set.
pub fn validate_player_action(
    input: &Value,
    legal: &LegalActionSet,
    agent: &str,
) -> Result<Action, PlayerInputError> {
    let obj = input.as_object().ok_or(PlayerInputError::NotAnObject)?;
    let choice = obj.get("action").filter(|v| !v.is_null());
    match choice.map(|v| v.as_str().ok_or(v)) {
        None | Some(Ok("wait")) => Ok(Action::Wait),
        Some(Ok("move")) => {
            let requested = obj.get("direction");
            requested
                .and_then(Value::as_str)
                .and_then(Direction::from_name)
                .filter(|&d| legal.allows_move(d))
                .map(|direction| Action::Move { direction })
                .ok_or_else(|| PlayerInputError::IllegalDirection {
                    agent: agent.to_owned(),
                    direction: describe(requested),
                })
        }
        Some(Ok("talk")) => {
            let requested = obj.get("target");
            let entry = requested
                .and_then(Value::as_str)
                .and_then(|t| legal.talk_entry(t))
                .ok_or_else(|| PlayerInputError::IllegalTarget(describe(requested)))?;
            let LegalAction::Talk {
                target,
                target_title,
            } = entry
            else {
                return Err(PlayerInputError::IllegalTarget(describe(requested)));
            };
            let message = string_field(obj, "message")
                .filter(|m| !m.trim().is_empty())
                .map_or_else(
                    || {
                        let alias = target_title.as_deref().unwrap_or(target);
                        format!("Hey {alias}, let's keep moving!")
                    },
                    str::to_owned,
                );
            Ok(Action::Talk {
                target: target.clone(),
                message,
            })
        }
        Some(Ok(other)) => Err(PlayerInputError::UnsupportedAction(other.to_owned())),
        Some(Err(value)) => Err(PlayerInputError::UnsupportedAction(value.to_string())),
    }
}

/// Render a submitted field for an error message.
fn describe(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::from("none"),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
