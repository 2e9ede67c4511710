//! Prompt rendering for the text-generating backends.
//!
//! Uses `minijinja` to build a system message (persona plus teammate
//! roster plus response rules) and a user message (the observation as
//! JSON). Both templates are built in; a templates directory may override
//! either by providing `system.j2` or `decision.j2`.

use std::path::Path;

use minijinja::{Environment, context};
use sandbox_types::Observation;

use crate::error::BackendError;

const SYSTEM_TEMPLATE: &str = "\
{{ persona }} Your teammates are {{ roster }}. \
Speak like a friendly adventurer in the first person. \
When you choose a talk action, pick a character from legal_actions and greet them by name \
in a short paragraph of natural English. \
Do not mention being an AI, and do not add third-person commentary or summaries. \
Avoid bullet points and tool usage; respond with empathy, questions, or suggestions. \
Select exactly one option from legal_actions and return JSON in the form \
{\"action\": ..., \"direction\"|\"target\"|\"message\": ...}. \
For move set direction, for talk set target and message, and for wait omit the other fields.";

const DECISION_TEMPLATE: &str = "\
You will receive the current situation and the available legal actions as JSON. \
Choose exactly one entry from legal_actions and respond only with the specified JSON shape.
{{ observation }}";

const FALLBACK_PERSONA: &str = "You are an adventurer on a small grid.";

/// A rendered prompt ready to send to a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    /// The system message.
    pub system: String,
    /// The user message.
    pub user: String,
}

impl RenderedPrompt {
    /// Flatten into a single transcript for backends that take one string.
    pub fn flatten(&self) -> String {
        format!(
            "System: {}\nUser: {}\nAssistant:",
            self.system.trim(),
            self.user.trim()
        )
    }
}

/// Template engine for rendering decision prompts.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    /// Create an engine with the built-in templates, applying any
    /// `system.j2` / `decision.j2` overrides found in `templates_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Template`] if an override cannot be read or
    /// does not parse.
    pub fn new(templates_dir: Option<&Path>) -> Result<Self, BackendError> {
        let mut env = Environment::new();
        env.add_template("system", SYSTEM_TEMPLATE)
            .map_err(|e| BackendError::Template(format!("system: {e}")))?;
        env.add_template("decision", DECISION_TEMPLATE)
            .map_err(|e| BackendError::Template(format!("decision: {e}")))?;

        if let Some(dir) = templates_dir {
            for name in ["system", "decision"] {
                let path = dir.join(format!("{name}.j2"));
                if !path.exists() {
                    continue;
                }
                let source = std::fs::read_to_string(&path).map_err(|e| {
                    BackendError::Template(format!("failed to read {}: {e}", path.display()))
                })?;
                env.add_template_owned(name.to_owned(), source)
                    .map_err(|e| BackendError::Template(format!("{name}.j2: {e}")))?;
            }
        }

        Ok(Self { env })
    }

    /// Render the system and user messages for one observation.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] if the observation cannot be serialized or
    /// a template fails to render.
    pub fn render(&self, observation: &Observation) -> Result<RenderedPrompt, BackendError> {
        let persona = observation
            .traits
            .get(&observation.you)
            .map_or(FALLBACK_PERSONA, |p| p.persona.as_str());
        let roster = teammate_roster(observation);
        let observation_json = serde_json::to_string(observation)?;

        let system = self
            .env
            .get_template("system")
            .and_then(|t| {
                t.render(context! {
                    persona => persona,
                    roster => roster,
                    you => &observation.you,
                    turn => observation.turn,
                })
            })
            .map_err(|e| BackendError::Template(format!("system: {e}")))?;

        let user = self
            .env
            .get_template("decision")
            .and_then(|t| {
                t.render(context! {
                    observation => observation_json,
                    you => &observation.you,
                    turn => observation.turn,
                })
            })
            .map_err(|e| BackendError::Template(format!("decision: {e}")))?;

        Ok(RenderedPrompt { system, user })
    }
}

/// Every other agent as `Title (name)`, joined by commas.
fn teammate_roster(observation: &Observation) -> String {
    let teammates: Vec<String> = observation
        .traits
        .iter()
        .filter(|(name, _)| **name != observation.you)
        .map(|(name, profile)| format!("{} ({name})", profile.title))
        .collect();
    if teammates.is_empty() {
        String::from("nobody yet")
    } else {
        teammates.join(", ")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use sandbox_types::{AgentProfile, Direction, LegalActionSet, Position};

    use super::*;

    fn observation() -> Observation {
        let traits = BTreeMap::from([
            (
                String::from("agent1"),
                AgentProfile {
                    title: String::from("Alex"),
                    persona: String::from("You are Alex, an engineer."),
                },
            ),
            (
                String::from("agent2"),
                AgentProfile {
                    title: String::from("Blair"),
                    persona: String::from("You are Blair, an adventurer."),
                },
            ),
        ]);
        Observation {
            you: String::from("agent1"),
            positions: BTreeMap::from([
                (String::from("agent1"), Position::new(0, 0)),
                (String::from("agent2"), Position::new(1, 0)),
            ]),
            grid_size: 3,
            turn: 4,
            legal_actions: LegalActionSet::new([Direction::Down], [String::from("agent2")]),
            traits,
            message: None,
        }
    }

    #[test]
    fn builtin_templates_render_persona_roster_and_observation() {
        let engine = PromptEngine::new(None).unwrap();
        let prompt = engine.render(&observation()).unwrap();
        assert!(prompt.system.starts_with("You are Alex, an engineer."));
        assert!(prompt.system.contains("Your teammates are Blair (agent2)."));
        assert!(!prompt.system.contains("Alex (agent1)"));
        assert!(prompt.user.contains("\"legal_actions\""));
        assert!(prompt.user.contains("\"turn\":4"));
    }

    #[test]
    fn observation_json_is_not_escaped() {
        let engine = PromptEngine::new(None).unwrap();
        let prompt = engine.render(&observation()).unwrap();
        assert!(prompt.user.contains("{\"you\":\"agent1\""));
    }

    #[test]
    fn flatten_joins_roles() {
        let prompt = RenderedPrompt {
            system: String::from(" sys "),
            user: String::from("usr\n"),
        };
        assert_eq!(prompt.flatten(), "System: sys\nUser: usr\nAssistant:");
    }

    #[test]
    fn directory_overrides_replace_builtin_templates() {
        let dir = std::env::temp_dir().join(format!("sandbox_prompt_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("decision.j2"), "Turn {{ turn }} for {{ you }}").unwrap();

        let engine = PromptEngine::new(Some(&dir)).unwrap();
        let prompt = engine.render(&observation()).unwrap();
        assert_eq!(prompt.user, "Turn 4 for agent1");
        assert!(prompt.system.contains("Blair (agent2)"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn broken_override_is_a_template_error() {
        let dir = std::env::temp_dir().join(format!("sandbox_prompt_bad_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("system.j2"), "{{ unclosed").unwrap();

        let result = PromptEngine::new(Some(&dir));
        assert!(matches!(result, Err(BackendError::Template(_))));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
