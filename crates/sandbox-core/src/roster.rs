//! Agent naming and display profiles.
//!
//! Agents are named `agent1` through `agentN`. Profiles come from a fixed
//! persona pool, cycling when there are more agents than personas. When the
//! interactive slot is enabled it belongs to the last agent, `agentN`, whose
//! profile is replaced by the player profile.

use std::collections::BTreeMap;

use sandbox_types::{AgentProfile, Controller};

/// Display title of the interactive agent.
pub const PLAYER_TITLE: &str = "Player";

const PLAYER_PERSONA: &str = "You are the human player guiding the party's plans.";

const PERSONA_POOL: [(&str, &str); 5] = [
    (
        "Alex",
        "You are Alex, an engineer from Sapporo who loves seaside towns and bustling markets.",
    ),
    (
        "Blair",
        "You are Blair, an adventurer from Kyoto who enjoys mountain hikes, hot springs, and photography.",
    ),
    (
        "Kai",
        "You are Kai, a travelling arcane researcher who studies starlit skies and ancient manuscripts.",
    ),
    (
        "Mira",
        "You are Mira, a ranger honed by the forest with keen insight and swift judgement.",
    ),
    (
        "Ren",
        "You are Ren, a tinkerer who cannot resist dismantling mysterious devices to learn their secrets.",
    ),
];

/// The agents of one session and how each is controlled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roster {
    names: Vec<String>,
    profiles: BTreeMap<String, AgentProfile>,
    interactive: Option<String>,
}

impl Roster {
    /// Name `num_agents` agents and assign their profiles.
    pub fn new(num_agents: usize, player_agent: bool) -> Self {
        let names: Vec<String> = (1..=num_agents).map(|i| format!("agent{i}")).collect();
        let mut profiles: BTreeMap<String, AgentProfile> = names
            .iter()
            .zip(PERSONA_POOL.iter().cycle())
            .map(|(name, (title, persona))| {
                (
                    name.clone(),
                    AgentProfile {
                        title: (*title).to_owned(),
                        persona: (*persona).to_owned(),
                    },
                )
            })
            .collect();

        let interactive = names.last().filter(|_| player_agent).cloned();
        if let Some(name) = &interactive {
            profiles.insert(
                name.clone(),
                AgentProfile {
                    title: PLAYER_TITLE.to_owned(),
                    persona: PLAYER_PERSONA.to_owned(),
                },
            );
        }

        Self {
            names,
            profiles,
            interactive,
        }
    }

    /// Agent names in creation order (`agent1` first).
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Every agent's profile, keyed by name.
    pub const fn profiles(&self) -> &BTreeMap<String, AgentProfile> {
        &self.profiles
    }

    /// One agent's profile.
    pub fn profile(&self, name: &str) -> Option<&AgentProfile> {
        self.profiles.get(name)
    }

    /// One agent's display title.
    pub fn title_of(&self, name: &str) -> Option<String> {
        self.profile(name).map(|p| p.title.clone())
    }

    /// Name of the interactive agent, if the slot is enabled.
    pub fn interactive_agent(&self) -> Option<&str> {
        self.interactive.as_deref()
    }

    /// How the named agent's decisions are obtained.
    pub fn controller_of(&self, name: &str) -> Controller {
        if self.interactive.as_deref() == Some(name) {
            Controller::Interactive
        } else {
            Controller::Autonomous
        }
    }
}
