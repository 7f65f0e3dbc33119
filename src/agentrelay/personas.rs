//! The two stock agents shipped with the `agentrelay` binary.
//!
//! Each persona bundles an agent card, a system prompt, the local tools backing its skills and a
//! default port.  A process runs one persona; the assistant reaches the translator through the
//! registry returned by [`default_registry`].

use crate::agentrelay::agent_card::{AgentCapabilities, AgentCard, AgentSkill, SkillKind};
use crate::agentrelay::registry::{AgentRegistry, RemoteAgentEntry};
use crate::agentrelay::tools::LocalToolProtocol;

const PROVIDER: &str = "agentrelay";

/// A stock specialist agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Persona {
    /// Japanese/English translation and time queries.
    Translator,
    /// General question answering, time queries and calculation.
    Assistant,
}

impl Persona {
    pub fn default_port(self) -> u16 {
        match self {
            Persona::Translator => 8001,
            Persona::Assistant => 8000,
        }
    }

    /// Registry name other agents use for this persona.
    pub fn registry_name(self) -> &'static str {
        match self {
            Persona::Translator => "translator",
            Persona::Assistant => "assistant",
        }
    }

    pub fn system_prompt(self) -> &'static str {
        match self {
            Persona::Translator => {
                "You are a translation assistant. You translate between Japanese and English. \
                 Reply with the translation only, without commentary. When asked for the time, \
                 use the get_current_time tool."
            }
            Persona::Assistant => {
                "You are a helpful and capable AI assistant. Answer the user's questions \
                 politely and concisely. Use the get_current_time tool for the current time \
                 and the calculate tool for arithmetic."
            }
        }
    }

    /// The in-process tools behind the persona's time and calculation skills.
    pub fn tools(self) -> LocalToolProtocol {
        match self {
            Persona::Translator => LocalToolProtocol::new().with_clock(),
            Persona::Assistant => LocalToolProtocol::new().with_clock().with_calculator(),
        }
    }

    /// The card this persona serves when listening at `url`.
    pub fn card(self, url: impl Into<String>) -> AgentCard {
        let url = url.into();
        let card = match self {
            Persona::Translator => AgentCard::new(
                "Translator",
                "Translation agent for Japanese and English that can also tell the time.",
                url.clone(),
            )
            .with_skill(
                AgentSkill::new("translation", SkillKind::Translation, "Translation")
                    .with_description("Translates between Japanese and English")
                    .with_tag("translation")
                    .with_tag("japanese")
                    .with_tag("english")
                    .with_example("Translate 'hello' to Japanese")
                    .with_example("「ありがとう」を英語に翻訳して"),
            )
            .with_skill(
                AgentSkill::new("current-time", SkillKind::TimeQuery, "Current time")
                    .with_description("Reports the current local time")
                    .with_example("What time is it?"),
            ),
            Persona::Assistant => AgentCard::new(
                "Local Assistant",
                "General-purpose assistant running on a local LLM.",
                url.clone(),
            )
            .with_skill(
                AgentSkill::new(
                    "general-assistant",
                    SkillKind::GeneralAssistant,
                    "General assistant",
                )
                .with_description("Answers general questions")
                .with_tag("assistant")
                .with_example("What is the capital of Japan?"),
            )
            .with_skill(
                AgentSkill::new("current-time", SkillKind::TimeQuery, "Current time")
                    .with_description("Reports the current local time")
                    .with_example("What time is it?"),
            )
            .with_skill(
                AgentSkill::new("calculator", SkillKind::Calculation, "Calculator")
                    .with_description("Evaluates arithmetic expressions")
                    .with_tag("math")
                    .with_example("What is 12 * 34?"),
            ),
        };
        card.with_provider(PROVIDER, url)
            .with_capabilities(AgentCapabilities {
                streaming: false,
                push_notifications: false,
                state_transition_history: false,
            })
    }
}

/// Registry with the translator at its default local address.
pub fn default_registry() -> AgentRegistry {
    AgentRegistry::new().with_agent(
        RemoteAgentEntry::new(
            Persona::Translator.registry_name(),
            format!("http://localhost:{}", Persona::Translator.default_port()),
        )
        .with_description("Japanese/English translation and current time")
        .with_required_skill(SkillKind::Translation),
    )
}
