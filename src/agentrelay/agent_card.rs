//! Agent Cards: the capability descriptor each agent publishes for discovery.
//!
//! A card names the agent, says where it listens, and lists the skills it accepts.  Skills carry a
//! closed [`SkillKind`] so that an orchestrator can check compatibility when it fetches the card,
//! instead of matching free-form strings at call time.
//!
//! Cards are built once at start-up and validated before the listener binds.  After that they are
//! shared read-only (the listener keeps them behind an `Arc`); publishing a new version means
//! building a new card.
//!
//! # Example
//!
//! ```rust
//! use agentrelay::agent_card::{AgentCard, AgentSkill, SkillKind};
//!
//! let card = AgentCard::new("Translator", "Japanese/English translation", "http://localhost:8001")
//!     .with_version("1.0.0")
//!     .with_skill(
//!         AgentSkill::new("translation", SkillKind::Translation, "Translation")
//!             .with_description("Translates between Japanese and English")
//!             .with_example("Translate 'hello' to Japanese"),
//!     );
//!
//! assert!(card.validate().is_ok());
//! assert!(card.declares(SkillKind::Translation));
//! ```

use crate::agentrelay::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Content type every card must accept so plain-text delegation works.
pub const TEXT_PLAIN: &str = "text/plain";
/// Structured content type accepted by the built-in personas.
pub const APPLICATION_JSON: &str = "application/json";

/// The closed set of skill kinds an agent can advertise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkillKind {
    /// Translating text between natural languages.
    Translation,
    /// Open-ended question answering.
    GeneralAssistant,
    /// Reporting the current date and time.
    TimeQuery,
    /// Evaluating arithmetic expressions.
    Calculation,
    /// Condensing long text.
    Summarization,
}

impl SkillKind {
    /// Wire name of the kind.
    pub fn as_str(self) -> &'static str {
        match self {
            SkillKind::Translation => "translation",
            SkillKind::GeneralAssistant => "general-assistant",
            SkillKind::TimeQuery => "time-query",
            SkillKind::Calculation => "calculation",
            SkillKind::Summarization => "summarization",
        }
    }

    /// Parse a wire name back into a kind.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "translation" => Some(SkillKind::Translation),
            "general-assistant" => Some(SkillKind::GeneralAssistant),
            "time-query" => Some(SkillKind::TimeQuery),
            "calculation" => Some(SkillKind::Calculation),
            "summarization" => Some(SkillKind::Summarization),
            _ => None,
        }
    }
}

impl fmt::Display for SkillKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One operation an agent accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSkill {
    pub id: String,
    pub kind: SkillKind,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Example invocations, useful as few-shot hints for orchestrators.
    #[serde(default)]
    pub examples: Vec<String>,
}

impl AgentSkill {
    pub fn new(id: impl Into<String>, kind: SkillKind, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            name: name.into(),
            description: String::new(),
            tags: Vec::new(),
            examples: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_example(mut self, example: impl Into<String>) -> Self {
        self.examples.push(example.into());
        self
    }
}

/// Organisation publishing the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProvider {
    pub organization: String,
    pub url: String,
}

/// Optional protocol features the agent supports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCapabilities {
    #[serde(default)]
    pub streaming: bool,
    #[serde(default)]
    pub push_notifications: bool,
    #[serde(default)]
    pub state_transition_history: bool,
}

/// Capability descriptor served at `GET /capabilities`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCard {
    pub name: String,
    pub description: String,
    /// Base address the agent's listener answers on.
    pub url: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<AgentProvider>,
    #[serde(default)]
    pub capabilities: AgentCapabilities,
    pub default_input_modes: Vec<String>,
    pub default_output_modes: Vec<String>,
    pub skills: Vec<AgentSkill>,
}

impl AgentCard {
    /// Start a card with text and JSON input/output modes and no skills.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            url: url.into(),
            version: "1.0.0".to_string(),
            provider: None,
            capabilities: AgentCapabilities::default(),
            default_input_modes: vec![TEXT_PLAIN.to_string(), APPLICATION_JSON.to_string()],
            default_output_modes: vec![TEXT_PLAIN.to_string(), APPLICATION_JSON.to_string()],
            skills: Vec::new(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_provider(
        mut self,
        organization: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        self.provider = Some(AgentProvider {
            organization: organization.into(),
            url: url.into(),
        });
        self
    }

    pub fn with_capabilities(mut self, capabilities: AgentCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Replace the accepted input content types.
    pub fn with_input_modes(mut self, modes: Vec<String>) -> Self {
        self.default_input_modes = modes;
        self
    }

    /// Replace the produced output content types.
    pub fn with_output_modes(mut self, modes: Vec<String>) -> Self {
        self.default_output_modes = modes;
        self
    }

    /// Append a skill; declaration order is preserved on the wire.
    pub fn with_skill(mut self, skill: AgentSkill) -> Self {
        self.skills.push(skill);
        self
    }

    /// Rebase the card on a different listening address.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Whether any declared skill has the given kind.
    pub fn declares(&self, kind: SkillKind) -> bool {
        self.skills.iter().any(|s| s.kind == kind)
    }

    /// Whether the agent accepts the given input content type.
    pub fn accepts_input(&self, mode: &str) -> bool {
        self.default_input_modes.iter().any(|m| m == mode)
    }

    /// Check the card is complete enough to be served.
    ///
    /// A card that fails here must never be advertised.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::InvalidAgentCard("name is empty".into()));
        }
        if self.description.trim().is_empty() {
            return Err(ConfigError::InvalidAgentCard(format!(
                "'{}' has an empty description",
                self.name
            )));
        }
        reqwest::Url::parse(&self.url).map_err(|e| {
            ConfigError::InvalidAgentCard(format!(
                "'{}' has an invalid url {}: {}",
                self.name, self.url, e
            ))
        })?;
        if self.skills.is_empty() {
            return Err(ConfigError::InvalidAgentCard(format!(
                "'{}' declares no skills",
                self.name
            )));
        }
        let mut seen = HashSet::new();
        for skill in &self.skills {
            if skill.id.trim().is_empty() {
                return Err(ConfigError::InvalidAgentCard(format!(
                    "'{}' has a skill with an empty id",
                    self.name
                )));
            }
            if !seen.insert(skill.id.as_str()) {
                return Err(ConfigError::InvalidAgentCard(format!(
                    "'{}' declares skill '{}' twice",
                    self.name, skill.id
                )));
            }
        }
        if !self.accepts_input(TEXT_PLAIN) {
            return Err(ConfigError::InvalidAgentCard(format!(
                "'{}' does not accept {}",
                self.name, TEXT_PLAIN
            )));
        }
        if self.default_output_modes.is_empty() {
            return Err(ConfigError::InvalidAgentCard(format!(
                "'{}' declares no output modes",
                self.name
            )));
        }
        Ok(())
    }
}
