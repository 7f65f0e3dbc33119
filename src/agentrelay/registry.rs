//! The orchestrator's view of which remote agents exist and where they listen.
//!
//! A registry is a plain value handed to [`RemoteAgentClient`](crate::client::RemoteAgentClient)
//! at construction; there is no process-wide registry.

use crate::agentrelay::agent_card::SkillKind;
use crate::agentrelay::error::ConfigError;

/// Environment variable listing agents as `name=url[#skill],...`.
pub const ENV_AGENTS: &str = "A2A_AGENTS";

/// One remote agent the orchestrator may delegate to.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteAgentEntry {
    pub name: String,
    /// Base URL of the agent's listener, without a trailing slash.
    pub url: String,
    /// Shown by `list_available_agents` when the agent cannot be reached.
    pub description: String,
    /// Skill the agent's card must declare before any task is sent to it.
    pub required_skill: Option<SkillKind>,
}

impl RemoteAgentEntry {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into().trim_end_matches('/').to_string(),
            description: String::new(),
            required_skill: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_required_skill(mut self, kind: SkillKind) -> Self {
        self.required_skill = Some(kind);
        self
    }
}

/// Ordered set of known agents, keyed by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentRegistry {
    entries: Vec<RemoteAgentEntry>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an agent, replacing any existing entry with the same name in place.
    pub fn with_agent(mut self, entry: RemoteAgentEntry) -> Self {
        self.insert(entry);
        self
    }

    pub fn insert(&mut self, entry: RemoteAgentEntry) {
        match self.entries.iter_mut().find(|e| e.name == entry.name) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn resolve(&self, name: &str) -> Option<&RemoteAgentEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn entries(&self) -> &[RemoteAgentEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse a `name=url[#skill]` list separated by commas.
    pub fn parse(list: &str) -> Result<Self, ConfigError> {
        let mut registry = Self::new();
        for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let invalid = |reason: String| ConfigError::InvalidValue {
                key: ENV_AGENTS.to_string(),
                reason,
            };
            let (name, rest) = item
                .split_once('=')
                .ok_or_else(|| invalid(format!("'{}' is not name=url", item)))?;
            let (url, skill) = match rest.split_once('#') {
                Some((url, skill)) => (url, Some(skill)),
                None => (rest, None),
            };
            let name = name.trim();
            if name.is_empty() {
                return Err(invalid(format!("'{}' has an empty name", item)));
            }
            reqwest::Url::parse(url.trim())
                .map_err(|e| invalid(format!("'{}' has an invalid url: {}", name, e)))?;

            let mut entry = RemoteAgentEntry::new(name, url.trim());
            if let Some(skill) = skill {
                let kind = SkillKind::parse(skill.trim())
                    .ok_or_else(|| invalid(format!("unknown skill '{}'", skill.trim())))?;
                entry = entry.with_required_skill(kind);
            }
            registry.insert(entry);
        }
        Ok(registry)
    }

    /// Build the registry from `A2A_AGENTS`; `None` when the variable is unset.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        match std::env::var(ENV_AGENTS) {
            Ok(list) => Self::parse(&list).map(Some),
            Err(_) => Ok(None),
        }
    }
}
