use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Id;

/// A closed set of built-in implementations, plus `custom` for
/// fully-specified personas with no framework fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Orchestrator,
    Backend,
    Frontend,
    Reviewer,
    Custom,
}

impl AgentKind {
    pub fn is_built_in(&self) -> bool {
        !matches!(self, AgentKind::Custom)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentPersona {
    pub role: String,
    pub goal: String,
    pub backstory: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
}

/// LLM parameters, tool allow-list, and memory toggles for one agent.
/// `provider`/`model` are `None` when the agent should inherit the
/// configured default provider at call time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub provider: Option<String>,
    pub model: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub tool_allow_list: Vec<String>,
    #[serde(default = "default_true")]
    pub enable_memory: bool,
    #[serde(default = "default_memory_window")]
    pub memory_window_size: usize,
    #[serde(default)]
    pub system_prompt: String,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_true() -> bool {
    true
}

fn default_memory_window() -> usize {
    20
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            provider: None,
            model: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            tool_allow_list: Vec::new(),
            enable_memory: true,
            memory_window_size: default_memory_window(),
            system_prompt: String::new(),
        }
    }
}

/// A configured persona capable of producing messages. `handle` is globally
/// unique among active agents and always begins with `@`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: Id,
    pub handle: String,
    pub kind: AgentKind,
    pub persona: AgentPersona,
    pub config: AgentConfig,
    pub active: bool,
    pub template_id: Option<Id>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Agent {
    pub fn new(handle: impl Into<String>, kind: AgentKind, persona: AgentPersona, config: AgentConfig) -> Self {
        let now = Utc::now();
        Self {
            id: Id::new(),
            handle: handle.into(),
            kind,
            persona,
            config,
            active: true,
            template_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Invariant check for `kind ∉ built-in set ⇒ persona+config fully
    /// specify behavior`: a custom agent with no system prompt and no
    /// persona role has nothing to run on, since no framework fallback may
    /// inject prompt text for it.
    pub fn is_fully_specified(&self) -> bool {
        if self.kind.is_built_in() {
            return true;
        }
        !self.config.system_prompt.trim().is_empty() || !self.persona.role.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateType {
    Default,
    Custom,
    Community,
}

/// A reusable blueprint that can instantiate an [`Agent`]. Templates of type
/// `Default` are immutable and undeletable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentTemplate {
    pub id: Id,
    pub handle_prefix: String,
    pub kind: AgentKind,
    pub persona: AgentPersona,
    pub config: AgentConfig,
    pub template_type: TemplateType,
    pub domain_tag: String,
    pub created_at: DateTime<Utc>,
}

impl AgentTemplate {
    pub fn instantiate(&self, handle: impl Into<String>) -> Agent {
        let mut agent = Agent::new(handle, self.kind, self.persona.clone(), self.config.clone());
        agent.template_id = Some(self.id);
        agent
    }

    pub fn is_immutable(&self) -> bool {
        matches!(self.template_type, TemplateType::Default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_agent_is_always_fully_specified() {
        let agent = Agent::new("@backend", AgentKind::Backend, AgentPersona::default(), AgentConfig::default());
        assert!(agent.is_fully_specified());
    }

    #[test]
    fn custom_agent_without_persona_or_prompt_is_not_fully_specified() {
        let agent = Agent::new("@mystery", AgentKind::Custom, AgentPersona::default(), AgentConfig::default());
        assert!(!agent.is_fully_specified());
    }

    #[test]
    fn custom_agent_with_system_prompt_is_fully_specified() {
        let mut config = AgentConfig::default();
        config.system_prompt = "You are a helpful assistant.".to_string();
        let agent = Agent::new("@mystery", AgentKind::Custom, AgentPersona::default(), config);
        assert!(agent.is_fully_specified());
    }

    #[test]
    fn default_template_is_immutable() {
        let template = AgentTemplate {
            id: Id::new(),
            handle_prefix: "@backend".to_string(),
            kind: AgentKind::Backend,
            persona: AgentPersona::default(),
            config: AgentConfig::default(),
            template_type: TemplateType::Default,
            domain_tag: "engineering".to_string(),
            created_at: Utc::now(),
        };
        assert!(template.is_immutable());
    }

    #[test]
    fn instantiated_agent_references_its_template() {
        let template = AgentTemplate {
            id: Id::new(),
            handle_prefix: "@backend".to_string(),
            kind: AgentKind::Backend,
            persona: AgentPersona::default(),
            config: AgentConfig::default(),
            template_type: TemplateType::Custom,
            domain_tag: "engineering".to_string(),
            created_at: Utc::now(),
        };
        let agent = template.instantiate("@backend-2");
        assert_eq!(agent.template_id, Some(template.id));
        assert_eq!(agent.handle, "@backend-2");
    }
}
