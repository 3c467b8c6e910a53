use std::sync::Arc;

use anyhow::{anyhow, Result};
use persona_llm::ChatClient;
use persona_persist::PersistenceClient;

use crate::agent::{slugify, Agent};
use crate::persona::Persona;
use crate::prompts::build_system_prompt;
use crate::tools::{AgentTool, ToolRegistry};
use crate::types::{AgentConfig, LLMConfig};

/// Builder for an [`Agent`] with optional tools and storage
pub struct AgentBuilder {
    name: Option<String>,
    description: Option<String>,
    system_prompt: Option<String>,
    llm_client: Option<Arc<dyn ChatClient>>,
    llm_config: LLMConfig,
    config: AgentConfig,
    tools: ToolRegistry,
    persistence: Option<Arc<dyn PersistenceClient>>,
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            name: None,
            description: None,
            system_prompt: None,
            llm_client: None,
            llm_config: LLMConfig::default(),
            config: AgentConfig::default(),
            tools: ToolRegistry::new(),
            persistence: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Name the agent after `persona` and derive its prompt and description.
    pub fn persona(mut self, persona: &Persona, markdown: bool) -> Self {
        self.name = Some(format!("{} Chatbot Agent", persona.name));
        self.description = Some(format!(
            "A chatbot representing {}, answering questions about career, background, \
             skills and experience, and collecting leads",
            persona.name
        ));
        self.system_prompt = Some(build_system_prompt(persona, markdown));
        self
    }

    pub fn llm_client(mut self, client: Arc<dyn ChatClient>) -> Self {
        self.llm_client = Some(client);
        self
    }

    pub fn llm_config(mut self, config: LLMConfig) -> Self {
        self.llm_config = config;
        self
    }

    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn tool(mut self, tool: impl AgentTool + 'static) -> Self {
        self.tools.register(tool);
        self
    }

    pub fn with_persistence(mut self, client: Arc<dyn PersistenceClient>) -> Self {
        self.persistence = Some(client);
        self
    }

    pub fn build(self) -> Result<Agent> {
        let name = self.name.ok_or_else(|| anyhow!("Agent name is required"))?;
        let id = slugify(&name);
        if id.is_empty() {
            return Err(anyhow!("Agent name '{}' has no usable characters", name));
        }
        let llm_client = self
            .llm_client
            .ok_or_else(|| anyhow!("LLM client is required"))?;
        let system_prompt = self
            .system_prompt
            .ok_or_else(|| anyhow!("System prompt is required"))?;

        Ok(Agent {
            id,
            name,
            description: self.description.unwrap_or_default(),
            system_prompt,
            llm_config: self.llm_config,
            config: self.config,
            client: llm_client,
            tools: Arc::new(self.tools),
            persistence: self.persistence,
        })
    }
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}
