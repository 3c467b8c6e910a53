pub mod lead;

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use persona_llm::Tool;
use serde_json::Value;

pub use lead::{Lead, SendLeadTool, SEND_LEAD_TOOL};

/// Executes tool calls requested by the model
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, tool_name: &str, arguments: &str) -> Result<String>;

    fn list_tools(&self) -> Vec<String>;

    /// Definitions advertised to the model
    fn definitions(&self) -> Vec<Tool>;
}

/// A function the agent can call
#[async_trait]
pub trait AgentTool: Send + Sync {
    fn name(&self) -> &str;

    fn definition(&self) -> Tool;

    async fn call(&self, arguments: Value) -> Result<String>;
}

/// Tools available to an agent, by name.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn AgentTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: impl AgentTool + 'static) {
        self.tools.insert(tool.name().to_string(), Arc::new(tool));
    }

    pub fn with_tool(mut self, tool: impl AgentTool + 'static) -> Self {
        self.register(tool);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    async fn execute(&self, tool_name: &str, arguments: &str) -> Result<String> {
        let tool = self
            .tools
            .get(tool_name)
            .ok_or_else(|| anyhow!("Unknown tool: {}", tool_name))?;

        let args: Value = if arguments.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(arguments)
                .with_context(|| format!("Invalid arguments for {}", tool_name))?
        };

        tool.call(args).await
    }

    fn list_tools(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    fn definitions(&self) -> Vec<Tool> {
        self.tools.values().map(|t| t.definition()).collect()
    }
}
