use persona_llm::TokenUsage;
use persona_persist::RunStatus;
use serde::{Deserialize, Serialize};

/// One user message to process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunInput {
    pub message: String,
    /// Continue this session; a fresh one is created when absent
    pub session_id: Option<String>,
    pub user_id: Option<String>,
}

impl RunInput {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// A tool call the model made during a run, with its outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExecution {
    pub tool_call_id: String,
    pub name: String,
    pub arguments: String,
    pub result: String,
    pub is_error: bool,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutput {
    pub run_id: String,
    pub agent_id: String,
    pub agent_name: String,
    pub session_id: String,
    /// Text of the final model response
    pub content: String,
    pub tool_calls: Vec<ToolExecution>,
    pub usage: TokenUsage,
    pub status: RunStatus,
    pub duration_ms: u64,
}
