use persona_llm::{Message, TokenUsage, ToolCall};

use super::run::ToolExecution;

/// Mutable state of a single run, shared by the nodes.
#[derive(Debug, Clone)]
pub struct RunState {
    pub run_id: String,
    pub session_id: String,
    pub messages: Vec<Message>,
    pub usage: TokenUsage,
    pub tool_executions: Vec<ToolExecution>,
    /// Index of the first message produced by this run
    first_new: usize,
}

impl RunState {
    /// `context` is the system prompt plus replayed history; `input` is the
    /// user message that starts the run.
    pub fn new(run_id: String, session_id: String, context: Vec<Message>, input: Message) -> Self {
        let first_new = context.len();
        let mut messages = context;
        messages.push(input);
        Self {
            run_id,
            session_id,
            messages,
            usage: TokenUsage::default(),
            tool_executions: Vec::new(),
            first_new,
        }
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn add_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn has_pending_tool_calls(&self) -> bool {
        self.last_message()
            .map(|m| !m.tool_calls().is_empty())
            .unwrap_or(false)
    }

    pub fn pending_tool_calls(&self) -> Vec<ToolCall> {
        self.last_message()
            .map(|m| m.tool_calls().to_vec())
            .unwrap_or_default()
    }

    pub fn add_tool_result(&mut self, tool_call_id: String, result: String) {
        self.messages.push(Message::tool_result(tool_call_id, result));
    }

    /// Messages added since the run started, user input included.
    pub fn new_messages(&self) -> &[Message] {
        &self.messages[self.first_new..]
    }

    /// Text of the last assistant message of this run.
    pub fn final_content(&self) -> String {
        self.new_messages()
            .iter()
            .rev()
            .find(|m| matches!(m, Message::AI { .. }))
            .and_then(Message::text)
            .unwrap_or_default()
    }
}
