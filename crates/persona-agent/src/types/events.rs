use persona_persist::RunStatus;
use serde::{Deserialize, Serialize};

/// Events emitted while an agent run executes.
///
/// LLM streaming events are forwarded as they arrive; the rest mark run and
/// tool boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    RunStarted {
        run_id: String,
        session_id: String,
        agent_id: String,
    },

    /// Response text from the model, token by token
    Message {
        content: String,
    },

    /// Tool call fragment from the model
    ToolCall {
        index: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        arguments: Option<String>,
    },

    ToolResult {
        tool_call_id: String,
        name: String,
        result: String,
        is_error: bool,
        duration_ms: u64,
    },

    Usage {
        input_tokens: u32,
        output_tokens: u32,
        total_tokens: u32,
    },

    /// One model response finished
    Done {
        #[serde(skip_serializing_if = "Option::is_none")]
        finish_reason: Option<String>,
    },

    Error {
        message: String,
    },

    RunCompleted {
        status: RunStatus,
        total_duration_ms: u64,
    },
}

impl StreamEvent {
    /// Name used for the SSE `event:` field.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::RunStarted { .. } => "run_started",
            Self::Message { .. } => "message",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::Usage { .. } => "usage",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
            Self::RunCompleted { .. } => "run_completed",
        }
    }
}

impl From<persona_llm::StreamEvent> for StreamEvent {
    fn from(event: persona_llm::StreamEvent) -> Self {
        match event {
            persona_llm::StreamEvent::Message { content } => Self::Message { content },
            persona_llm::StreamEvent::ToolCall {
                index,
                id,
                name,
                arguments,
            } => Self::ToolCall {
                index,
                id,
                name,
                arguments,
            },
            persona_llm::StreamEvent::Usage {
                input_tokens,
                output_tokens,
                total_tokens,
            } => Self::Usage {
                input_tokens,
                output_tokens,
                total_tokens,
            },
            persona_llm::StreamEvent::Done { finish_reason } => Self::Done { finish_reason },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_names_match_serde_tags() {
        let events = vec![
            StreamEvent::RunStarted {
                run_id: "r".into(),
                session_id: "s".into(),
                agent_id: "a".into(),
            },
            StreamEvent::Message { content: "hi".into() },
            StreamEvent::Error { message: "boom".into() },
            StreamEvent::RunCompleted {
                status: RunStatus::Completed,
                total_duration_ms: 3,
            },
        ];

        for event in events {
            let value = serde_json::to_value(&event).unwrap();
            assert_eq!(value["type"], event.event_name());
        }
    }

    #[test]
    fn test_run_completed_serializes_status() {
        let event = StreamEvent::RunCompleted {
            status: RunStatus::Error,
            total_duration_ms: 12,
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"type": "run_completed", "status": "error", "total_duration_ms": 12})
        );
    }
}
