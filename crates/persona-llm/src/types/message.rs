use serde::{Deserialize, Serialize};

use super::content::Content;
use super::tool::ToolCall;

/// Provider-agnostic chat message, serialized in the chat-completions shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System {
        content: Content,

        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },

    #[serde(rename = "user")]
    Human {
        content: Content,

        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },

    #[serde(rename = "assistant")]
    AI {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<Content>,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_calls: Option<Vec<ToolCall>>,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },

    Tool {
        tool_call_id: String,
        content: Content,
    },
}

impl Message {
    pub fn system(content: impl Into<Content>) -> Self {
        Self::System {
            content: content.into(),
            name: None,
        }
    }

    pub fn human(content: impl Into<Content>) -> Self {
        Self::Human {
            content: content.into(),
            name: None,
        }
    }

    pub fn ai(content: impl Into<Content>) -> Self {
        Self::AI {
            content: Some(content.into()),
            tool_calls: None,
            name: None,
        }
    }

    pub fn ai_with_tools(tool_calls: Vec<ToolCall>) -> Self {
        Self::AI {
            content: None,
            tool_calls: Some(tool_calls),
            name: None,
        }
    }

    /// Assistant turn that carries both text and tool calls.
    ///
    /// Empty text and empty call lists are normalized to `None` so the
    /// payload stays valid for the chat-completions endpoint.
    pub fn ai_turn(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        let content = content.into();
        Self::AI {
            content: (!content.is_empty()).then(|| Content::Text(content)),
            tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
            name: None,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<Content>) -> Self {
        Self::Tool {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
        }
    }

    pub fn role(&self) -> &str {
        match self {
            Self::System { .. } => "system",
            Self::Human { .. } => "user",
            Self::AI { .. } => "assistant",
            Self::Tool { .. } => "tool",
        }
    }

    /// Text content of the message, if it has any.
    pub fn text(&self) -> Option<String> {
        match self {
            Self::System { content, .. }
            | Self::Human { content, .. }
            | Self::Tool { content, .. } => Some(content.to_plain_text()),
            Self::AI { content, .. } => content.as_ref().map(Content::to_plain_text),
        }
    }

    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Self::AI {
                tool_calls: Some(calls),
                ..
            } => calls,
            _ => &[],
        }
    }
}
