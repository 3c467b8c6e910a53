//! Conversion between chat messages and `messages` rows.
//!
//! An assistant turn is stored as an optional text row followed by one
//! `tool_call` row per requested call. Reading the rows back folds those
//! rows into a single assistant message again.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use persona_llm::{Message, ToolCall};
use uuid::Uuid;

use crate::error::{PersistError, Result};
use crate::models::{MessageRole, MessageType, StoredMessage};

/// Turn the messages of one run into rows, numbering them from `first_seq`.
///
/// System messages are never stored; the prompt is rebuilt on every run.
pub fn to_rows(
    session_id: &str,
    run_id: &str,
    first_seq: i64,
    created_at: DateTime<Utc>,
    messages: &[Message],
) -> Vec<StoredMessage> {
    let mut rows = Vec::new();
    let mut tool_names: HashMap<String, String> = HashMap::new();
    let mut seq = first_seq;

    let mut push = |role, message_type, content: String, call: Option<(String, Option<String>, Option<String>)>| {
        let (tool_call_id, tool_name, arguments) = match call {
            Some((id, name, args)) => (Some(id), name, args),
            None => (None, None, None),
        };
        rows.push(StoredMessage {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            run_id: run_id.to_string(),
            seq,
            role,
            message_type,
            content,
            tool_call_id,
            tool_name,
            arguments,
            created_at,
        });
        seq += 1;
    };

    for message in messages {
        match message {
            Message::System { .. } => {}
            Message::Human { content, .. } => {
                push(MessageRole::User, MessageType::Message, content.to_plain_text(), None);
            }
            Message::AI { .. } => {
                if let Some(text) = message.text().filter(|t| !t.is_empty()) {
                    push(MessageRole::Assistant, MessageType::Message, text, None);
                }
                for call in message.tool_calls() {
                    tool_names.insert(call.id.clone(), call.function.name.clone());
                    push(
                        MessageRole::Assistant,
                        MessageType::ToolCall,
                        String::new(),
                        Some((
                            call.id.clone(),
                            Some(call.function.name.clone()),
                            Some(call.function.arguments.clone()),
                        )),
                    );
                }
            }
            Message::Tool { tool_call_id, content } => {
                push(
                    MessageRole::Tool,
                    MessageType::ToolResult,
                    content.to_plain_text(),
                    Some((tool_call_id.clone(), tool_names.get(tool_call_id).cloned(), None)),
                );
            }
        }
    }

    rows
}

/// Rebuild chat messages from rows ordered by run and sequence number.
pub fn from_rows(rows: &[StoredMessage]) -> Result<Vec<Message>> {
    let mut messages = Vec::with_capacity(rows.len());
    let mut pending: Option<(String, Vec<ToolCall>)> = None;

    fn flush(pending: &mut Option<(String, Vec<ToolCall>)>, out: &mut Vec<Message>) {
        if let Some((text, calls)) = pending.take() {
            out.push(Message::ai_turn(text, calls));
        }
    }

    for row in rows {
        match (row.role, row.message_type) {
            (MessageRole::User, MessageType::Message) => {
                flush(&mut pending, &mut messages);
                messages.push(Message::human(row.content.clone()));
            }
            (MessageRole::Assistant, MessageType::Message) => {
                flush(&mut pending, &mut messages);
                pending = Some((row.content.clone(), Vec::new()));
            }
            (MessageRole::Assistant, MessageType::ToolCall) => {
                let id = required(row, row.tool_call_id.as_deref(), "tool_call_id")?;
                let name = required(row, row.tool_name.as_deref(), "tool_name")?;
                let call = ToolCall::function(id, name, row.arguments.clone().unwrap_or_default());
                pending.get_or_insert_with(|| (String::new(), Vec::new())).1.push(call);
            }
            (MessageRole::Tool, MessageType::ToolResult) => {
                flush(&mut pending, &mut messages);
                let id = required(row, row.tool_call_id.as_deref(), "tool_call_id")?;
                messages.push(Message::tool_result(id, row.content.clone()));
            }
            (role, kind) => {
                return Err(PersistError::InvalidRecord(format!(
                    "message {} has role '{}' with type '{}'",
                    row.id, role, kind
                )));
            }
        }
    }
    flush(&mut pending, &mut messages);

    Ok(messages)
}

fn required<'a>(row: &StoredMessage, value: Option<&'a str>, field: &str) -> Result<&'a str> {
    value.ok_or_else(|| PersistError::InvalidRecord(format!("message {} is missing {}", row.id, field)))
}
