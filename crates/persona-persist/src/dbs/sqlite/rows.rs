use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::FromRow;

use crate::error::{PersistError, Result};
use crate::models::{RunRecord, Session, StoredMessage};

/// Fixed-width RFC 3339 text so timestamps sort lexicographically.
pub(crate) fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| PersistError::InvalidRecord(format!("invalid {}: {}", field, e)))
}

fn to_unsigned<T: TryFrom<i64>>(value: Option<i64>, field: &str) -> Result<Option<T>> {
    value
        .map(|v| T::try_from(v).map_err(|_| PersistError::InvalidRecord(format!("{} out of range: {}", field, v))))
        .transpose()
}

pub(crate) const SESSION_COLUMNS: &str =
    "session_id, agent_id, user_id, title, created_at, updated_at";

#[derive(Debug, FromRow)]
pub(crate) struct SessionRow {
    session_id: String,
    agent_id: String,
    user_id: Option<String>,
    title: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<SessionRow> for Session {
    type Error = PersistError;

    fn try_from(row: SessionRow) -> Result<Self> {
        Ok(Session {
            created_at: parse_timestamp(&row.created_at, "created_at")?,
            updated_at: parse_timestamp(&row.updated_at, "updated_at")?,
            session_id: row.session_id,
            agent_id: row.agent_id,
            user_id: row.user_id,
            title: row.title,
        })
    }
}

pub(crate) const RUN_COLUMNS: &str = "run_id, session_id, agent_id, user_id, status, input, content, \
     error, input_tokens, output_tokens, created_at, completed_at, duration_ms";

#[derive(Debug, FromRow)]
pub(crate) struct RunRow {
    run_id: String,
    session_id: String,
    agent_id: String,
    user_id: Option<String>,
    status: String,
    input: String,
    content: Option<String>,
    error: Option<String>,
    input_tokens: Option<i64>,
    output_tokens: Option<i64>,
    created_at: String,
    completed_at: Option<String>,
    duration_ms: Option<i64>,
}

impl TryFrom<RunRow> for RunRecord {
    type Error = PersistError;

    fn try_from(row: RunRow) -> Result<Self> {
        Ok(RunRecord {
            status: row.status.parse()?,
            input_tokens: to_unsigned(row.input_tokens, "input_tokens")?,
            output_tokens: to_unsigned(row.output_tokens, "output_tokens")?,
            duration_ms: to_unsigned(row.duration_ms, "duration_ms")?,
            created_at: parse_timestamp(&row.created_at, "created_at")?,
            completed_at: row
                .completed_at
                .as_deref()
                .map(|v| parse_timestamp(v, "completed_at"))
                .transpose()?,
            run_id: row.run_id,
            session_id: row.session_id,
            agent_id: row.agent_id,
            user_id: row.user_id,
            input: row.input,
            content: row.content,
            error: row.error,
        })
    }
}

pub(crate) const MESSAGE_COLUMNS: &str = "m.id, m.session_id, m.run_id, m.seq, m.role, m.message_type, \
     m.content, m.tool_call_id, m.tool_name, m.arguments, m.created_at";

#[derive(Debug, FromRow)]
pub(crate) struct MessageRow {
    id: String,
    session_id: String,
    run_id: String,
    seq: i64,
    role: String,
    message_type: String,
    content: String,
    tool_call_id: Option<String>,
    tool_name: Option<String>,
    arguments: Option<String>,
    created_at: String,
}

impl TryFrom<MessageRow> for StoredMessage {
    type Error = PersistError;

    fn try_from(row: MessageRow) -> Result<Self> {
        Ok(StoredMessage {
            role: row.role.parse()?,
            message_type: row.message_type.parse()?,
            created_at: parse_timestamp(&row.created_at, "created_at")?,
            id: row.id,
            session_id: row.session_id,
            run_id: row.run_id,
            seq: row.seq,
            content: row.content,
            tool_call_id: row.tool_call_id,
            tool_name: row.tool_name,
            arguments: row.arguments,
        })
    }
}
