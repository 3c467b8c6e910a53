use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Longest title derived from the first user input, in characters.
pub const MAX_TITLE_CHARS: usize = 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub agent_id: String,
    pub user_id: Option<String>,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Derive a session title from the first message of a conversation.
pub fn title_from_input(input: &str) -> Option<String> {
    let line = input.lines().map(str::trim).find(|l| !l.is_empty())?;
    Some(line.chars().take(MAX_TITLE_CHARS).collect())
}

/// Filter and page for listing sessions, most recently updated first.
#[derive(Debug, Clone, Default)]
pub struct SessionQuery {
    pub agent_id: Option<String>,
    pub user_id: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl SessionQuery {
    pub fn new(limit: i64) -> Self {
        Self {
            limit,
            ..Default::default()
        }
    }

    pub fn agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}
