use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use persona_persist::{PersistError, RunRecord, Session, SessionQuery, StoredMessage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

const DEFAULT_LIMIT: i64 = 20;
const MAX_LIMIT: i64 = 100;
const MAX_TITLE_LEN: usize = 200;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionResponse {
    pub session_id: String,
    pub agent_id: String,
    pub user_id: Option<String>,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        Self {
            session_id: session.session_id,
            agent_id: session.agent_id,
            user_id: session.user_id,
            title: session.title,
            created_at: session.created_at,
            updated_at: session.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListSessionsQuery {
    pub agent_id: Option<String>,
    pub user_id: Option<String>,
    /// Page size (default 20, at most 100)
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ListSessionsResponse {
    pub sessions: Vec<SessionResponse>,
    pub has_more: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RenameSessionRequest {
    pub title: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RunRecordResponse {
    pub run_id: String,
    pub session_id: String,
    pub agent_id: String,
    pub user_id: Option<String>,
    pub status: String,
    pub input: String,
    pub content: Option<String>,
    pub error: Option<String>,
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
}

impl From<RunRecord> for RunRecordResponse {
    fn from(run: RunRecord) -> Self {
        Self {
            run_id: run.run_id,
            session_id: run.session_id,
            agent_id: run.agent_id,
            user_id: run.user_id,
            status: run.status.as_str().to_string(),
            input: run.input,
            content: run.content,
            error: run.error,
            input_tokens: run.input_tokens,
            output_tokens: run.output_tokens,
            created_at: run.created_at,
            completed_at: run.completed_at,
            duration_ms: run.duration_ms,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub id: String,
    pub run_id: String,
    pub seq: i64,
    pub role: String,
    #[serde(rename = "type")]
    pub message_type: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<StoredMessage> for MessageResponse {
    fn from(msg: StoredMessage) -> Self {
        Self {
            id: msg.id,
            run_id: msg.run_id,
            seq: msg.seq,
            role: msg.role.as_str().to_string(),
            message_type: msg.message_type.as_str().to_string(),
            content: msg.content,
            tool_call_id: msg.tool_call_id,
            tool_name: msg.tool_name,
            arguments: msg.arguments,
            created_at: msg.created_at,
        }
    }
}

/// List sessions, most recently active first
#[utoipa::path(
    get,
    path = "/sessions",
    params(ListSessionsQuery),
    responses(
        (status = 200, description = "Sessions page", body = ListSessionsResponse)
    ),
    tag = "sessions"
)]
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListSessionsQuery>,
) -> ApiResult<Json<ListSessionsResponse>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = query.offset.unwrap_or(0).max(0);

    // One extra row tells whether another page exists
    let mut filter = SessionQuery::new(limit + 1).offset(offset);
    if let Some(agent_id) = query.agent_id {
        filter = filter.agent(agent_id);
    }
    if let Some(user_id) = query.user_id {
        filter = filter.user(user_id);
    }

    let mut sessions = state.store.list_sessions(&filter).await?;
    let has_more = sessions.len() as i64 > limit;
    sessions.truncate(limit as usize);

    Ok(Json(ListSessionsResponse {
        sessions: sessions.into_iter().map(Into::into).collect(),
        has_more,
    }))
}

/// Get a session by ID
#[utoipa::path(
    get,
    path = "/sessions/{session_id}",
    params(("session_id" = String, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Session found", body = SessionResponse),
        (status = 404, description = "Session not found")
    ),
    tag = "sessions"
)]
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<SessionResponse>> {
    let session = state
        .store
        .get_session(&session_id)
        .await?
        .ok_or(ApiError::SessionNotFound(session_id))?;

    Ok(Json(session.into()))
}

/// Rename a session
#[utoipa::path(
    patch,
    path = "/sessions/{session_id}",
    params(("session_id" = String, Path, description = "Session ID")),
    request_body = RenameSessionRequest,
    responses(
        (status = 200, description = "Session renamed", body = SessionResponse),
        (status = 400, description = "Invalid title"),
        (status = 404, description = "Session not found")
    ),
    tag = "sessions"
)]
pub async fn rename_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(req): Json<RenameSessionRequest>,
) -> ApiResult<Json<SessionResponse>> {
    let title = req.title.trim();
    if title.is_empty() {
        return Err(ApiError::BadRequest("title must not be empty".to_string()));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ApiError::BadRequest(format!(
            "title must be at most {} characters",
            MAX_TITLE_LEN
        )));
    }

    let session = state
        .store
        .rename_session(&session_id, title)
        .await
        .map_err(|e| not_found_as_session(e, &session_id))?;

    Ok(Json(session.into()))
}

/// Delete a session with its runs and messages
#[utoipa::path(
    delete,
    path = "/sessions/{session_id}",
    params(("session_id" = String, Path, description = "Session ID")),
    responses(
        (status = 204, description = "Session deleted"),
        (status = 404, description = "Session not found")
    ),
    tag = "sessions"
)]
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .store
        .delete_session(&session_id)
        .await
        .map_err(|e| not_found_as_session(e, &session_id))?;

    Ok(StatusCode::NO_CONTENT)
}

/// List the runs of a session, oldest first
#[utoipa::path(
    get,
    path = "/sessions/{session_id}/runs",
    params(("session_id" = String, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Runs", body = [RunRecordResponse]),
        (status = 404, description = "Session not found")
    ),
    tag = "sessions"
)]
pub async fn list_runs(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<Vec<RunRecordResponse>>> {
    require_session(&state, &session_id).await?;

    let runs = state.store.list_runs(&session_id).await?;
    Ok(Json(runs.into_iter().map(Into::into).collect()))
}

/// Chat history of a session in conversation order
#[utoipa::path(
    get,
    path = "/sessions/{session_id}/messages",
    params(("session_id" = String, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Messages", body = [MessageResponse]),
        (status = 404, description = "Session not found")
    ),
    tag = "sessions"
)]
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<Vec<MessageResponse>>> {
    require_session(&state, &session_id).await?;

    let messages = state.store.session_messages(&session_id).await?;
    Ok(Json(messages.into_iter().map(Into::into).collect()))
}

async fn require_session(state: &AppState, session_id: &str) -> ApiResult<()> {
    match state.store.get_session(session_id).await? {
        Some(_) => Ok(()),
        None => Err(ApiError::SessionNotFound(session_id.to_string())),
    }
}

fn not_found_as_session(err: PersistError, session_id: &str) -> ApiError {
    if err.is_not_found() {
        ApiError::SessionNotFound(session_id.to_string())
    } else {
        err.into()
    }
}
