use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    Form, Json,
};
use persona_agent::{Agent, RunInput, RunOutput, ToolExecution};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::{
    error::{ApiError, ApiResult},
    handlers::stream::sse_from_events,
    state::AppState,
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AgentResponse {
    pub id: String,
    pub name: String,
    pub description: String,
    pub model: String,
    pub tools: Vec<String>,
}

impl From<&Agent> for AgentResponse {
    fn from(agent: &Agent) -> Self {
        Self {
            id: agent.id().to_string(),
            name: agent.name().to_string(),
            description: agent.description().to_string(),
            model: agent.model().to_string(),
            tools: agent.tool_names(),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RunForm {
    #[serde(default)]
    pub message: String,
    /// Answer with Server-Sent Events instead of a single JSON body
    #[serde(default)]
    pub stream: bool,
    pub session_id: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ToolCallResponse {
    pub tool_call_id: String,
    pub name: String,
    pub arguments: String,
    pub result: String,
    pub is_error: bool,
    pub duration_ms: u64,
}

impl From<ToolExecution> for ToolCallResponse {
    fn from(exec: ToolExecution) -> Self {
        Self {
            tool_call_id: exec.tool_call_id,
            name: exec.name,
            arguments: exec.arguments,
            result: exec.result,
            is_error: exec.is_error,
            duration_ms: exec.duration_ms,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UsageResponse {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RunResponse {
    pub run_id: String,
    pub agent_id: String,
    pub agent_name: String,
    pub session_id: String,
    pub content: String,
    pub status: String,
    pub tool_calls: Vec<ToolCallResponse>,
    pub usage: UsageResponse,
    pub duration_ms: u64,
}

impl From<RunOutput> for RunResponse {
    fn from(output: RunOutput) -> Self {
        Self {
            run_id: output.run_id,
            agent_id: output.agent_id,
            agent_name: output.agent_name,
            session_id: output.session_id,
            content: output.content,
            status: output.status.as_str().to_string(),
            tool_calls: output.tool_calls.into_iter().map(Into::into).collect(),
            usage: UsageResponse {
                input_tokens: output.usage.input_tokens,
                output_tokens: output.usage.output_tokens,
                total_tokens: output.usage.total_tokens,
            },
            duration_ms: output.duration_ms,
        }
    }
}

/// List the agents this server hosts
#[utoipa::path(
    get,
    path = "/agents",
    responses(
        (status = 200, description = "Hosted agents", body = [AgentResponse])
    ),
    tag = "agents"
)]
pub async fn list_agents(State(state): State<Arc<AppState>>) -> Json<Vec<AgentResponse>> {
    Json(vec![AgentResponse::from(&state.agent)])
}

/// Get one agent
#[utoipa::path(
    get,
    path = "/agents/{agent_id}",
    params(("agent_id" = String, Path, description = "Agent ID")),
    responses(
        (status = 200, description = "Agent found", body = AgentResponse),
        (status = 404, description = "Agent not found")
    ),
    tag = "agents"
)]
pub async fn get_agent(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
) -> ApiResult<Json<AgentResponse>> {
    let agent = state
        .agent_by_id(&agent_id)
        .ok_or(ApiError::AgentNotFound(agent_id))?;

    Ok(Json(AgentResponse::from(agent)))
}

/// Run the agent on one message
///
/// With `stream=true` the run is delivered as Server-Sent Events named after
/// each event type; otherwise the finished run is returned as JSON.
#[utoipa::path(
    post,
    path = "/agents/{agent_id}/runs",
    params(("agent_id" = String, Path, description = "Agent ID")),
    request_body(content = RunForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Run finished (or event stream)", body = RunResponse),
        (status = 400, description = "Empty message"),
        (status = 404, description = "Agent not found"),
        (status = 502, description = "Model request failed"),
        (status = 504, description = "Run timed out")
    ),
    tag = "agents"
)]
pub async fn create_run(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
    Form(form): Form<RunForm>,
) -> ApiResult<Response> {
    let agent = state
        .agent_by_id(&agent_id)
        .ok_or(ApiError::AgentNotFound(agent_id))?;

    if form.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".to_string()));
    }

    let input = RunInput {
        message: form.message,
        session_id: form.session_id,
        user_id: form.user_id,
    };

    if form.stream {
        let events = agent.spawn_run(input);
        return Ok(sse_from_events(events).into_response());
    }

    let output = agent.run(input).await?;
    Ok(Json(RunResponse::from(output)).into_response())
}
