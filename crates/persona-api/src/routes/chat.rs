use axum::{extract::State, Form, Json};
use persona_agent::RunInput;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChatForm {
    #[serde(default)]
    pub message: String,
    pub session_id: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ChatResponse {
    pub run_id: String,
    pub agent_id: String,
    pub agent_name: String,
    pub session_id: String,
    pub content: String,
}

/// Send one message to the persona and get its reply
#[utoipa::path(
    post,
    path = "/chat",
    request_body(content = ChatForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Agent reply", body = ChatResponse),
        (status = 400, description = "Empty message"),
        (status = 502, description = "Model request failed"),
        (status = 504, description = "Run timed out")
    ),
    tag = "chat"
)]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Form(form): Form<ChatForm>,
) -> ApiResult<Json<ChatResponse>> {
    if form.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".to_string()));
    }

    let output = state
        .agent
        .run(RunInput {
            message: form.message,
            session_id: form.session_id,
            user_id: form.user_id,
        })
        .await?;

    Ok(Json(ChatResponse {
        run_id: output.run_id,
        agent_id: output.agent_id,
        agent_name: output.agent_name,
        session_id: output.session_id,
        content: output.content,
    }))
}
