use utoipa::OpenApi;

use crate::routes::{agents, chat, health, sessions};

#[derive(OpenApi)]
#[openapi(
    info(title = "Persona API", description = "Chat with a persona agent and browse its sessions"),
    paths(
        health::health_check,
        chat::chat,
        agents::list_agents,
        agents::get_agent,
        agents::create_run,
        sessions::list_sessions,
        sessions::get_session,
        sessions::rename_session,
        sessions::delete_session,
        sessions::list_runs,
        sessions::list_messages,
    ),
    components(schemas(
        health::HealthResponse,
        chat::ChatForm,
        chat::ChatResponse,
        agents::AgentResponse,
        agents::RunForm,
        agents::RunResponse,
        agents::ToolCallResponse,
        agents::UsageResponse,
        sessions::SessionResponse,
        sessions::ListSessionsResponse,
        sessions::RenameSessionRequest,
        sessions::RunRecordResponse,
        sessions::MessageResponse,
    )),
    tags(
        (name = "health", description = "Liveness"),
        (name = "chat", description = "Simple chat endpoint"),
        (name = "agents", description = "Agents and runs"),
        (name = "sessions", description = "Stored conversations")
    )
)]
pub struct ApiDoc;
