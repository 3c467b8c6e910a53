use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use persona_agent::RunError;
use persona_persist::PersistError;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Run failed: {0}")]
    Run(#[from] RunError),

    #[error("Storage error: {0}")]
    Persist(#[from] PersistError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::AgentNotFound(_) | ApiError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Run(e) => match e {
                RunError::EmptyMessage => StatusCode::BAD_REQUEST,
                RunError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                RunError::Model(_) | RunError::MaxIterations(_) => StatusCode::BAD_GATEWAY,
                RunError::Storage(e) if e.is_not_found() => StatusCode::NOT_FOUND,
                RunError::Storage(_) | RunError::Cancelled => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Persist(e) if e.is_not_found() => StatusCode::NOT_FOUND,
            ApiError::Persist(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = if status.is_server_error() {
            // Details go to the log, not to the client
            tracing::error!(status = status.as_u16(), error = %self, "Request failed");
            match status {
                StatusCode::GATEWAY_TIMEOUT => "The agent took too long to respond".to_string(),
                StatusCode::BAD_GATEWAY => "The language model request failed".to_string(),
                _ => "Internal server error".to_string(),
            }
        } else {
            self.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_run_errors_map_to_statuses() {
        assert_eq!(
            ApiError::from(RunError::EmptyMessage).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(RunError::Timeout(Duration::from_secs(1))).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            ApiError::from(RunError::MaxIterations(10)).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ApiError::from(RunError::Model("boom".into())).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_not_found_storage_errors_are_404() {
        let err = ApiError::from(PersistError::SessionNotFound("s1".into()));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }
}
