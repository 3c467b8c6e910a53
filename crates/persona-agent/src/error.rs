use std::time::Duration;

use persona_persist::PersistError;
use thiserror::Error;

/// Why a run did not complete.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("message must not be empty")]
    EmptyMessage,

    #[error("run exceeded the execution timeout of {0:?}")]
    Timeout(Duration),

    #[error("max iterations ({0}) reached")]
    MaxIterations(usize),

    #[error("model request failed: {0}")]
    Model(String),

    #[error("event receiver dropped; run cancelled")]
    Cancelled,

    #[error("storage error: {0}")]
    Storage(#[from] PersistError),
}

impl RunError {
    /// Whether the caller sent something unusable, as opposed to a failure
    /// while serving it.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::EmptyMessage)
    }
}
