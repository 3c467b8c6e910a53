use std::path::Path;

use async_trait::async_trait;
use persona_llm::Message;

use crate::error::Result;
use crate::models::{NewRun, RunCompletion, RunRecord, Session, SessionQuery, StoredMessage};

/// Storage operations the agent and the API need.
///
/// Implementations must be cheap to share behind an `Arc`.
#[async_trait]
pub trait PersistenceClient: Send + Sync {
    /// Return the session, creating it on first use.
    async fn ensure_session(
        &self,
        session_id: &str,
        agent_id: &str,
        user_id: Option<&str>,
    ) -> Result<Session>;

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>>;

    /// Sessions matching the query, most recently updated first.
    async fn list_sessions(&self, query: &SessionQuery) -> Result<Vec<Session>>;

    /// Delete a session with its runs and messages.
    async fn delete_session(&self, session_id: &str) -> Result<()>;

    async fn rename_session(&self, session_id: &str, title: &str) -> Result<Session>;

    /// Record a new run in `running` state and bump the session.
    async fn start_run(&self, run: NewRun) -> Result<RunRecord>;

    async fn complete_run(&self, run_id: &str, completion: RunCompletion) -> Result<()>;

    async fn fail_run(&self, run_id: &str, error: &str, duration_ms: u64) -> Result<()>;

    async fn get_run(&self, run_id: &str) -> Result<Option<RunRecord>>;

    /// Runs of a session, oldest first.
    async fn list_runs(&self, session_id: &str) -> Result<Vec<RunRecord>>;

    /// Append the messages produced by a run.
    async fn save_messages(&self, run_id: &str, session_id: &str, messages: &[Message]) -> Result<()>;

    /// Stored rows of a session in conversation order.
    async fn session_messages(&self, session_id: &str) -> Result<Vec<StoredMessage>>;

    /// Conversation of the last `last_n_runs` completed runs, ready to send
    /// back to the model.
    async fn history(&self, session_id: &str, last_n_runs: usize) -> Result<Vec<Message>>;

    /// Check the store is reachable.
    async fn ping(&self) -> Result<()>;

    /// Write a consistent copy of the store to `dest`.
    async fn backup_to(&self, dest: &Path) -> Result<()>;
}
