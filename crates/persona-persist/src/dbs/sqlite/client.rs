use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use persona_llm::Message;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::backup;
use crate::dbs::sqlite::repositories::{
    SqliteMessageRepository, SqliteRunRepository, SqliteSessionRepository,
};
use crate::error::Result;
use crate::history;
use crate::models::{NewRun, RunCompletion, RunRecord, Session, SessionQuery, StoredMessage};
use crate::trait_client::PersistenceClient;

/// Pool settings for a database file.
#[derive(Debug, Clone)]
pub struct SqliteOptions {
    pub max_connections: u32,
    /// How long a writer waits on a locked database before failing.
    pub busy_timeout_ms: u64,
}

impl Default for SqliteOptions {
    fn default() -> Self {
        Self {
            max_connections: 5,
            busy_timeout_ms: 5_000,
        }
    }
}

/// `PersistenceClient` backed by a single SQLite file.
#[derive(Clone)]
pub struct SqlitePersistenceClient {
    pool: SqlitePool,
    sessions: SqliteSessionRepository,
    runs: SqliteRunRepository,
    messages: SqliteMessageRepository,
}

impl SqlitePersistenceClient {
    /// Open (creating if missing) the database at `path` and apply migrations.
    pub async fn connect(path: impl AsRef<Path>, options: SqliteOptions) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let connect_options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_millis(options.busy_timeout_ms))
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(options.max_connections)
            .connect_with(connect_options)
            .await?;

        info!(path = %path.display(), max_connections = options.max_connections, "Opened SQLite database");
        Self::from_pool(pool).await
    }

    /// Private in-memory database, mostly for tests.
    ///
    /// Every pooled connection to `:memory:` is its own database, so the pool
    /// holds exactly one connection that never expires.
    pub async fn connect_in_memory() -> Result<Self> {
        let connect_options = SqliteConnectOptions::new()
            .in_memory(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(connect_options)
            .await?;

        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        debug!("Database migrations applied");

        Ok(Self {
            sessions: SqliteSessionRepository::new(pool.clone()),
            runs: SqliteRunRepository::new(pool.clone()),
            messages: SqliteMessageRepository::new(pool.clone()),
            pool,
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the pool, checkpointing the WAL into the main file.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("SQLite pool closed");
    }
}

#[async_trait]
impl PersistenceClient for SqlitePersistenceClient {
    async fn ensure_session(
        &self,
        session_id: &str,
        agent_id: &str,
        user_id: Option<&str>,
    ) -> Result<Session> {
        self.sessions.ensure(session_id, agent_id, user_id, Utc::now()).await
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        self.sessions.get(session_id).await
    }

    async fn list_sessions(&self, query: &SessionQuery) -> Result<Vec<Session>> {
        self.sessions.list(query).await
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        self.sessions.delete(session_id).await?;
        info!(session_id, "Deleted session");
        Ok(())
    }

    async fn rename_session(&self, session_id: &str, title: &str) -> Result<Session> {
        self.sessions.rename(session_id, title, Utc::now()).await
    }

    async fn start_run(&self, run: NewRun) -> Result<RunRecord> {
        self.runs.start(run, Utc::now()).await
    }

    async fn complete_run(&self, run_id: &str, completion: RunCompletion) -> Result<()> {
        self.runs.complete(run_id, completion, Utc::now()).await
    }

    async fn fail_run(&self, run_id: &str, error: &str, duration_ms: u64) -> Result<()> {
        self.runs.fail(run_id, error, duration_ms, Utc::now()).await
    }

    async fn get_run(&self, run_id: &str) -> Result<Option<RunRecord>> {
        self.runs.get(run_id).await
    }

    async fn list_runs(&self, session_id: &str) -> Result<Vec<RunRecord>> {
        self.runs.list(session_id).await
    }

    async fn save_messages(&self, run_id: &str, session_id: &str, messages: &[Message]) -> Result<()> {
        let saved = self.messages.save(run_id, session_id, messages, Utc::now()).await?;
        debug!(run_id, saved, "Saved run messages");
        Ok(())
    }

    async fn session_messages(&self, session_id: &str) -> Result<Vec<StoredMessage>> {
        self.messages.by_session(session_id).await
    }

    async fn history(&self, session_id: &str, last_n_runs: usize) -> Result<Vec<Message>> {
        let rows = self.messages.recent(session_id, last_n_runs).await?;
        history::from_rows(&rows)
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn backup_to(&self, dest: &Path) -> Result<()> {
        backup::vacuum_into(&self.pool, dest).await
    }
}
