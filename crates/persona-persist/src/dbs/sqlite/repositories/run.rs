use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::dbs::sqlite::rows::{timestamp, RunRow, RUN_COLUMNS};
use crate::error::{PersistError, Result};
use crate::models::session::title_from_input;
use crate::models::{NewRun, RunCompletion, RunRecord, RunStatus};

#[derive(Clone)]
pub(crate) struct SqliteRunRepository {
    pool: SqlitePool,
}

impl SqliteRunRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert the run and bump its session in one transaction. The session
    /// gets its title from the first run's input.
    pub async fn start(&self, run: NewRun, now: DateTime<Utc>) -> Result<RunRecord> {
        let now_text = timestamp(now);
        let mut tx = self.pool.begin().await?;

        let touched = sqlx::query(
            "UPDATE sessions SET updated_at = ?, title = COALESCE(title, ?) WHERE session_id = ?",
        )
        .bind(&now_text)
        .bind(title_from_input(&run.input))
        .bind(&run.session_id)
        .execute(&mut *tx)
        .await?;

        if touched.rows_affected() == 0 {
            return Err(PersistError::SessionNotFound(run.session_id));
        }

        sqlx::query(
            r#"
            INSERT INTO runs (run_id, session_id, agent_id, user_id, status, input, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&run.run_id)
        .bind(&run.session_id)
        .bind(&run.agent_id)
        .bind(&run.user_id)
        .bind(RunStatus::Running.as_str())
        .bind(&run.input)
        .bind(&now_text)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(RunRecord {
            run_id: run.run_id,
            session_id: run.session_id,
            agent_id: run.agent_id,
            user_id: run.user_id,
            status: RunStatus::Running,
            input: run.input,
            content: None,
            error: None,
            input_tokens: None,
            output_tokens: None,
            created_at: now,
            completed_at: None,
            duration_ms: None,
        })
    }

    pub async fn complete(&self, run_id: &str, completion: RunCompletion, now: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE runs
            SET status = ?, content = ?, input_tokens = ?, output_tokens = ?,
                completed_at = ?, duration_ms = ?
            WHERE run_id = ?
            "#,
        )
        .bind(RunStatus::Completed.as_str())
        .bind(&completion.content)
        .bind(completion.input_tokens.map(i64::from))
        .bind(completion.output_tokens.map(i64::from))
        .bind(timestamp(now))
        .bind(completion.duration_ms as i64)
        .bind(run_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PersistError::RunNotFound(run_id.to_string()));
        }
        Ok(())
    }

    pub async fn fail(&self, run_id: &str, error: &str, duration_ms: u64, now: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query(
            "UPDATE runs SET status = ?, error = ?, completed_at = ?, duration_ms = ? WHERE run_id = ?",
        )
        .bind(RunStatus::Error.as_str())
        .bind(error)
        .bind(timestamp(now))
        .bind(duration_ms as i64)
        .bind(run_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PersistError::RunNotFound(run_id.to_string()));
        }
        Ok(())
    }

    pub async fn get(&self, run_id: &str) -> Result<Option<RunRecord>> {
        let query = format!("SELECT {} FROM runs WHERE run_id = ?", RUN_COLUMNS);
        let row = sqlx::query_as::<_, RunRow>(&query)
            .bind(run_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(RunRecord::try_from).transpose()
    }

    pub async fn list(&self, session_id: &str) -> Result<Vec<RunRecord>> {
        let query = format!(
            "SELECT {} FROM runs WHERE session_id = ? ORDER BY created_at ASC, rowid ASC",
            RUN_COLUMNS
        );
        let rows = sqlx::query_as::<_, RunRow>(&query)
            .bind(session_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(RunRecord::try_from).collect()
    }
}
