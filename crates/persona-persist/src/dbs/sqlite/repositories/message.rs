use chrono::{DateTime, Utc};
use persona_llm::Message;
use sqlx::SqlitePool;

use crate::dbs::sqlite::rows::{timestamp, MessageRow, MESSAGE_COLUMNS};
use crate::error::Result;
use crate::history;
use crate::models::{RunStatus, StoredMessage};

#[derive(Clone)]
pub(crate) struct SqliteMessageRepository {
    pool: SqlitePool,
}

impl SqliteMessageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append rows for `messages`, continuing the run's sequence.
    pub async fn save(
        &self,
        run_id: &str,
        session_id: &str,
        messages: &[Message],
        now: DateTime<Utc>,
    ) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        let next_seq: i64 =
            sqlx::query_scalar("SELECT COALESCE(MAX(seq) + 1, 0) FROM messages WHERE run_id = ?")
                .bind(run_id)
                .fetch_one(&mut *tx)
                .await?;

        let rows = history::to_rows(session_id, run_id, next_seq, now, messages);
        for row in &rows {
            sqlx::query(
                r#"
                INSERT INTO messages (
                    id, session_id, run_id, seq, role, message_type,
                    content, tool_call_id, tool_name, arguments, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&row.id)
            .bind(&row.session_id)
            .bind(&row.run_id)
            .bind(row.seq)
            .bind(row.role.as_str())
            .bind(row.message_type.as_str())
            .bind(&row.content)
            .bind(&row.tool_call_id)
            .bind(&row.tool_name)
            .bind(&row.arguments)
            .bind(timestamp(row.created_at))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(rows.len())
    }

    pub async fn by_session(&self, session_id: &str) -> Result<Vec<StoredMessage>> {
        let query = format!(
            r#"
            SELECT {}
            FROM messages m
            JOIN runs r ON r.run_id = m.run_id
            WHERE m.session_id = ?
            ORDER BY r.created_at ASC, r.rowid ASC, m.seq ASC
            "#,
            MESSAGE_COLUMNS
        );
        let rows = sqlx::query_as::<_, MessageRow>(&query)
            .bind(session_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(StoredMessage::try_from).collect()
    }

    /// Rows of the last `last_n_runs` completed runs, oldest run first.
    pub async fn recent(&self, session_id: &str, last_n_runs: usize) -> Result<Vec<StoredMessage>> {
        if last_n_runs == 0 {
            return Ok(Vec::new());
        }

        let query = format!(
            r#"
            SELECT {}
            FROM messages m
            JOIN (
                SELECT run_id, created_at, rowid AS run_rowid
                FROM runs
                WHERE session_id = ? AND status = ?
                ORDER BY created_at DESC, rowid DESC
                LIMIT ?
            ) r ON r.run_id = m.run_id
            ORDER BY r.created_at ASC, r.run_rowid ASC, m.seq ASC
            "#,
            MESSAGE_COLUMNS
        );
        let rows = sqlx::query_as::<_, MessageRow>(&query)
            .bind(session_id)
            .bind(RunStatus::Completed.as_str())
            .bind(i64::try_from(last_n_runs).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(StoredMessage::try_from).collect()
    }
}
