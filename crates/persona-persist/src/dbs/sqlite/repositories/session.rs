use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::dbs::sqlite::rows::{timestamp, SessionRow, SESSION_COLUMNS};
use crate::error::{PersistError, Result};
use crate::models::{Session, SessionQuery};

#[derive(Clone)]
pub(crate) struct SqliteSessionRepository {
    pool: SqlitePool,
}

impl SqliteSessionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn ensure(
        &self,
        session_id: &str,
        agent_id: &str,
        user_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Session> {
        let now = timestamp(now);
        sqlx::query(
            r#"
            INSERT INTO sessions (session_id, agent_id, user_id, title, created_at, updated_at)
            VALUES (?, ?, ?, NULL, ?, ?)
            ON CONFLICT (session_id) DO NOTHING
            "#,
        )
        .bind(session_id)
        .bind(agent_id)
        .bind(user_id)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.get(session_id)
            .await?
            .ok_or_else(|| PersistError::SessionNotFound(session_id.to_string()))
    }

    pub async fn get(&self, session_id: &str) -> Result<Option<Session>> {
        let query = format!("SELECT {} FROM sessions WHERE session_id = ?", SESSION_COLUMNS);
        let row = sqlx::query_as::<_, SessionRow>(&query)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Session::try_from).transpose()
    }

    pub async fn list(&self, filter: &SessionQuery) -> Result<Vec<Session>> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM sessions WHERE 1 = 1", SESSION_COLUMNS));

        if let Some(agent_id) = &filter.agent_id {
            builder.push(" AND agent_id = ").push_bind(agent_id.clone());
        }
        if let Some(user_id) = &filter.user_id {
            builder.push(" AND user_id = ").push_bind(user_id.clone());
        }

        builder
            .push(" ORDER BY updated_at DESC, rowid DESC LIMIT ")
            .push_bind(filter.limit)
            .push(" OFFSET ")
            .push_bind(filter.offset);

        let rows = builder
            .build_query_as::<SessionRow>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Session::try_from).collect()
    }

    pub async fn delete(&self, session_id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM sessions WHERE session_id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(PersistError::SessionNotFound(session_id.to_string()));
        }
        Ok(())
    }

    pub async fn rename(&self, session_id: &str, title: &str, now: DateTime<Utc>) -> Result<Session> {
        let result = sqlx::query("UPDATE sessions SET title = ?, updated_at = ? WHERE session_id = ?")
            .bind(title)
            .bind(timestamp(now))
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(PersistError::SessionNotFound(session_id.to_string()));
        }

        self.get(session_id)
            .await?
            .ok_or_else(|| PersistError::SessionNotFound(session_id.to_string()))
    }
}
