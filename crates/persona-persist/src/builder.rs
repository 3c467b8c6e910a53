use std::path::PathBuf;

use crate::dbs::sqlite::{SqliteOptions, SqlitePersistenceClient};
use crate::error::Result;

/// Default database file, relative to the working directory.
pub const DEFAULT_DATABASE_PATH: &str = "agno.db";

pub struct PersistClientBuilder {
    path: PathBuf,
    options: SqliteOptions,
}

impl PersistClientBuilder {
    pub fn new() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DATABASE_PATH),
            options: SqliteOptions::default(),
        }
    }

    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.options.max_connections = max.max(1);
        self
    }

    pub fn busy_timeout_ms(mut self, ms: u64) -> Self {
        self.options.busy_timeout_ms = ms;
        self
    }

    pub async fn build(self) -> Result<SqlitePersistenceClient> {
        SqlitePersistenceClient::connect(&self.path, self.options).await
    }
}

impl Default for PersistClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
