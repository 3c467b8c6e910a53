use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Run not found: {0}")]
    RunNotFound(String),

    #[error("Invalid stored record: {0}")]
    InvalidRecord(String),

    #[error("Invalid backup: {0}")]
    InvalidBackup(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PersistError {
    /// Whether the error means the requested record does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::SessionNotFound(_) | Self::RunNotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, PersistError>;
