//! SQLite storage for agent sessions, runs and chat messages.

pub mod backup;
pub mod builder;
pub mod dbs;
pub mod error;
pub mod history;
pub mod models;
pub mod trait_client;

pub use backup::{restore_from, verify_sqlite_file};
pub use builder::{PersistClientBuilder, DEFAULT_DATABASE_PATH};
pub use dbs::sqlite::{SqliteOptions, SqlitePersistenceClient};
pub use error::{PersistError, Result};
pub use models::{
    MessageRole, MessageType, NewRun, RunCompletion, RunRecord, RunStatus, Session, SessionQuery,
    StoredMessage,
};
pub use trait_client::PersistenceClient;
