mod message;
mod run;
mod session;

pub(crate) use message::SqliteMessageRepository;
pub(crate) use run::SqliteRunRepository;
pub(crate) use session::SqliteSessionRepository;
