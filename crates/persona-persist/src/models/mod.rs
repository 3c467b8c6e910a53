pub mod message;
pub mod run;
pub mod session;

pub use message::{MessageRole, MessageType, StoredMessage};
pub use run::{NewRun, RunCompletion, RunRecord, RunStatus};
pub use session::{Session, SessionQuery};
