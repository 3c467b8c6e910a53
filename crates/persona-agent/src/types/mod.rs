pub mod config;
pub mod events;
pub mod run;
pub mod state;

pub use config::{AgentConfig, LLMConfig};
pub use events::StreamEvent;
pub use run::{RunInput, RunOutput};
pub use state::RunState;
