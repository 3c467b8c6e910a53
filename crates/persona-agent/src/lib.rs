//! Persona chat agent.
//!
//! An [`Agent`] answers as one person: each run streams the model's reply,
//! executes any tool calls (lead capture via Telegram) and feeds the
//! results back until the model produces a final answer.

pub mod agent;
pub mod builder;
pub mod error;
pub mod node;
pub mod nodes;
pub mod persona;
pub mod prompts;
pub mod router;
pub mod telegram;
pub mod tools;
pub mod types;

pub use agent::Agent;
pub use builder::AgentBuilder;
pub use error::RunError;
pub use node::{EventSender, Node, NodeType};
pub use persona::{load_background, Persona, ResumeError};
pub use prompts::build_system_prompt;
pub use router::{NextNode, Router, SimpleRouter};
pub use telegram::{TelegramClient, TelegramConfig, TelegramError};
pub use tools::{AgentTool, SendLeadTool, ToolExecutor, ToolRegistry};
pub use types::run::ToolExecution;
pub use types::{AgentConfig, LLMConfig, RunInput, RunOutput, RunState, StreamEvent};
