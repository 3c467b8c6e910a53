use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::types::{RunState, StreamEvent};

pub type EventSender = mpsc::Sender<StreamEvent>;

/// A unit of work in the agent loop
#[async_trait]
pub trait Node: Send + Sync {
    /// Run the node, updating state and emitting events
    async fn execute(&self, state: &mut RunState, event_tx: &EventSender) -> Result<()>;

    fn node_type(&self) -> NodeType;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    LLM,
    Tool,
}
