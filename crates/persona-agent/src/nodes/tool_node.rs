use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

use crate::node::{EventSender, Node, NodeType};
use crate::tools::ToolExecutor;
use crate::types::run::ToolExecution;
use crate::types::{RunState, StreamEvent};

pub struct ToolNode {
    executor: Arc<dyn ToolExecutor>,
}

impl ToolNode {
    pub fn new(executor: Arc<dyn ToolExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl Node for ToolNode {
    async fn execute(&self, state: &mut RunState, event_tx: &EventSender) -> Result<()> {
        for tool_call in state.pending_tool_calls() {
            let start = Instant::now();
            let name = tool_call.function.name.clone();

            // A failing tool never aborts the run; the model sees the error and can recover.
            let (result, is_error) = match self
                .executor
                .execute(&name, &tool_call.function.arguments)
                .await
            {
                Ok(result) => (result, false),
                Err(e) => {
                    warn!(tool = %name, error = %e, "Tool execution failed");
                    (format!("Tool execution failed: {}", e), true)
                }
            };
            let duration_ms = start.elapsed().as_millis() as u64;
            info!(tool = %name, is_error, duration_ms, "Tool executed");

            event_tx
                .send(StreamEvent::ToolResult {
                    tool_call_id: tool_call.id.clone(),
                    name: name.clone(),
                    result: result.clone(),
                    is_error,
                    duration_ms,
                })
                .await?;

            state.tool_executions.push(ToolExecution {
                tool_call_id: tool_call.id.clone(),
                name,
                arguments: tool_call.function.arguments.clone(),
                result: result.clone(),
                is_error,
                duration_ms,
            });
            state.add_tool_result(tool_call.id, result);
        }

        Ok(())
    }

    fn node_type(&self) -> NodeType {
        NodeType::Tool
    }
}
