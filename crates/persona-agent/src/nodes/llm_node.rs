use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures::StreamExt;
use persona_llm::{ChatClient, ChatOptions, ChatRequest, EventStream, Message, Tool, ToolCall, ToolChoice};
use tracing::{debug, warn};

use crate::node::{EventSender, Node, NodeType};
use crate::types::{LLMConfig, RunState, StreamEvent};

/// Fragments of one streamed tool call
#[derive(Default)]
struct ToolCallBuffer {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

pub struct LLMNode {
    client: Arc<dyn ChatClient>,
    tools: Vec<Tool>,
    config: LLMConfig,
}

impl LLMNode {
    pub fn new(client: Arc<dyn ChatClient>, tools: Vec<Tool>, config: LLMConfig) -> Self {
        Self {
            client,
            tools,
            config,
        }
    }

    fn build_request(&self, state: &RunState) -> ChatRequest {
        let mut options = ChatOptions::new();
        if !self.tools.is_empty() {
            options = options.tools(self.tools.clone()).tool_choice(ToolChoice::auto());
        }
        if let Some(temp) = self.config.temperature {
            options = options.temperature(temp);
        }
        if let Some(max_tokens) = self.config.max_tokens {
            options = options.max_tokens(max_tokens);
        }

        ChatRequest::new(self.config.model.clone(), state.messages.clone()).with_options(options)
    }

    /// Forward events to the caller while accumulating the assistant turn.
    async fn process_stream(
        &self,
        mut stream: EventStream,
        state: &mut RunState,
        event_tx: &EventSender,
    ) -> Result<Message> {
        let mut content = String::new();
        let mut buffers: BTreeMap<u32, ToolCallBuffer> = BTreeMap::new();

        while let Some(event) = stream.next().await {
            let event = event?;
            event_tx.send(StreamEvent::from(event.clone())).await?;

            match event {
                persona_llm::StreamEvent::Message { content: delta } => content.push_str(&delta),
                persona_llm::StreamEvent::ToolCall {
                    index,
                    id,
                    name,
                    arguments,
                } => {
                    let entry = buffers.entry(index).or_default();
                    if let Some(id) = id {
                        entry.id = Some(id);
                    }
                    if let Some(name) = name {
                        entry.name = Some(name);
                    }
                    if let Some(args) = arguments {
                        entry.arguments.push_str(&args);
                    }
                }
                persona_llm::StreamEvent::Usage {
                    input_tokens,
                    output_tokens,
                    total_tokens,
                } => state.usage.add(persona_llm::TokenUsage {
                    input_tokens,
                    output_tokens,
                    total_tokens,
                }),
                persona_llm::StreamEvent::Done { .. } => {}
            }
        }

        let tool_calls: Vec<ToolCall> = buffers
            .into_iter()
            .filter_map(|(index, buffer)| match (buffer.id, buffer.name) {
                (Some(id), Some(name)) => Some(ToolCall::function(id, name, buffer.arguments)),
                _ => {
                    warn!(index, "Dropping tool call without id or name");
                    None
                }
            })
            .collect();

        Ok(Message::ai_turn(content, tool_calls))
    }
}

#[async_trait]
impl Node for LLMNode {
    async fn execute(&self, state: &mut RunState, event_tx: &EventSender) -> Result<()> {
        debug!(
            model = %self.config.model,
            messages = state.messages.len(),
            run_id = %state.run_id,
            "Calling model"
        );

        let stream = self.client.chat_stream(self.build_request(state)).await?;
        let message = self.process_stream(stream, state, event_tx).await?;
        state.add_message(message);

        Ok(())
    }

    fn node_type(&self) -> NodeType {
        NodeType::LLM
    }
}
