use std::sync::Arc;
use std::time::Instant;

use persona_llm::{ChatClient, Message};
use persona_persist::{NewRun, PersistenceClient, RunCompletion, RunStatus};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::builder::AgentBuilder;
use crate::error::RunError;
use crate::node::{EventSender, Node, NodeType};
use crate::nodes::{LLMNode, ToolNode};
use crate::router::{NextNode, Router, SimpleRouter};
use crate::tools::{ToolExecutor, ToolRegistry};
use crate::types::{AgentConfig, LLMConfig, RunInput, RunOutput, RunState, StreamEvent};

const EVENT_BUFFER: usize = 1000;

/// A chat agent speaking as one persona.
///
/// Cloning is cheap; clones share the model client, tools and store.
#[derive(Clone)]
pub struct Agent {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) system_prompt: String,
    pub(crate) llm_config: LLMConfig,
    pub(crate) config: AgentConfig,
    pub(crate) client: Arc<dyn ChatClient>,
    pub(crate) tools: Arc<ToolRegistry>,
    pub(crate) persistence: Option<Arc<dyn PersistenceClient>>,
}

impl Agent {
    pub fn builder() -> AgentBuilder {
        AgentBuilder::new()
    }

    /// URL-safe identifier derived from the agent name.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn model(&self) -> &str {
        &self.llm_config.model
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.list_tools()
    }

    pub fn persistence(&self) -> Option<&Arc<dyn PersistenceClient>> {
        self.persistence.as_ref()
    }

    /// Run in the background and stream events.
    ///
    /// Dropping the receiver cancels the run at its next event.
    pub fn spawn_run(&self, input: RunInput) -> mpsc::Receiver<StreamEvent> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let agent = self.clone();

        tokio::spawn(async move {
            if let Err(e) = agent.execute(input, tx).await {
                warn!(agent_id = %agent.id, error = %e, "Streaming run failed");
            }
        });

        rx
    }

    /// Run to completion and return the final answer.
    ///
    /// The run executes on its own task, so it is still finished and stored
    /// when the caller stops waiting for it.
    pub async fn run(&self, input: RunInput) -> Result<RunOutput, RunError> {
        let agent = self.clone();
        let handle = tokio::spawn(async move {
            let (tx, mut rx) = mpsc::channel(EVENT_BUFFER);
            let drain = async move { while rx.recv().await.is_some() {} };

            let (output, ()) = tokio::join!(agent.execute(input, tx), drain);
            output
        });

        match handle.await {
            Ok(output) => output,
            Err(e) => {
                error!(agent_id = %self.id, error = %e, "Run task aborted");
                Err(RunError::Cancelled)
            }
        }
    }

    async fn execute(&self, input: RunInput, tx: EventSender) -> Result<RunOutput, RunError> {
        let started = Instant::now();

        let message = input.message.trim().to_string();
        if message.is_empty() {
            return Err(report_early(&tx, RunError::EmptyMessage, started).await);
        }

        let session_id = input
            .session_id
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let run_id = uuid::Uuid::new_v4().to_string();

        let history = match self
            .prepare(&run_id, &session_id, input.user_id.as_deref(), &message)
            .await
        {
            Ok(history) => history,
            Err(e) => return Err(report_early(&tx, e, started).await),
        };

        info!(
            agent_id = %self.id,
            run_id = %run_id,
            session_id = %session_id,
            history = history.len(),
            "Run started"
        );

        let mut context = Vec::with_capacity(history.len() + 1);
        context.push(Message::system(self.system_prompt.clone()));
        context.extend(history);
        let mut state = RunState::new(run_id, session_id, context, Message::human(message));

        let result = if tx
            .send(StreamEvent::RunStarted {
                run_id: state.run_id.clone(),
                session_id: state.session_id.clone(),
                agent_id: self.id.clone(),
            })
            .await
            .is_err()
        {
            Err(RunError::Cancelled)
        } else {
            match tokio::time::timeout(self.config.execution_timeout, self.run_loop(&mut state, &tx)).await {
                Ok(result) => result,
                Err(_) => Err(RunError::Timeout(self.config.execution_timeout)),
            }
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        self.finish(&state, &result, duration_ms).await;

        let status = match &result {
            Ok(()) => RunStatus::Completed,
            Err(e) => {
                let _ = tx.send(StreamEvent::Error { message: e.to_string() }).await;
                RunStatus::Error
            }
        };
        let _ = tx
            .send(StreamEvent::RunCompleted {
                status,
                total_duration_ms: duration_ms,
            })
            .await;

        info!(
            run_id = %state.run_id,
            status = %status,
            duration_ms,
            tool_calls = state.tool_executions.len(),
            "Run finished"
        );

        result.map(|()| RunOutput {
            content: state.final_content(),
            run_id: state.run_id,
            agent_id: self.id.clone(),
            agent_name: self.name.clone(),
            session_id: state.session_id,
            tool_calls: state.tool_executions,
            usage: state.usage,
            status,
            duration_ms,
        })
    }

    /// Register the run and load the session history.
    async fn prepare(
        &self,
        run_id: &str,
        session_id: &str,
        user_id: Option<&str>,
        message: &str,
    ) -> Result<Vec<Message>, RunError> {
        let Some(store) = &self.persistence else {
            return Ok(Vec::new());
        };

        store.ensure_session(session_id, &self.id, user_id).await?;
        let history = if self.config.history_runs > 0 {
            store.history(session_id, self.config.history_runs).await?
        } else {
            Vec::new()
        };
        store
            .start_run(NewRun {
                run_id: run_id.to_string(),
                session_id: session_id.to_string(),
                agent_id: self.id.clone(),
                user_id: user_id.map(str::to_string),
                input: message.to_string(),
            })
            .await?;

        Ok(history)
    }

    async fn run_loop(&self, state: &mut RunState, tx: &EventSender) -> Result<(), RunError> {
        let llm_node = LLMNode::new(
            Arc::clone(&self.client),
            self.tools.definitions(),
            self.llm_config.clone(),
        );
        let tool_node = ToolNode::new(self.tools.clone());
        let router = SimpleRouter;

        let mut current = NodeType::LLM;
        let mut iteration = 0;

        loop {
            if iteration >= self.config.max_iterations {
                return Err(RunError::MaxIterations(self.config.max_iterations));
            }

            let outcome = match current {
                NodeType::LLM => llm_node.execute(state, tx).await,
                NodeType::Tool => tool_node.execute(state, tx).await,
            };
            if let Err(e) = outcome {
                return Err(if tx.is_closed() {
                    RunError::Cancelled
                } else {
                    RunError::Model(format!("{:#}", e))
                });
            }

            match router.next(state, current) {
                NextNode::End => return Ok(()),
                NextNode::LLM => current = NodeType::LLM,
                NextNode::Tool => current = NodeType::Tool,
            }

            iteration += 1;
        }
    }

    /// Store the run's messages and outcome. Storage failures are logged so
    /// the caller still gets the answer.
    async fn finish(&self, state: &RunState, result: &Result<(), RunError>, duration_ms: u64) {
        let Some(store) = &self.persistence else {
            return;
        };

        if let Err(e) = store
            .save_messages(&state.run_id, &state.session_id, state.new_messages())
            .await
        {
            error!(run_id = %state.run_id, error = %e, "Failed to save run messages");
        }

        let recorded = match result {
            Ok(()) => {
                store
                    .complete_run(
                        &state.run_id,
                        RunCompletion {
                            content: Some(state.final_content()),
                            input_tokens: Some(state.usage.input_tokens),
                            output_tokens: Some(state.usage.output_tokens),
                            duration_ms,
                        },
                    )
                    .await
            }
            Err(e) => store.fail_run(&state.run_id, &e.to_string(), duration_ms).await,
        };
        if let Err(e) = recorded {
            error!(run_id = %state.run_id, error = %e, "Failed to record run status");
        }
    }
}

/// Emit the terminal events for a run that failed before it started.
async fn report_early(tx: &EventSender, error: RunError, started: Instant) -> RunError {
    let _ = tx.send(StreamEvent::Error { message: error.to_string() }).await;
    let _ = tx
        .send(StreamEvent::RunCompleted {
            status: RunStatus::Error,
            total_duration_ms: started.elapsed().as_millis() as u64,
        })
        .await;
    error
}

/// Lowercase, dash-separated form of `name`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Harish Chatbot Agent"), "harish-chatbot-agent");
        assert_eq!(slugify("  Jane  O'Neil -- bot! "), "jane-o-neil-bot");
        assert_eq!(slugify("***"), "");
    }
}
