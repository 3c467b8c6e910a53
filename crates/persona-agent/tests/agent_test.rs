use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use persona_agent::{Agent, AgentConfig, AgentTool, RunError, RunInput, StreamEvent};
use persona_llm::{
    ChatClient, ChatRequest, ChatResponse, EventStream, Message, StreamEvent as LlmEvent, Tool,
    ToolCall,
};
use persona_persist::{PersistenceClient, RunStatus, SqlitePersistenceClient};
use serde_json::{json, Value};

/// Plays back one scripted response per model call and records requests.
#[derive(Default)]
struct ScriptedClient {
    scripts: Mutex<VecDeque<Vec<LlmEvent>>>,
    requests: Mutex<Vec<ChatRequest>>,
    repeat_last: bool,
}

impl ScriptedClient {
    fn new(scripts: Vec<Vec<LlmEvent>>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            ..Default::default()
        }
    }

    fn repeating(script: Vec<LlmEvent>) -> Self {
        Self {
            scripts: Mutex::new(vec![script].into()),
            repeat_last: true,
            ..Default::default()
        }
    }

    fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatClient for ScriptedClient {
    async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse> {
        bail!("not used")
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<EventStream> {
        self.requests.lock().unwrap().push(request);
        let mut scripts = self.scripts.lock().unwrap();
        let script = if self.repeat_last && scripts.len() == 1 {
            scripts.front().cloned()
        } else {
            scripts.pop_front()
        };
        match script {
            Some(events) => Ok(Box::pin(futures::stream::iter(events.into_iter().map(Ok)))),
            None => bail!("OpenAI API error (500): no scripted response"),
        }
    }
}

/// Never yields, for timeout tests.
struct StalledClient;

#[async_trait]
impl ChatClient for StalledClient {
    async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse> {
        bail!("not used")
    }

    async fn chat_stream(&self, _request: ChatRequest) -> Result<EventStream> {
        Ok(Box::pin(futures::stream::pending::<Result<LlmEvent>>()))
    }
}

/// Replies after a delay, for callers that give up early.
struct SlowClient {
    delay: Duration,
}

#[async_trait]
impl ChatClient for SlowClient {
    async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse> {
        bail!("not used")
    }

    async fn chat_stream(&self, _request: ChatRequest) -> Result<EventStream> {
        tokio::time::sleep(self.delay).await;
        Ok(Box::pin(futures::stream::iter(reply("late answer").into_iter().map(Ok))))
    }
}

struct LookupTool {
    fail: bool,
}

#[async_trait]
impl AgentTool for LookupTool {
    fn name(&self) -> &str {
        "lookup"
    }

    fn definition(&self) -> Tool {
        Tool::new("lookup", "Look something up", json!({"type": "object"}))
    }

    async fn call(&self, arguments: Value) -> Result<String> {
        if self.fail {
            bail!("service unavailable");
        }
        Ok(format!("found {}", arguments["q"].as_str().unwrap_or("?")))
    }
}

fn reply(text: &str) -> Vec<LlmEvent> {
    vec![
        LlmEvent::Message { content: text.to_string() },
        LlmEvent::Usage {
            input_tokens: 20,
            output_tokens: 4,
            total_tokens: 24,
        },
        LlmEvent::Done {
            finish_reason: Some("stop".into()),
        },
    ]
}

fn tool_request(id: &str) -> Vec<LlmEvent> {
    vec![
        LlmEvent::ToolCall {
            index: 0,
            id: Some(id.to_string()),
            name: Some("lookup".into()),
            arguments: Some(r#"{"q":"#.into()),
        },
        LlmEvent::ToolCall {
            index: 0,
            id: None,
            name: None,
            arguments: Some(r#""rust"}"#.into()),
        },
        LlmEvent::Done {
            finish_reason: Some("tool_calls".into()),
        },
    ]
}

fn agent(client: Arc<dyn ChatClient>, store: Option<Arc<SqlitePersistenceClient>>, config: AgentConfig) -> Agent {
    let mut builder = Agent::builder()
        .name("Jane Chatbot Agent")
        .description("Answers as Jane")
        .system_prompt("You are Jane.")
        .llm_client(client)
        .config(config)
        .tool(LookupTool { fail: false });
    if let Some(store) = store {
        builder = builder.with_persistence(store);
    }
    builder.build().unwrap()
}

async fn store() -> Arc<SqlitePersistenceClient> {
    Arc::new(SqlitePersistenceClient::connect_in_memory().await.unwrap())
}

#[tokio::test]
async fn test_plain_run_is_stored() {
    let client = Arc::new(ScriptedClient::new(vec![reply("Hi, I'm Jane.")]));
    let store = store().await;
    let agent = agent(client.clone(), Some(store.clone()), AgentConfig::default());

    let output = agent
        .run(RunInput::new("Who are you?").with_session("s1"))
        .await
        .unwrap();

    assert_eq!(agent.id(), "jane-chatbot-agent");
    assert_eq!(output.agent_id, "jane-chatbot-agent");
    assert_eq!(output.agent_name, "Jane Chatbot Agent");
    assert_eq!(output.session_id, "s1");
    assert_eq!(output.content, "Hi, I'm Jane.");
    assert_eq!(output.status, RunStatus::Completed);
    assert_eq!(output.usage.total_tokens, 24);

    let request = &client.requests()[0];
    assert_eq!(request.messages[0], Message::system("You are Jane."));
    assert_eq!(request.messages[1], Message::human("Who are you?"));

    let run = store.get_run(&output.run_id).await.unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.content.as_deref(), Some("Hi, I'm Jane."));
    assert_eq!(run.input_tokens, Some(20));

    let rows = store.session_messages("s1").await.unwrap();
    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn test_tool_call_is_executed_and_fed_back() {
    let client = Arc::new(ScriptedClient::new(vec![tool_request("call_1"), reply("Rust it is.")]));
    let store = store().await;
    let agent = agent(client.clone(), Some(store.clone()), AgentConfig::default());

    let output = agent
        .run(RunInput::new("What do you use?").with_session("s1"))
        .await
        .unwrap();

    assert_eq!(output.content, "Rust it is.");
    assert_eq!(output.tool_calls.len(), 1);
    assert_eq!(output.tool_calls[0].result, "found rust");
    assert_eq!(output.tool_calls[0].arguments, r#"{"q":"rust"}"#);
    assert!(!output.tool_calls[0].is_error);

    let second = &client.requests()[1];
    assert_eq!(
        second.messages[2..],
        [
            Message::ai_with_tools(vec![ToolCall::function("call_1", "lookup", r#"{"q":"rust"}"#)]),
            Message::tool_result("call_1", "found rust"),
        ]
    );
    assert_eq!(second.options.tools.as_ref().map(|t| t.len()), Some(1));

    let history = store.history("s1", 1).await.unwrap();
    assert_eq!(history.len(), 4);
    assert_eq!(history[3], Message::ai("Rust it is."));
}

#[tokio::test]
async fn test_tool_failure_does_not_abort_run() {
    let client = Arc::new(ScriptedClient::new(vec![tool_request("call_1"), reply("Sorry about that.")]));
    let agent = Agent::builder()
        .name("Jane")
        .system_prompt("You are Jane.")
        .llm_client(client.clone())
        .tool(LookupTool { fail: true })
        .build()
        .unwrap();

    let output = agent.run(RunInput::new("Look it up")).await.unwrap();

    assert_eq!(output.status, RunStatus::Completed);
    assert!(output.tool_calls[0].is_error);
    assert_eq!(output.tool_calls[0].result, "Tool execution failed: service unavailable");
    assert_eq!(
        client.requests()[1].messages.last(),
        Some(&Message::tool_result("call_1", "Tool execution failed: service unavailable"))
    );
}

#[tokio::test]
async fn test_max_iterations_ends_run_with_error() {
    let client = Arc::new(ScriptedClient::repeating(tool_request("call_x")));
    let store = store().await;
    let agent = agent(
        client,
        Some(store.clone()),
        AgentConfig::default().with_max_iterations(3),
    );

    let mut rx = agent.spawn_run(RunInput::new("loop forever").with_session("s1"));
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    assert!(events.contains(&StreamEvent::Error {
        message: "max iterations (3) reached".into()
    }));
    assert!(matches!(
        events.last(),
        Some(StreamEvent::RunCompleted {
            status: RunStatus::Error,
            ..
        })
    ));

    let runs = store.list_runs("s1").await.unwrap();
    assert_eq!(runs[0].status, RunStatus::Error);
    assert_eq!(runs[0].error.as_deref(), Some("max iterations (3) reached"));
    assert!(store.history("s1", 5).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_history_is_limited_to_recent_runs() {
    let client = Arc::new(ScriptedClient::new(vec![reply("one"), reply("two"), reply("three")]));
    let store = store().await;
    let agent = agent(
        client.clone(),
        Some(store),
        AgentConfig::default().with_history_runs(1),
    );

    for question in ["first", "second", "third"] {
        agent
            .run(RunInput::new(question).with_session("s1"))
            .await
            .unwrap();
    }

    let third = &client.requests()[2];
    assert_eq!(
        third.messages,
        vec![
            Message::system("You are Jane."),
            Message::human("second"),
            Message::ai("two"),
            Message::human("third"),
        ]
    );
}

#[tokio::test]
async fn test_streaming_event_order() {
    let client = Arc::new(ScriptedClient::new(vec![reply("Hello")]));
    let agent = agent(client, None, AgentConfig::default());

    let mut rx = agent.spawn_run(RunInput::new("hi"));
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    let names: Vec<_> = events.iter().map(StreamEvent::event_name).collect();
    assert_eq!(names, vec!["run_started", "message", "usage", "done", "run_completed"]);

    match &events[0] {
        StreamEvent::RunStarted { session_id, agent_id, .. } => {
            assert!(uuid::Uuid::parse_str(session_id).is_ok());
            assert_eq!(agent_id, "jane-chatbot-agent");
        }
        other => panic!("unexpected first event {:?}", other),
    }
}

#[tokio::test]
async fn test_model_failure_is_reported() {
    let client = Arc::new(ScriptedClient::new(vec![]));
    let store = store().await;
    let agent = agent(client, Some(store.clone()), AgentConfig::default());

    let err = agent
        .run(RunInput::new("hi").with_session("s1"))
        .await
        .unwrap_err();

    assert!(matches!(err, RunError::Model(ref m) if m.contains("no scripted response")));
    let runs = store.list_runs("s1").await.unwrap();
    assert_eq!(runs[0].status, RunStatus::Error);
}

#[tokio::test]
async fn test_execution_timeout() {
    let agent = agent(
        Arc::new(StalledClient),
        None,
        AgentConfig::default().with_timeout(Duration::from_millis(50)),
    );

    let err = agent.run(RunInput::new("hi")).await.unwrap_err();
    assert!(matches!(err, RunError::Timeout(_)));
}

#[tokio::test]
async fn test_timed_out_run_is_stored_as_error() {
    let store = store().await;
    let agent = agent(
        Arc::new(StalledClient),
        Some(store.clone()),
        AgentConfig::default().with_timeout(Duration::from_millis(50)),
    );

    let err = agent.run(RunInput::new("hi").with_session("s1")).await.unwrap_err();

    assert!(matches!(err, RunError::Timeout(_)));
    let runs = store.list_runs("s1").await.unwrap();
    assert_eq!(runs[0].status, RunStatus::Error);
    assert!(runs[0].error.as_deref().unwrap().contains("timeout"));
}

#[tokio::test]
async fn test_run_finishes_after_caller_stops_waiting() {
    let store = store().await;
    let agent = agent(
        Arc::new(SlowClient { delay: Duration::from_millis(200) }),
        Some(store.clone()),
        AgentConfig::default(),
    );

    let waited = tokio::time::timeout(
        Duration::from_millis(20),
        agent.run(RunInput::new("hi").with_session("s1")),
    )
    .await;
    assert!(waited.is_err());

    tokio::time::sleep(Duration::from_millis(600)).await;

    let runs = store.list_runs("s1").await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, RunStatus::Completed);
    assert_eq!(runs[0].content.as_deref(), Some("late answer"));
    assert_eq!(store.session_messages("s1").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_empty_message_is_rejected() {
    let client = Arc::new(ScriptedClient::new(vec![reply("unused")]));
    let agent = agent(client.clone(), None, AgentConfig::default());

    let err = agent.run(RunInput::new("   ")).await.unwrap_err();

    assert!(err.is_client_error());
    assert!(client.requests().is_empty());
}
