use std::time::Duration;

use persona_llm::{Message, ToolCall};
use persona_persist::{
    MessageType, NewRun, PersistError, PersistenceClient, RunCompletion, RunStatus, SessionQuery,
    SqlitePersistenceClient,
};

async fn store() -> SqlitePersistenceClient {
    SqlitePersistenceClient::connect_in_memory().await.unwrap()
}

fn new_run(run_id: &str, session_id: &str, input: &str) -> NewRun {
    NewRun {
        run_id: run_id.to_string(),
        session_id: session_id.to_string(),
        agent_id: "jane-doe".to_string(),
        user_id: Some("visitor".to_string()),
        input: input.to_string(),
    }
}

async fn completed_run(store: &SqlitePersistenceClient, run_id: &str, session_id: &str, question: &str, answer: &str) {
    store.start_run(new_run(run_id, session_id, question)).await.unwrap();
    store
        .save_messages(run_id, session_id, &[Message::human(question), Message::ai(answer)])
        .await
        .unwrap();
    store
        .complete_run(
            run_id,
            RunCompletion {
                content: Some(answer.to_string()),
                input_tokens: Some(10),
                output_tokens: Some(5),
                duration_ms: 42,
            },
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_ensure_session_is_idempotent() {
    let store = store().await;

    let first = store.ensure_session("s1", "jane-doe", Some("u1")).await.unwrap();
    let again = store.ensure_session("s1", "jane-doe", None).await.unwrap();

    assert_eq!(first, again);
    assert_eq!(first.user_id.as_deref(), Some("u1"));
    assert!(first.title.is_none());
}

#[tokio::test]
async fn test_first_run_sets_title_and_bumps_session() {
    let store = store().await;
    let created = store.ensure_session("s1", "jane-doe", None).await.unwrap();
    tokio::time::sleep(Duration::from_millis(2)).await;

    completed_run(&store, "r1", "s1", "What projects have you worked on?", "Plenty.").await;
    completed_run(&store, "r2", "s1", "Another question", "Sure.").await;

    let session = store.get_session("s1").await.unwrap().unwrap();
    assert_eq!(session.title.as_deref(), Some("What projects have you worked on?"));
    assert!(session.updated_at > created.updated_at);

    let run = store.get_run("r1").await.unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.content.as_deref(), Some("Plenty."));
    assert_eq!(run.input_tokens, Some(10));
    assert_eq!(run.duration_ms, Some(42));
    assert!(run.completed_at.is_some());
}

#[tokio::test]
async fn test_start_run_requires_session() {
    let store = store().await;

    let err = store.start_run(new_run("r1", "missing", "hi")).await.unwrap_err();

    assert!(matches!(err, PersistError::SessionNotFound(_)));
    assert!(store.get_run("r1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_history_keeps_last_completed_runs() {
    let store = store().await;
    store.ensure_session("s1", "jane-doe", None).await.unwrap();

    completed_run(&store, "r1", "s1", "one", "1").await;
    completed_run(&store, "r2", "s1", "two", "2").await;
    completed_run(&store, "r3", "s1", "three", "3").await;

    store.start_run(new_run("r4", "s1", "four")).await.unwrap();
    store.save_messages("r4", "s1", &[Message::human("four")]).await.unwrap();
    store.fail_run("r4", "LLM error", 7).await.unwrap();

    let history = store.history("s1", 2).await.unwrap();
    assert_eq!(
        history,
        vec![
            Message::human("two"),
            Message::ai("2"),
            Message::human("three"),
            Message::ai("3"),
        ]
    );

    assert!(store.history("s1", 0).await.unwrap().is_empty());
    assert_eq!(store.history("s1", 10).await.unwrap().len(), 6);

    let failed = store.get_run("r4").await.unwrap().unwrap();
    assert_eq!(failed.status, RunStatus::Error);
    assert_eq!(failed.error.as_deref(), Some("LLM error"));
}

#[tokio::test]
async fn test_history_is_scoped_to_session() {
    let store = store().await;
    store.ensure_session("a", "jane-doe", None).await.unwrap();
    store.ensure_session("b", "jane-doe", None).await.unwrap();

    completed_run(&store, "ra", "a", "from a", "A").await;
    completed_run(&store, "rb", "b", "from b", "B").await;

    let history = store.history("a", 5).await.unwrap();
    assert_eq!(history, vec![Message::human("from a"), Message::ai("A")]);
}

#[tokio::test]
async fn test_tool_turns_roundtrip_through_storage() {
    let store = store().await;
    store.ensure_session("s1", "jane-doe", None).await.unwrap();
    store.start_run(new_run("r1", "s1", "Book me")).await.unwrap();

    let call = ToolCall::function("call_1", "send_lead_to_telegram", r#"{"name":"Ana"}"#);
    let messages = vec![
        Message::human("Book me"),
        Message::ai_with_tools(vec![call]),
        Message::tool_result("call_1", "Successfully sent"),
    ];
    store.save_messages("r1", "s1", &messages).await.unwrap();
    store.save_messages("r1", "s1", &[Message::ai("Done!")]).await.unwrap();
    store.complete_run("r1", RunCompletion::default()).await.unwrap();

    let rows = store.session_messages("s1").await.unwrap();
    let seqs: Vec<i64> = rows.iter().map(|r| r.seq).collect();
    assert_eq!(seqs, vec![0, 1, 2, 3]);
    assert_eq!(rows[1].message_type, MessageType::ToolCall);
    assert_eq!(rows[2].tool_name.as_deref(), Some("send_lead_to_telegram"));

    let mut expected = messages.clone();
    expected.push(Message::ai("Done!"));
    assert_eq!(store.history("s1", 1).await.unwrap(), expected);
}

#[tokio::test]
async fn test_list_sessions_filters_and_pages() {
    let store = store().await;
    store.ensure_session("s1", "jane-doe", Some("u1")).await.unwrap();
    store.ensure_session("s2", "jane-doe", Some("u2")).await.unwrap();
    store.ensure_session("s3", "other", Some("u1")).await.unwrap();

    let all = store.list_sessions(&SessionQuery::new(10)).await.unwrap();
    let ids: Vec<_> = all.iter().map(|s| s.session_id.as_str()).collect();
    assert_eq!(ids, vec!["s3", "s2", "s1"]);

    let jane = store
        .list_sessions(&SessionQuery::new(10).agent("jane-doe").user("u1"))
        .await
        .unwrap();
    assert_eq!(jane.len(), 1);
    assert_eq!(jane[0].session_id, "s1");

    let page = store.list_sessions(&SessionQuery::new(1).offset(1)).await.unwrap();
    assert_eq!(page[0].session_id, "s2");

    tokio::time::sleep(Duration::from_millis(2)).await;
    completed_run(&store, "r1", "s1", "hello", "hi").await;
    let all = store.list_sessions(&SessionQuery::new(10)).await.unwrap();
    assert_eq!(all[0].session_id, "s1");
}

#[tokio::test]
async fn test_rename_and_delete_session() {
    let store = store().await;
    store.ensure_session("s1", "jane-doe", None).await.unwrap();
    completed_run(&store, "r1", "s1", "hello", "hi").await;

    let renamed = store.rename_session("s1", "Intro call").await.unwrap();
    assert_eq!(renamed.title.as_deref(), Some("Intro call"));

    store.delete_session("s1").await.unwrap();
    assert!(store.get_session("s1").await.unwrap().is_none());
    assert!(store.get_run("r1").await.unwrap().is_none());
    assert!(store.session_messages("s1").await.unwrap().is_empty());

    assert!(store.delete_session("s1").await.unwrap_err().is_not_found());
    assert!(store.rename_session("s1", "x").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_complete_unknown_run() {
    let store = store().await;

    let err = store.complete_run("nope", RunCompletion::default()).await.unwrap_err();
    assert!(matches!(err, PersistError::RunNotFound(_)));
    assert!(store.fail_run("nope", "x", 0).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_ping() {
    store().await.ping().await.unwrap();
}
