use persona_llm::Message;
use persona_persist::{
    restore_from, PersistError, PersistenceClient, SqliteOptions, SqlitePersistenceClient,
};

async fn seeded(path: &std::path::Path) -> SqlitePersistenceClient {
    let store = SqlitePersistenceClient::connect(path, SqliteOptions::default())
        .await
        .unwrap();
    store.ensure_session("s1", "jane-doe", None).await.unwrap();
    store
        .start_run(persona_persist::NewRun {
            run_id: "r1".into(),
            session_id: "s1".into(),
            agent_id: "jane-doe".into(),
            user_id: None,
            input: "hello".into(),
        })
        .await
        .unwrap();
    store
        .save_messages("r1", "s1", &[Message::human("hello"), Message::ai("hi")])
        .await
        .unwrap();
    store
}

#[tokio::test]
async fn test_connect_creates_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data").join("agno.db");

    let store = SqlitePersistenceClient::connect(&path, SqliteOptions::default())
        .await
        .unwrap();
    store.ping().await.unwrap();
    store.close().await;

    assert!(path.exists());
}

#[tokio::test]
async fn test_backup_then_restore() {
    let dir = tempfile::tempdir().unwrap();
    let live = dir.path().join("agno.db");
    let backup = dir.path().join("backups").join("agno-1.db");

    let store = seeded(&live).await;
    store.backup_to(&backup).await.unwrap();

    let err = store.backup_to(&backup).await.unwrap_err();
    assert!(matches!(err, PersistError::InvalidBackup(_)));
    store.close().await;

    let restored = dir.path().join("restored.db");
    restore_from(&backup, &restored, false).await.unwrap();

    let reopened = SqlitePersistenceClient::connect(&restored, SqliteOptions::default())
        .await
        .unwrap();
    let rows = reopened.session_messages("s1").await.unwrap();
    assert_eq!(rows.len(), 2);
    reopened.close().await;
}

#[tokio::test]
async fn test_restore_refuses_existing_destination_without_force() {
    let dir = tempfile::tempdir().unwrap();
    let live = dir.path().join("agno.db");
    let backup = dir.path().join("backup.db");

    let store = seeded(&live).await;
    store.backup_to(&backup).await.unwrap();
    store.close().await;

    let err = restore_from(&backup, &live, false).await.unwrap_err();
    assert!(matches!(err, PersistError::InvalidBackup(_)));

    restore_from(&backup, &live, true).await.unwrap();
    assert!(!dir.path().join("agno.db-wal").exists());
}

#[tokio::test]
async fn test_restore_rejects_non_sqlite_file() {
    let dir = tempfile::tempdir().unwrap();
    let bogus = dir.path().join("notes.txt");
    std::fs::write(&bogus, "definitely not a database file").unwrap();

    let err = restore_from(&bogus, &dir.path().join("agno.db"), true)
        .await
        .unwrap_err();

    assert!(matches!(err, PersistError::InvalidBackup(_)));
    assert!(!dir.path().join("agno.db").exists());
}
