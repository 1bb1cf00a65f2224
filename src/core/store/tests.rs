use serde_json::json;

use super::*;

async fn seeded() -> (SqliteStore, i64) {
    let store = SqliteStore::open_in_memory().unwrap();
    let task = store
        .create_task(&NewTask {
            name: "Write report".into(),
            description: "Quarterly numbers".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    let agent = store
        .create_agent(&NewAgent {
            name: "writer".into(),
            tools: vec!["shell".into(), "complete".into()],
            ..Default::default()
        })
        .await
        .unwrap();
    let conversation = store.create_conversation(task.id, agent.id).await.unwrap();
    (store, conversation.id)
}

#[tokio::test]
async fn default_providers_are_seeded_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("workbench.db");
    {
        let store = SqliteStore::open(&path).await.unwrap();
        let names: Vec<String> = store
            .list_providers()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["deepseek", "tongyi", "volcengine"]);
    }
    let reopened = SqliteStore::open(&path).await.unwrap();
    assert_eq!(reopened.list_providers().await.unwrap().len(), 3);
}

#[tokio::test]
async fn upsert_provider_sets_key_and_keeps_base_url() {
    let store = SqliteStore::open_in_memory().unwrap();
    let before = store.find_provider_by_name("deepseek").await.unwrap().unwrap();
    assert!(before.api_key.is_empty());

    let updated = store
        .upsert_provider("deepseek", Some("sk-1"), None, true)
        .await
        .unwrap();
    assert_eq!(updated.id, before.id);
    assert_eq!(updated.api_key, "sk-1");
    assert_eq!(updated.base_url, before.base_url);
    assert!(updated.enabled);

    let custom = store
        .upsert_provider("local", Some("k"), Some("http://127.0.0.1:9/v1"), true)
        .await
        .unwrap();
    assert_eq!(custom.base_url, "http://127.0.0.1:9/v1");
    assert!(store.get_provider(custom.id).await.unwrap().is_some());

    let disabled = store
        .upsert_provider("deepseek", None, None, false)
        .await
        .unwrap();
    assert_eq!(disabled.api_key, "sk-1");
    assert!(!disabled.enabled);
}

#[tokio::test]
async fn new_conversation_is_active_and_empty() {
    let (store, id) = seeded().await;
    let conversation = store.get_conversation(id).await.unwrap().unwrap();
    assert_eq!(conversation.status, ConversationStatus::Active);
    assert!(store.list_messages(id).await.unwrap().is_empty());
    assert_eq!(store.last_step_num(id).await.unwrap(), 0);
    assert!(store.get_conversation(id + 100).await.unwrap().is_none());
}

#[tokio::test]
async fn messages_come_back_in_insertion_order_with_metadata() {
    let (store, id) = seeded().await;
    store
        .append_message(id, Role::User, "first", MessageType::Text, &json!({}))
        .await
        .unwrap();
    store
        .append_message(
            id,
            Role::Assistant,
            "which one?",
            MessageType::Question,
            &json!({"options": ["a", "b"]}),
        )
        .await
        .unwrap();
    store
        .append_message(id, Role::System, "[Tool Result]", MessageType::Result, &json!({"step_num": 1}))
        .await
        .unwrap();

    let messages = store.list_messages(id).await.unwrap();
    let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["first", "which one?", "[Tool Result]"]);
    assert_eq!(messages[1].role, "assistant");
    assert_eq!(messages[1].message_type, MessageType::Question);
    assert_eq!(messages[1].metadata["options"][1], json!("b"));
    assert_eq!(messages[2].role, "system");
}

#[tokio::test]
async fn steps_start_running_and_can_be_finalized() {
    let (store, id) = seeded().await;
    let step_id = store
        .append_step(id, 1, "look around", "shell", r#"{"command":"ls"}"#)
        .await
        .unwrap();
    let steps = store.list_steps(id).await.unwrap();
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].status, StepStatus::Running);

    store
        .update_step(step_id, StepStatus::Failed, "", "exit status 1")
        .await
        .unwrap();
    store.append_step(id, 2, "", "complete", "{}").await.unwrap();

    let steps = store.list_steps(id).await.unwrap();
    assert_eq!(steps[0].status, StepStatus::Failed);
    assert_eq!(steps[0].error, "exit status 1");
    assert_eq!(store.last_step_num(id).await.unwrap(), 2);
}

#[tokio::test]
async fn duplicate_step_numbers_are_rejected() {
    let (store, id) = seeded().await;
    store.append_step(id, 1, "", "shell", "{}").await.unwrap();
    assert!(store.append_step(id, 1, "", "shell", "{}").await.is_err());
}

#[tokio::test]
async fn status_updates_require_an_existing_row() {
    let (store, id) = seeded().await;
    store
        .update_conversation_status(id, ConversationStatus::WaitingUser)
        .await
        .unwrap();
    assert_eq!(
        store.get_conversation(id).await.unwrap().unwrap().status,
        ConversationStatus::WaitingUser
    );
    assert!(
        store
            .update_conversation_status(9999, ConversationStatus::Failed)
            .await
            .is_err()
    );
    assert!(store.update_step(9999, StepStatus::Success, "", "").await.is_err());
}

#[tokio::test]
async fn agent_fields_survive_storage() {
    let store = SqliteStore::open_in_memory().unwrap();
    let provider = store.find_provider_by_name("tongyi").await.unwrap().unwrap();
    let agent = store
        .create_agent(&NewAgent {
            name: " coder ".into(),
            prompt: "You write Rust.".into(),
            provider_id: Some(provider.id),
            model: "qwen-max".into(),
            tools: vec!["read_file".into(), "complete".into()],
            working_dir: "/tmp".into(),
            max_steps: Some(7),
        })
        .await
        .unwrap();
    assert_eq!(agent.name, "coder");
    assert_eq!(agent.provider_id, Some(provider.id));
    assert_eq!(agent.tools, vec!["read_file", "complete"]);
    assert_eq!(agent.max_steps, Some(7));
    assert!(agent.enabled);
    assert_eq!(store.list_agents().await.unwrap().len(), 1);
}

#[tokio::test]
async fn blank_names_are_rejected() {
    let store = SqliteStore::open_in_memory().unwrap();
    assert!(store.create_task(&NewTask::default()).await.is_err());
    assert!(store.create_agent(&NewAgent::default()).await.is_err());
    assert!(store.upsert_provider("  ", Some("k"), None, true).await.is_err());
}

#[tokio::test]
async fn agents_can_be_disabled_and_reenabled() {
    let store = SqliteStore::open_in_memory().unwrap();
    let agent = store
        .create_agent(&NewAgent {
            name: "sleeper".into(),
            ..Default::default()
        })
        .await
        .unwrap();

    store.set_agent_enabled(agent.id, false).await.unwrap();
    assert!(!store.get_agent(agent.id).await.unwrap().unwrap().enabled);
    store.set_agent_enabled(agent.id, true).await.unwrap();
    assert!(store.get_agent(agent.id).await.unwrap().unwrap().enabled);

    assert!(store.set_agent_enabled(999, false).await.is_err());
}
