use std::sync::Arc;

use conversation_store::{
    export_all, import_all, ConfigurationRegistry, ConversationManager, FileKeyValueStore,
    HistorySink, KeyValueStore, StoreError,
};
use outline_core::{ConversationRecord, Dialect, Message, OutlineTree};
use serde_json::{json, Value};

async fn open(dir: &std::path::Path) -> (ConversationManager, ConfigurationRegistry) {
    let store: Arc<dyn KeyValueStore> = Arc::new(FileKeyValueStore::new(dir));
    let manager = ConversationManager::load(store.clone()).await.unwrap();
    let registry = ConfigurationRegistry::load(store).await.unwrap();
    (manager, registry)
}

#[tokio::test]
async fn test_export_then_import_into_fresh_store() {
    let source = tempfile::tempdir().unwrap();
    let target = tempfile::tempdir().unwrap();

    let (manager, registry) = open(source.path()).await;
    let added = registry.add().await.unwrap();
    let mut record = ConversationRecord::new();
    record.messages.push(Message::user("Plan a launch", &Dialect::sample()));
    manager.save_conversation(&record).await.unwrap();

    let json = export_all(&manager, &registry).await.unwrap();
    let value: Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["conversations"].as_array().unwrap().len(), 2);
    assert_eq!(value["configurations"].as_array().unwrap().len(), 2);

    let (imported_manager, imported_registry) = open(target.path()).await;
    let report = import_all(&imported_manager, &imported_registry, &json).await.unwrap();
    assert_eq!(report.conversations, 2);
    assert_eq!(report.configurations, 2);
    assert_eq!(report.skipped, 0);

    // Everything is on disk: a reload sees the same state.
    let (reloaded, reloaded_registry) = open(target.path()).await;
    let titles: Vec<String> = reloaded.list().await.into_iter().map(|s| s.title).collect();
    assert!(titles.contains(&"Plan a lau".to_string()));
    assert!(reloaded_registry.get(&added.id).await.is_ok());
}

#[tokio::test]
async fn test_legacy_keys_and_unreadable_entries() {
    let dir = tempfile::tempdir().unwrap();
    let (manager, registry) = open(dir.path()).await;

    let mut custom = Dialect::sample();
    custom.id = "custom".to_string();
    custom.name = "Custom".to_string();
    let legacy = json!({
        "chatHistories": [
            {"id": "legacy-1", "title": "Old chat", "messages": []},
            "not a conversation"
        ],
        "configurations": [serde_json::to_value(&custom).unwrap(), 42],
        "selectedConfig": {"id": "custom", "name": "Custom"}
    });

    let report = import_all(&manager, &registry, &legacy.to_string()).await.unwrap();
    assert_eq!(report.conversations, 1);
    assert_eq!(report.configurations, 1);
    assert_eq!(report.skipped, 2);

    assert_eq!(manager.active().await.id, "legacy-1");
    assert_eq!(registry.selected_id().await.as_deref(), Some("custom"));
}

#[tokio::test]
async fn test_selection_lock_survives_reload() {
    let dir = tempfile::tempdir().unwrap();
    let (manager, registry) = open(dir.path()).await;
    let other = registry.add().await.unwrap();

    let mut record = manager.active().await;
    record.outline_tree = Some(OutlineTree {
        root: "Thinking Process".to_string(),
        branches: Vec::new(),
    });
    record.dialect = Some(Dialect::sample());
    manager.save_conversation(&record).await.unwrap();

    let err = registry.select(&other.id, &record).await.unwrap_err();
    assert!(matches!(err, StoreError::ConfigurationLocked { .. }));
    assert_eq!(registry.selected_id().await.as_deref(), Some(Dialect::DEFAULT_ID));

    // A fresh conversation may switch.
    let fresh = manager.new_conversation(Some(&record)).await.unwrap();
    registry.select(&other.id, &fresh).await.unwrap();

    let (reloaded, reloaded_registry) = open(dir.path()).await;
    assert_eq!(reloaded_registry.selected_id().await, Some(other.id));
    assert_eq!(reloaded.active().await.id, fresh.id);
    assert!(reloaded.get(0).await.unwrap().has_outline());
}
