use std::fs;
use std::sync::Arc;

use job_protocol::{Conversation, ConversationId, Message, Selection};
use serde_json::json;
use session_store::{
    now_rfc3339, state_root, SessionSnapshot, SnapshotStore, SnapshotStoreError,
    SNAPSHOT_FILE_NAME,
};
use tempfile::TempDir;

fn store_in_tempdir() -> (TempDir, SnapshotStore) {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let store = SnapshotStore::new(dir.path().join("state"));
    (dir, store)
}

fn conversation(id: &str, messages: Vec<Message>) -> Conversation {
    Conversation {
        title: Some("Build a report".to_string()),
        messages: Arc::from(messages),
        ..Conversation::new(ConversationId::new(id))
    }
}

fn snapshot(conversations: Vec<Conversation>, current: Option<&str>) -> SessionSnapshot {
    SessionSnapshot::v1(
        "2026-02-14T00:00:00Z",
        conversations,
        current.map(ConversationId::new),
        Selection {
            provider: Some("local".to_string()),
            model: Some("large".to_string()),
            agent: None,
            mode: Some("chat".to_string()),
        },
    )
}

fn write_raw(store: &SnapshotStore, value: serde_json::Value) {
    fs::create_dir_all(store.root()).expect("state dir should be created");
    fs::write(store.path(), value.to_string()).expect("raw snapshot should be written");
}

#[test]
fn load_returns_none_when_nothing_saved() {
    let (_dir, store) = store_in_tempdir();

    assert!(store.load().expect("missing snapshot is not an error").is_none());
}

#[test]
fn save_then_load_restores_conversations_and_selection() {
    let (_dir, store) = store_in_tempdir();
    let saved = snapshot(
        vec![conversation(
            "conv-1",
            vec![
                Message::user("Build a report"),
                Message::assistant("Here it is"),
                Message::error("job timed out"),
            ],
        )],
        Some("conv-1"),
    );

    store.save(&saved).expect("save should succeed");
    let loaded = store
        .load()
        .expect("load should succeed")
        .expect("snapshot should exist");

    assert_eq!(loaded, saved);
    assert_eq!(
        store.path().file_name().and_then(|name| name.to_str()),
        Some(SNAPSHOT_FILE_NAME)
    );
    assert!(loaded.conversations[0].messages[2].is_error);
}

#[test]
fn save_replaces_previous_snapshot_without_leftover_temp_files() {
    let (_dir, store) = store_in_tempdir();

    store
        .save(&snapshot(vec![conversation("conv-1", Vec::new())], None))
        .expect("first save");
    store
        .save(&snapshot(
            vec![
                conversation("conv-1", Vec::new()),
                conversation("conv-2", vec![Message::user("second")]),
            ],
            Some("conv-2"),
        ))
        .expect("second save");

    let loaded = store.load().expect("load").expect("snapshot");
    assert_eq!(loaded.conversations.len(), 2);
    assert_eq!(
        loaded.current_conversation_id,
        Some(ConversationId::new("conv-2"))
    );

    let entries: Vec<_> = fs::read_dir(store.root())
        .expect("state dir should be readable")
        .map(|entry| entry.expect("dir entry").file_name())
        .collect();
    assert_eq!(entries, vec![std::ffi::OsString::from(SNAPSHOT_FILE_NAME)]);
}

#[test]
fn load_rejects_unsupported_version() {
    let (_dir, store) = store_in_tempdir();
    write_raw(
        &store,
        json!({
            "version": 2,
            "saved_at": "2026-02-14T00:00:00Z",
            "conversations": [],
            "current_conversation_id": null,
        }),
    );

    let error = store.load().expect_err("unsupported version must fail");
    assert!(matches!(
        error,
        SnapshotStoreError::UnsupportedVersion { found: 2, .. }
    ));
}

#[test]
fn load_rejects_unknown_fields() {
    let (_dir, store) = store_in_tempdir();
    write_raw(
        &store,
        json!({
            "version": 1,
            "saved_at": "2026-02-14T00:00:00Z",
            "conversations": [],
            "current_conversation_id": null,
            "is_sending": true,
        }),
    );

    let error = store.load().expect_err("unknown field must fail");
    assert!(matches!(error, SnapshotStoreError::JsonParse { .. }));
}

#[test]
fn load_rejects_invalid_saved_at() {
    let (_dir, store) = store_in_tempdir();
    write_raw(
        &store,
        json!({
            "version": 1,
            "saved_at": "yesterday",
            "conversations": [],
            "current_conversation_id": null,
        }),
    );

    let error = store.load().expect_err("invalid timestamp must fail");
    assert!(matches!(
        error,
        SnapshotStoreError::InvalidTimestamp {
            field: "saved_at",
            ..
        }
    ));
}

#[test]
fn load_rejects_dangling_current_conversation() {
    let (_dir, store) = store_in_tempdir();
    write_raw(
        &store,
        json!({
            "version": 1,
            "saved_at": "2026-02-14T00:00:00Z",
            "conversations": [],
            "current_conversation_id": "ghost",
        }),
    );

    let error = store.load().expect_err("dangling current id must fail");
    assert!(matches!(
        error,
        SnapshotStoreError::UnknownCurrentConversation { ref id, .. } if id == "ghost"
    ));
}

#[test]
fn load_defaults_missing_selection() {
    let (_dir, store) = store_in_tempdir();
    write_raw(
        &store,
        json!({
            "version": 1,
            "saved_at": "2026-02-14T00:00:00Z",
            "conversations": [],
            "current_conversation_id": null,
        }),
    );

    let loaded = store.load().expect("load").expect("snapshot");
    assert_eq!(loaded.selection, Selection::default());
}

#[test]
fn save_rejects_invalid_snapshot_before_touching_disk() {
    let (_dir, store) = store_in_tempdir();

    let error = store
        .save(&snapshot(Vec::new(), Some("missing")))
        .expect_err("dangling current id must fail");

    assert!(matches!(
        error,
        SnapshotStoreError::UnknownCurrentConversation { .. }
    ));
    assert!(!store.root().exists());
}

#[test]
fn clear_removes_snapshot_and_tolerates_missing_file() {
    let (_dir, store) = store_in_tempdir();
    store
        .save(&snapshot(Vec::new(), None))
        .expect("save should succeed");

    store.clear().expect("clear should succeed");
    assert!(store.load().expect("load").is_none());
    store.clear().expect("second clear should succeed");
}

#[test]
fn now_rfc3339_produces_loadable_timestamp() {
    let (_dir, store) = store_in_tempdir();
    let saved_at = now_rfc3339().expect("clock should format");

    store
        .save(&SessionSnapshot::v1(saved_at, Vec::new(), None, Selection::default()))
        .expect("save should succeed");
    assert!(store.load().expect("load").is_some());
}

#[test]
fn state_root_lives_under_hidden_dir() {
    let root = state_root(std::path::Path::new("/work"));
    assert_eq!(root, std::path::Path::new("/work/.job-relay/state"));
}
