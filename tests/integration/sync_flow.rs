//! Integration tests for the remote-live path: a task store subscribed to
//! an in-process sync server.
//!
//! Validates the core contract of remote authority:
//! - the store's view is driven entirely by snapshot pushes
//! - writes are acked but never applied optimistically
//! - snapshots arrive newest-first and replace the view wholesale
//! - multiple subscribers converge on the same view

use std::sync::Arc;
use std::time::Duration;

use taskflow::mirror::MirrorStore;
use taskflow::store::{AuthorityMode, Filter, StoreError, TaskStore};
use taskflow::remote::RemoteConfig;
use taskflow_sync::server::{SyncState, start_server_with_state};

/// Start the sync server in-process and return a ws:// URL plus its state.
async fn start_sync() -> (String, Arc<SyncState>) {
    let state = Arc::new(SyncState::new());
    let (addr, _handle) = start_server_with_state("127.0.0.1:0", Arc::clone(&state))
        .await
        .expect("failed to start sync server");
    (format!("ws://{addr}/ws"), state)
}

/// Open a remote-live store against the given URL, with its mirror in a
/// temp directory.
async fn open_remote_store(url: &str, dir: &tempfile::TempDir) -> TaskStore {
    let mirror = MirrorStore::new(dir.path().join("tasks.json"));
    let config = RemoteConfig::new(url.to_string());
    let (store, error) = TaskStore::open(Some(&config), mirror).await;
    assert!(error.is_none(), "connect failed: {error:?}");
    assert_eq!(store.mode(), AuthorityMode::RemoteLive);
    store
}

/// Pump the store until the predicate holds or a 5s deadline passes.
async fn pump_until(store: &mut TaskStore, predicate: impl Fn(&TaskStore) -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        store.pump();
        if predicate(store) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("store never reached the expected state");
}

#[tokio::test]
async fn initial_snapshot_delivers_existing_documents() {
    let (url, state) = start_sync().await;
    state.collection.append("older").await.unwrap();
    state.collection.append("newer").await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let mut store = open_remote_store(&url, &dir).await;

    pump_until(&mut store, |s| s.len() == 2).await;
    let texts: Vec<_> = store
        .tasks(Filter::All)
        .iter()
        .map(|t| t.text.clone())
        .collect();
    assert_eq!(texts, vec!["newer", "older"], "snapshot must be newest-first");
}

#[tokio::test]
async fn add_is_not_applied_until_the_snapshot_arrives() {
    let (url, _state) = start_sync().await;
    let dir = tempfile::tempdir().unwrap();
    let mut store = open_remote_store(&url, &dir).await;
    pump_until(&mut store, TaskStore::is_empty).await;

    // The append is acked by the server, but the in-memory view only
    // changes once pump() applies the resulting push.
    assert!(store.add_task("from the wire").await.unwrap());
    assert!(store.is_empty(), "no optimistic insertion");

    pump_until(&mut store, |s| s.len() == 1).await;
    let tasks = store.tasks(Filter::All);
    assert_eq!(tasks[0].text, "from the wire");
    assert!(!tasks[0].completed);
    assert!(tasks[0].created_at.is_some(), "remote tasks carry timestamps");
}

#[tokio::test]
async fn remote_tasks_order_newest_first() {
    let (url, _state) = start_sync().await;
    let dir = tempfile::tempdir().unwrap();
    let mut store = open_remote_store(&url, &dir).await;

    for text in ["first", "second", "third"] {
        store.add_task(text).await.unwrap();
    }
    pump_until(&mut store, |s| s.len() == 3).await;

    let texts: Vec<_> = store
        .tasks(Filter::All)
        .iter()
        .map(|t| t.text.clone())
        .collect();
    assert_eq!(texts, vec!["third", "second", "first"]);
}

#[tokio::test]
async fn toggle_round_trips_through_the_server() {
    let (url, _state) = start_sync().await;
    let dir = tempfile::tempdir().unwrap();
    let mut store = open_remote_store(&url, &dir).await;

    store.add_task("flip me").await.unwrap();
    pump_until(&mut store, |s| s.len() == 1).await;

    let id = store.tasks(Filter::All)[0].id.clone();
    store.toggle_task(&id).await.unwrap();
    pump_until(&mut store, |s| s.completed_count() == 1).await;

    store.toggle_task(&id).await.unwrap();
    pump_until(&mut store, |s| s.completed_count() == 0).await;
}

#[tokio::test]
async fn delete_removes_exactly_the_targeted_document() {
    let (url, _state) = start_sync().await;
    let dir = tempfile::tempdir().unwrap();
    let mut store = open_remote_store(&url, &dir).await;

    for text in ["keep a", "drop", "keep b"] {
        store.add_task(text).await.unwrap();
    }
    pump_until(&mut store, |s| s.len() == 3).await;

    let id = store
        .tasks(Filter::All)
        .iter()
        .find(|t| t.text == "drop")
        .map(|t| t.id.clone())
        .unwrap();
    store.delete_task(&id).await.unwrap();
    pump_until(&mut store, |s| s.len() == 2).await;

    let mut texts: Vec<_> = store
        .tasks(Filter::All)
        .iter()
        .map(|t| t.text.clone())
        .collect();
    texts.sort();
    assert_eq!(texts, vec!["keep a", "keep b"]);
}

#[tokio::test]
async fn blank_add_is_a_no_op_in_remote_mode() {
    let (url, state) = start_sync().await;
    let dir = tempfile::tempdir().unwrap();
    let mut store = open_remote_store(&url, &dir).await;
    pump_until(&mut store, TaskStore::is_empty).await;

    assert!(!store.add_task("   ").await.unwrap());
    assert!(state.collection.is_empty().await);
}

#[tokio::test]
async fn clear_all_is_refused_while_remote() {
    let (url, _state) = start_sync().await;
    let dir = tempfile::tempdir().unwrap();
    let mut store = open_remote_store(&url, &dir).await;

    assert!(matches!(
        store.clear_all(),
        Err(StoreError::ClearRequiresLocal)
    ));
    assert_eq!(store.mode(), AuthorityMode::RemoteLive);
}

#[tokio::test]
async fn two_stores_converge_on_the_same_view() {
    let (url, _state) = start_sync().await;
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();

    let mut alice = open_remote_store(&url, &dir_a).await;
    let mut bob = open_remote_store(&url, &dir_b).await;

    alice.add_task("shared entry").await.unwrap();

    pump_until(&mut alice, |s| s.len() == 1).await;
    pump_until(&mut bob, |s| s.len() == 1).await;

    assert_eq!(bob.tasks(Filter::All)[0].text, "shared entry");
    assert_eq!(
        alice.tasks(Filter::All)[0].id,
        bob.tasks(Filter::All)[0].id,
        "both stores see the server-assigned id"
    );
}
