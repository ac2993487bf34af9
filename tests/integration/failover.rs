//! Integration tests for losing the subscription mid-session.
//!
//! Validates the one-way failover contract: when the live stream ends, the
//! store reloads from the local snapshot — it does not carry the remote
//! view over — and stays local for the rest of the session. Write failures,
//! by contrast, never change authority.

use std::sync::Arc;
use std::time::Duration;

use taskflow::mirror::MirrorStore;
use taskflow::remote::RemoteConfig;
use taskflow::store::{AuthorityMode, Filter, StoreError, StoreEvent, TaskStore};
use taskflow_proto::task::{Task, TaskId};
use taskflow_sync::server::{SyncState, start_server_with_state};

async fn start_sync() -> (String, Arc<SyncState>) {
    let state = Arc::new(SyncState::new());
    let (addr, _handle) = start_server_with_state("127.0.0.1:0", Arc::clone(&state))
        .await
        .expect("failed to start sync server");
    (format!("ws://{addr}/ws"), state)
}

/// Pump the store until the predicate holds, collecting emitted events.
async fn pump_until(
    store: &mut TaskStore,
    predicate: impl Fn(&TaskStore) -> bool,
) -> Vec<StoreEvent> {
    let mut events = Vec::new();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        events.extend(store.pump());
        if predicate(store) {
            return events;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("store never reached the expected state");
}

fn local_task(id: &str, text: &str) -> Task {
    Task {
        id: TaskId::from_string(id),
        text: text.to_string(),
        completed: false,
        created_at: None,
    }
}

#[tokio::test]
async fn subscription_loss_reloads_from_the_snapshot() {
    let (url, state) = start_sync().await;

    // The mirror holds one task from an earlier offline session.
    let dir = tempfile::tempdir().unwrap();
    let mirror_path = dir.path().join("tasks.json");
    MirrorStore::new(&mirror_path)
        .save_all(&[local_task("local-1", "kept locally")])
        .unwrap();

    let config = RemoteConfig::new(url);
    let (mut store, error) =
        TaskStore::open(Some(&config), MirrorStore::new(&mirror_path)).await;
    assert!(error.is_none());

    // The remote view fills up with three tasks.
    for text in ["one", "two", "three"] {
        store.add_task(text).await.unwrap();
    }
    pump_until(&mut store, |s| s.len() == 3).await;

    // The server drops every connection: the subscription is lost.
    state.close_all().await;
    let events = pump_until(&mut store, |s| s.mode() == AuthorityMode::LocalMirror).await;
    assert!(
        events
            .iter()
            .any(|e| matches!(e, StoreEvent::FailedOver { .. })),
        "failover must be reported"
    );

    // The view is now the mirror's content, not the remote snapshot.
    assert_eq!(store.len(), 1);
    assert_eq!(store.tasks(Filter::All)[0].text, "kept locally");
}

#[tokio::test]
async fn failover_is_terminal_and_writes_go_local() {
    let (url, state) = start_sync().await;
    let dir = tempfile::tempdir().unwrap();
    let mirror_path = dir.path().join("tasks.json");

    let config = RemoteConfig::new(url);
    let (mut store, _) = TaskStore::open(Some(&config), MirrorStore::new(&mirror_path)).await;

    state.close_all().await;
    pump_until(&mut store, |s| s.mode() == AuthorityMode::LocalMirror).await;

    // Subsequent writes mutate the list synchronously and hit the mirror.
    store.add_task("offline entry").await.unwrap();
    assert_eq!(store.len(), 1);
    assert!(store.tasks(Filter::All)[0].created_at.is_none());
    assert_eq!(MirrorStore::new(&mirror_path).load_all().len(), 1);

    // Pumping again changes nothing: the store never re-subscribes.
    assert!(store.pump().is_empty());
    assert_eq!(store.mode(), AuthorityMode::LocalMirror);

    // Clear-all is available now.
    store.clear_all().unwrap();
    assert!(store.is_empty());
}

#[tokio::test]
async fn write_failure_does_not_change_authority() {
    let (url, _state) = start_sync().await;
    let dir = tempfile::tempdir().unwrap();

    let config = RemoteConfig::new(url);
    let (mut store, _) =
        TaskStore::open(Some(&config), MirrorStore::new(dir.path().join("t.json"))).await;

    store.add_task("survivor").await.unwrap();
    pump_until(&mut store, |s| s.len() == 1).await;

    // Force a refused write: patch a document the server does not hold.
    // The store only patches ids it can see, so plant a stale task in the
    // view by deleting it server-side first.
    let id = store.tasks(Filter::All)[0].id.clone();
    store.delete_task(&id).await.unwrap();
    // The view still holds the task until the snapshot is pumped.
    let result = store.toggle_task(&id).await;

    match result {
        Err(StoreError::Write { source, .. }) => {
            assert!(source.to_string().contains("no such document"));
        }
        other => panic!("expected a refused write, got {other:?}"),
    }

    // The failed write changed nothing: still remote-live, and the view
    // converges on the server's state (empty after the delete).
    assert_eq!(store.mode(), AuthorityMode::RemoteLive);
    pump_until(&mut store, TaskStore::is_empty).await;
}
