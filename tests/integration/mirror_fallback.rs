//! Integration tests for starting up without a reachable sync server.
//!
//! Validates the silent-fallback contract: any initialization failure
//! lands the session in local mode, working entirely against the snapshot
//! file, with the failure surfaced only as an informational status.

use std::time::Duration;

use taskflow::mirror::MirrorStore;
use taskflow::remote::{ConnectError, RemoteConfig};
use taskflow::store::{AuthorityMode, Filter, TaskStore};

/// A remote config pointing at a port nothing listens on, with timeouts
/// short enough to keep the tests fast.
fn unreachable_remote() -> RemoteConfig {
    RemoteConfig {
        connect_timeout: Duration::from_secs(2),
        handshake_timeout: Duration::from_secs(2),
        ..RemoteConfig::new("ws://127.0.0.1:1/ws".to_string())
    }
}

#[tokio::test]
async fn unreachable_server_falls_back_to_local() {
    let dir = tempfile::tempdir().unwrap();
    let mirror = MirrorStore::new(dir.path().join("tasks.json"));

    let (mut store, error) = TaskStore::open(Some(&unreachable_remote()), mirror).await;
    assert_eq!(store.mode(), AuthorityMode::LocalMirror);
    assert!(error.is_some());
    assert!(!error.unwrap().is_setup_issue());

    // The session keeps working: writes land in the snapshot file.
    store.add_task("buy milk").await.unwrap();
    assert_eq!(store.len(), 1);
    assert_eq!(store.tasks(Filter::All)[0].text, "buy milk");

    let reloaded = MirrorStore::new(dir.path().join("tasks.json")).load_all();
    assert_eq!(reloaded.len(), 1);
    assert_eq!(reloaded[0].text, "buy milk");
}

#[tokio::test]
async fn missing_configuration_is_a_setup_issue() {
    let dir = tempfile::tempdir().unwrap();
    let mirror = MirrorStore::new(dir.path().join("tasks.json"));

    let (store, error) = TaskStore::open(None, mirror).await;
    assert_eq!(store.mode(), AuthorityMode::LocalMirror);
    assert!(matches!(error, Some(ConnectError::NotConfigured)));
    assert!(error.unwrap().is_setup_issue());
}

#[tokio::test]
async fn fallback_loads_the_previous_sessions_tasks() {
    let dir = tempfile::tempdir().unwrap();

    {
        let mirror = MirrorStore::new(dir.path().join("tasks.json"));
        let (mut store, _) = TaskStore::open(None, mirror).await;
        store.add_task("from last time").await.unwrap();
        let id = store.tasks(Filter::All)[0].id.clone();
        store.toggle_task(&id).await.unwrap();
    }

    let mirror = MirrorStore::new(dir.path().join("tasks.json"));
    let (store, _) = TaskStore::open(Some(&unreachable_remote()), mirror).await;
    assert_eq!(store.len(), 1);
    let task = &store.tasks(Filter::All)[0];
    assert_eq!(task.text, "from last time");
    assert!(task.completed);
    assert!(task.created_at.is_none(), "local tasks carry no timestamp");
}

#[tokio::test]
async fn corrupt_snapshot_loads_as_empty_without_failing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.json");
    std::fs::write(&path, "[{\"id\": 12, \"truncated").unwrap();

    let (mut store, _) = TaskStore::open(None, MirrorStore::new(&path)).await;
    assert!(store.is_empty());

    // The store is fully usable, and saving repairs the file.
    store.add_task("fresh start").await.unwrap();
    let reloaded = MirrorStore::new(&path).load_all();
    assert_eq!(reloaded.len(), 1);
}

#[tokio::test]
async fn local_lifecycle_persists_every_mutation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.json");

    let (mut store, _) = TaskStore::open(None, MirrorStore::new(&path)).await;
    for text in ["a", "b", "c"] {
        store.add_task(text).await.unwrap();
    }

    let id_b = store.tasks(Filter::All)[1].id.clone();
    store.toggle_task(&id_b).await.unwrap();
    let id_a = store.tasks(Filter::All)[0].id.clone();
    store.delete_task(&id_a).await.unwrap();

    // Every mutation went straight to disk; a reopen sees the final state.
    let (store, _) = TaskStore::open(None, MirrorStore::new(&path)).await;
    assert_eq!(store.len(), 2);
    let texts: Vec<_> = store
        .tasks(Filter::All)
        .iter()
        .map(|t| (t.text.clone(), t.completed))
        .collect();
    assert_eq!(
        texts,
        vec![("b".to_string(), true), ("c".to_string(), false)]
    );
}

#[tokio::test]
async fn clear_all_erases_the_snapshot_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.json");

    let (mut store, _) = TaskStore::open(None, MirrorStore::new(&path)).await;
    store.add_task("doomed").await.unwrap();
    assert!(path.exists());

    store.clear_all().unwrap();
    assert!(store.is_empty());
    assert!(!path.exists());
}

#[tokio::test]
async fn local_tasks_keep_insertion_order() {
    let dir = tempfile::tempdir().unwrap();
    let (mut store, _) = TaskStore::open(None, MirrorStore::new(dir.path().join("t.json"))).await;

    for text in ["first", "second", "third"] {
        store.add_task(text).await.unwrap();
    }
    let texts: Vec<_> = store
        .tasks(Filter::All)
        .iter()
        .map(|t| t.text.clone())
        .collect();
    assert_eq!(texts, vec!["first", "second", "third"]);
}
