//! The task store: single source of truth for the task list.
//!
//! The store owns the in-memory collection and the authority decision —
//! whether the sync server or the local snapshot is currently the source
//! of truth. Authority is decided once at [`TaskStore::open`] and changes
//! at most once thereafter: when the live subscription is lost, the store
//! reloads from the mirror and stays local for the rest of the session.
//! It never switches back on its own; reconnecting means running the whole
//! initialization again.
//!
//! While the sync server is authoritative, writes do not touch the local
//! view at all — the visible effect of every accepted write arrives
//! through the next snapshot push, applied in [`TaskStore::pump`]. In
//! local mode writes mutate the list directly and persist the whole
//! collection through the mirror.

use tokio::sync::mpsc;

use taskflow_proto::task::{Task, TaskId};

use crate::mirror::MirrorStore;
use crate::remote::{ConnectError, RemoteCollection, RemoteConfig, SubscriptionEvent, WriteError};

/// Which backend is currently the source of truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorityMode {
    /// Live subscription to the sync server.
    RemoteLive,
    /// Local snapshot only. Terminal for the session.
    LocalMirror,
}

/// Completion-state selection for [`TaskStore::tasks`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    /// Every task.
    All,
    /// Tasks not yet completed.
    Active,
    /// Completed tasks.
    Completed,
}

impl Filter {
    /// Display label for the filter tabs.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::All => "All",
            Self::Active => "Active",
            Self::Completed => "Done",
        }
    }

    /// The next filter in tab order, wrapping around.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::All => Self::Active,
            Self::Active => Self::Completed,
            Self::Completed => Self::All,
        }
    }
}

/// Notifications emitted by [`TaskStore::pump`] for the presentation layer.
#[derive(Debug)]
pub enum StoreEvent {
    /// The in-memory list was replaced by a snapshot push.
    ListChanged,

    /// The subscription was lost; the store is now local-only and the list
    /// was reloaded from the mirror.
    FailedOver {
        /// Why the subscription ended.
        reason: String,
    },
}

/// Errors surfaced to the user by store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A write against the sync server failed. The in-memory view and the
    /// authority mode are unchanged.
    #[error("{operation} failed: {source}")]
    Write {
        /// Which operation was attempted.
        operation: &'static str,
        /// The underlying failure.
        source: WriteError,
    },

    /// Clearing all tasks is only possible when the local snapshot is
    /// authoritative.
    #[error("clearing all tasks is only available in local mode")]
    ClearRequiresLocal,
}

/// The backend that is currently authoritative.
///
/// A union rather than a flag: the remote handle only exists inside the
/// `RemoteLive` variant, so no code path can reach the sync server after
/// the store has gone local.
enum Authority {
    RemoteLive {
        remote: RemoteCollection,
        subscription: mpsc::Receiver<SubscriptionEvent>,
    },
    LocalMirror,
}

/// Single source of truth for the task list.
pub struct TaskStore {
    tasks: Vec<Task>,
    mirror: MirrorStore,
    authority: Authority,
}

impl TaskStore {
    /// Opens the store, deciding which backend is authoritative.
    ///
    /// With a remote config present, attempts the connection and subscribe
    /// handshake; on success the store starts remote-live with an empty
    /// list (the current collection arrives with the first snapshot push).
    /// On any failure — or with no remote config at all — the store loads
    /// the mirror and starts local, returning the failure alongside so the
    /// caller can show it as a status change. Initialization never fails
    /// outright.
    pub async fn open(
        remote_config: Option<&RemoteConfig>,
        mirror: MirrorStore,
    ) -> (Self, Option<ConnectError>) {
        let Some(config) = remote_config else {
            tracing::info!("no sync server configured, starting from local snapshot");
            return (Self::local(mirror), Some(ConnectError::NotConfigured));
        };

        match RemoteCollection::connect(config).await {
            Ok((remote, subscription)) => {
                tracing::info!(url = %config.url, "sync server authoritative");
                let store = Self {
                    tasks: Vec::new(),
                    mirror,
                    authority: Authority::RemoteLive {
                        remote,
                        subscription,
                    },
                };
                (store, None)
            }
            Err(e) => {
                tracing::warn!(error = %e, "sync server unavailable, starting from local snapshot");
                (Self::local(mirror), Some(e))
            }
        }
    }

    /// Builds a local-only store from the mirror's contents.
    fn local(mirror: MirrorStore) -> Self {
        let tasks = mirror.load_all();
        Self {
            tasks,
            mirror,
            authority: Authority::LocalMirror,
        }
    }

    /// Which backend is currently the source of truth.
    #[must_use]
    pub const fn mode(&self) -> AuthorityMode {
        match self.authority {
            Authority::RemoteLive { .. } => AuthorityMode::RemoteLive,
            Authority::LocalMirror => AuthorityMode::LocalMirror,
        }
    }

    /// Applies everything the subscription has delivered since the last
    /// call: snapshot pushes replace the in-memory list wholesale, and a
    /// lost subscription triggers the one-time switch to local mode.
    ///
    /// Call once per event-loop tick, before handling input, so the
    /// presentation layer never renders a stale projection.
    pub fn pump(&mut self) -> Vec<StoreEvent> {
        let mut events = Vec::new();
        let mut lost: Option<String> = None;

        if let Authority::RemoteLive { subscription, .. } = &mut self.authority {
            loop {
                match subscription.try_recv() {
                    Ok(SubscriptionEvent::Snapshot(tasks)) => {
                        self.tasks = tasks;
                        events.push(StoreEvent::ListChanged);
                    }
                    Ok(SubscriptionEvent::Lost { reason }) => {
                        lost = Some(reason);
                        break;
                    }
                    Err(mpsc::error::TryRecvError::Empty) => break,
                    Err(mpsc::error::TryRecvError::Disconnected) => {
                        lost = Some("subscription channel closed".to_string());
                        break;
                    }
                }
            }
        }

        if let Some(reason) = lost {
            tracing::warn!(reason = %reason, "subscription lost, switching to local snapshot");
            self.tasks = self.mirror.load_all();
            self.authority = Authority::LocalMirror;
            events.push(StoreEvent::FailedOver { reason });
        }

        events
    }

    /// Adds a task. Returns `Ok(false)` without touching anything when the
    /// trimmed text is empty.
    ///
    /// Remote-live: appends to the server and suspends until the write is
    /// acked; the task becomes visible only through the next snapshot push.
    /// Local: appends to the list with a freshly generated id and persists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Write`] when the server refuses the append.
    pub async fn add_task(&mut self, text: &str) -> Result<bool, StoreError> {
        if text.trim().is_empty() {
            return Ok(false);
        }

        match &self.authority {
            Authority::RemoteLive { remote, .. } => {
                remote.append(text).await.map_err(|source| StoreError::Write {
                    operation: "adding the task",
                    source,
                })?;
            }
            Authority::LocalMirror => {
                self.tasks.push(Task {
                    id: TaskId::generate(),
                    text: text.to_string(),
                    completed: false,
                    created_at: None,
                });
                self.persist();
            }
        }
        Ok(true)
    }

    /// Flips a task's completion flag. Silently does nothing when the id is
    /// not in the current view.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Write`] when the server refuses the patch.
    pub async fn toggle_task(&mut self, id: &TaskId) -> Result<(), StoreError> {
        let Some(index) = self.tasks.iter().position(|t| &t.id == id) else {
            return Ok(());
        };

        match &self.authority {
            Authority::RemoteLive { remote, .. } => {
                let completed = self.tasks[index].completed;
                remote
                    .patch(id, !completed)
                    .await
                    .map_err(|source| StoreError::Write {
                        operation: "updating the task",
                        source,
                    })?;
            }
            Authority::LocalMirror => {
                self.tasks[index].completed = !self.tasks[index].completed;
                self.persist();
            }
        }
        Ok(())
    }

    /// Deletes a task by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Write`] when the server refuses the removal.
    pub async fn delete_task(&mut self, id: &TaskId) -> Result<(), StoreError> {
        match &self.authority {
            Authority::RemoteLive { remote, .. } => {
                remote.remove(id).await.map_err(|source| StoreError::Write {
                    operation: "deleting the task",
                    source,
                })?;
            }
            Authority::LocalMirror => {
                self.tasks.retain(|t| &t.id != id);
                self.persist();
            }
        }
        Ok(())
    }

    /// Empties the list and erases the persisted snapshot. Only available
    /// in local mode; callers are expected to confirm with the user first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ClearRequiresLocal`] while the sync server is
    /// authoritative.
    pub fn clear_all(&mut self) -> Result<(), StoreError> {
        match self.authority {
            Authority::RemoteLive { .. } => Err(StoreError::ClearRequiresLocal),
            Authority::LocalMirror => {
                self.tasks.clear();
                if let Err(e) = self.mirror.clear() {
                    tracing::warn!(error = %e, "failed to erase mirror file");
                }
                Ok(())
            }
        }
    }

    /// The current view through a completion-state filter. Pure projection:
    /// ordering is whatever the in-memory order is (newest first while
    /// remote-sourced, insertion order while local).
    #[must_use]
    pub fn tasks(&self, filter: Filter) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|t| match filter {
                Filter::All => true,
                Filter::Active => !t.completed,
                Filter::Completed => t.completed,
            })
            .collect()
    }

    /// Number of tasks in the unfiltered view.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// True when the unfiltered view is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Number of completed tasks in the unfiltered view.
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.completed).count()
    }

    /// Persists the whole list through the mirror, best-effort.
    fn persist(&self) {
        if let Err(e) = self.mirror.save_all(&self.tasks) {
            tracing::warn!(error = %e, "failed to persist tasks to mirror");
        }
    }
}
