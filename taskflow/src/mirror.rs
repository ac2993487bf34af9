//! Local snapshot of the task list.
//!
//! The mirror keeps the entire collection as one JSON blob in a single
//! file; there are no partial updates. It is only consulted when the sync
//! server is unavailable, so reads fail closed: a missing or unparseable
//! file loads as the empty collection and is never fatal.
//!
//! Stored records carry only `{id, text, completed}` — server timestamps
//! do not survive the trip through the mirror, and tasks loaded from it
//! keep their stored (insertion) order.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use taskflow_proto::task::{Task, TaskId};

/// Errors that can occur while writing the mirror file.
#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// On-disk record shape: one entry of the persisted JSON array.
#[derive(Debug, Serialize, Deserialize)]
struct StoredTask {
    id: String,
    text: String,
    completed: bool,
}

impl From<&Task> for StoredTask {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.as_str().to_string(),
            text: task.text.clone(),
            completed: task.completed,
        }
    }
}

impl From<StoredTask> for Task {
    fn from(stored: StoredTask) -> Self {
        Self {
            id: TaskId::from_string(stored.id),
            text: stored.text,
            completed: stored.completed,
            created_at: None,
        }
    }
}

/// The whole task collection as one serialized file.
pub struct MirrorStore {
    path: PathBuf,
}

impl MirrorStore {
    /// Creates a mirror store over the given file path. The file and its
    /// parent directory need not exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the path of the mirror file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the full collection.
    ///
    /// Missing or unparseable content yields the empty collection; parse
    /// failures are logged but never surface to the caller.
    #[must_use]
    pub fn load_all(&self) -> Vec<Task> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to read mirror file");
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<StoredTask>>(&contents) {
            Ok(stored) => stored.into_iter().map(Task::from).collect(),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "mirror file unparseable, treating as empty"
                );
                Vec::new()
            }
        }
    }

    /// Persists the full collection, replacing any previous content.
    ///
    /// Writes to a temp file and renames it into place so a crash mid-write
    /// cannot corrupt the previous snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError`] if the directory cannot be created or the
    /// file cannot be written.
    pub fn save_all(&self, tasks: &[Task]) -> Result<(), MirrorError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let stored: Vec<StoredTask> = tasks.iter().map(StoredTask::from).collect();
        let json = serde_json::to_vec_pretty(&stored)?;

        let temp_path = self.path.with_extension("tmp");
        {
            let mut file = File::create(&temp_path)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    /// Erases the persisted collection. Succeeds when nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError`] if the file exists but cannot be removed.
    pub fn clear(&self) -> Result<(), MirrorError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MirrorError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_task(id: &str, text: &str, completed: bool) -> Task {
        Task {
            id: TaskId::from_string(id),
            text: text.to_string(),
            completed,
            created_at: None,
        }
    }

    #[test]
    fn load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mirror = MirrorStore::new(dir.path().join("tasks.json"));
        assert!(mirror.load_all().is_empty());
    }

    #[test]
    fn save_and_load_round_trip_preserves_order_and_fields() {
        let dir = tempfile::tempdir().unwrap();
        let mirror = MirrorStore::new(dir.path().join("tasks.json"));

        let tasks = vec![
            make_task("a", "first", false),
            make_task("b", "second", true),
            make_task("c", "third", false),
        ];
        mirror.save_all(&tasks).unwrap();

        let loaded = mirror.load_all();
        assert_eq!(loaded, tasks);
    }

    #[test]
    fn timestamps_do_not_survive_the_mirror() {
        let dir = tempfile::tempdir().unwrap();
        let mirror = MirrorStore::new(dir.path().join("tasks.json"));

        let mut task = make_task("a", "from the server", true);
        task.created_at = Some(1_700_000_000_000);
        mirror.save_all(&[task]).unwrap();

        let loaded = mirror.load_all();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].created_at, None);
        assert!(loaded[0].completed);
    }

    #[test]
    fn corrupt_content_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.json");
        fs::write(&path, "{not json at all").unwrap();

        let mirror = MirrorStore::new(&path);
        assert!(mirror.load_all().is_empty());
    }

    #[test]
    fn save_creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("tasks.json");

        let mirror = MirrorStore::new(&path);
        mirror.save_all(&[make_task("a", "x", false)]).unwrap();
        assert_eq!(mirror.load_all().len(), 1);
    }

    #[test]
    fn save_replaces_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let mirror = MirrorStore::new(dir.path().join("tasks.json"));

        mirror
            .save_all(&[make_task("a", "one", false), make_task("b", "two", false)])
            .unwrap();
        mirror.save_all(&[make_task("c", "three", true)]).unwrap();

        let loaded = mirror.load_all();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].text, "three");
    }

    #[test]
    fn clear_removes_the_file_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mirror = MirrorStore::new(dir.path().join("tasks.json"));

        mirror.save_all(&[make_task("a", "gone soon", false)]).unwrap();
        mirror.clear().unwrap();
        assert!(mirror.load_all().is_empty());

        // Clearing an already-empty mirror is fine.
        mirror.clear().unwrap();
    }
}
