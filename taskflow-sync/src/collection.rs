//! The authoritative task collection held by the sync server.
//!
//! The [`Collection`] assigns document ids and creation timestamps on
//! append, and produces the newest-first [`snapshot`](Collection::snapshot)
//! that is pushed to subscribers. Timestamps come from a strictly monotonic
//! clock so that no two documents ever share a creation time.

use std::collections::HashMap;

use taskflow_proto::task::{MAX_TASK_TEXT_LENGTH, TaskId};
use taskflow_proto::wire::Document;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Errors returned when a write cannot be applied to the collection.
#[derive(Debug, thiserror::Error)]
pub enum CollectionError {
    /// The referenced document does not exist.
    #[error("no such document: {0}")]
    NotFound(TaskId),

    /// The task text was empty or whitespace-only.
    #[error("task text must not be blank")]
    BlankText,

    /// The task text exceeded the configured length limit.
    #[error("task text exceeds {max} characters")]
    TextTooLong {
        /// The configured maximum length.
        max: usize,
    },
}

/// Collection contents plus the timestamp clock, guarded together so that
/// timestamp assignment and insertion are one atomic step.
struct Inner {
    documents: HashMap<String, Document>,
    clock: u64,
}

/// In-memory document collection with server-assigned ids and timestamps.
pub struct Collection {
    inner: RwLock<Inner>,
    max_text_len: usize,
}

impl Default for Collection {
    fn default() -> Self {
        Self::new()
    }
}

impl Collection {
    /// Creates an empty collection with the default text length limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_text_len(MAX_TASK_TEXT_LENGTH)
    }

    /// Creates an empty collection with a custom text length limit.
    #[must_use]
    pub fn with_max_text_len(max_text_len: usize) -> Self {
        Self {
            inner: RwLock::new(Inner {
                documents: HashMap::new(),
                clock: 0,
            }),
            max_text_len,
        }
    }

    /// Appends a new document, assigning its id and creation timestamp.
    ///
    /// The text is validated as written by the client: it must not be blank
    /// after trimming and must not exceed the length limit. The stored text
    /// is the client's original, untrimmed string.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::BlankText`] or
    /// [`CollectionError::TextTooLong`] when validation fails.
    pub async fn append(&self, text: &str) -> Result<Document, CollectionError> {
        if text.trim().is_empty() {
            return Err(CollectionError::BlankText);
        }
        if text.chars().count() > self.max_text_len {
            return Err(CollectionError::TextTooLong {
                max: self.max_text_len,
            });
        }

        let mut inner = self.inner.write().await;
        let created_at = now_ms().max(inner.clock + 1);
        inner.clock = created_at;

        let doc = Document {
            id: TaskId::from_string(Uuid::now_v7().to_string()),
            text: text.to_string(),
            completed: false,
            created_at,
        };
        inner.documents.insert(doc.id.as_str().to_string(), doc.clone());
        Ok(doc)
    }

    /// Sets the completion flag of an existing document.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::NotFound`] if the id is unknown.
    pub async fn patch(&self, id: &TaskId, completed: bool) -> Result<(), CollectionError> {
        let mut inner = self.inner.write().await;
        match inner.documents.get_mut(id.as_str()) {
            Some(doc) => {
                doc.completed = completed;
                Ok(())
            }
            None => Err(CollectionError::NotFound(id.clone())),
        }
    }

    /// Removes a document, returning whether it existed.
    ///
    /// Removal is idempotent: an unknown id is not an error.
    pub async fn remove(&self, id: &TaskId) -> bool {
        let mut inner = self.inner.write().await;
        inner.documents.remove(id.as_str()).is_some()
    }

    /// Returns the complete collection ordered by creation time descending.
    ///
    /// The clock is strictly monotonic, so timestamps are unique; the id is
    /// a secondary sort key only to keep the order deterministic for data
    /// restored by hand.
    pub async fn snapshot(&self) -> Vec<Document> {
        let inner = self.inner.read().await;
        let mut docs: Vec<Document> = inner.documents.values().cloned().collect();
        docs.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.as_str().cmp(a.id.as_str()))
        });
        docs
    }

    /// Returns the number of documents currently held.
    pub async fn len(&self) -> usize {
        self.inner.read().await.documents.len()
    }

    /// Returns true when the collection holds no documents.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Current wall-clock time in milliseconds since epoch.
fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}
