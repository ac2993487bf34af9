//! Wire protocol between the `TaskFlow` client and the sync server.
//!
//! Messages are postcard-encoded and carried in WebSocket binary frames.
//! The protocol is deliberately small: a client subscribes once, then the
//! server pushes the complete collection as a [`ServerPush::Snapshot`]
//! after every change. Snapshots are always total, never deltas — the
//! client replaces its view wholesale.

use serde::{Deserialize, Serialize};

use crate::task::{Task, TaskId};

/// Protocol version sent in the subscribe handshake. The server rejects
/// clients speaking a different version.
pub const PROTOCOL_VERSION: u16 = 1;

/// A task document as stored by the sync server.
///
/// Unlike [`Task`], a document always carries its server-assigned creation
/// timestamp. The client converts documents into tasks on receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Server-assigned document identifier.
    pub id: TaskId,
    /// User-entered content.
    pub text: String,
    /// Completion flag.
    pub completed: bool,
    /// Server timestamp in milliseconds since epoch.
    pub created_at: u64,
}

impl From<Document> for Task {
    fn from(doc: Document) -> Self {
        Self {
            id: doc.id,
            text: doc.text,
            completed: doc.completed,
            created_at: Some(doc.created_at),
        }
    }
}

/// Requests sent from the client to the sync server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientRequest {
    /// Opens the live subscription. Must be the first frame on the
    /// connection; the server answers with [`ServerPush::Subscribed`] or
    /// [`ServerPush::Rejected`], then pushes the current snapshot.
    Subscribe {
        /// The protocol version this client speaks.
        protocol_version: u16,
    },

    /// Appends a new document to the collection.
    ///
    /// The server assigns the document id and creation timestamp. The new
    /// task reaches the client only through the subsequent snapshot push.
    Append {
        /// Correlates the [`ServerPush::WriteOk`] / [`ServerPush::WriteFailed`] reply.
        request_id: u64,
        /// User-entered task text.
        text: String,
    },

    /// Sets the completion flag of an existing document.
    Patch {
        /// Correlates the write reply.
        request_id: u64,
        /// Which document to patch.
        id: TaskId,
        /// New value for the completion flag.
        completed: bool,
    },

    /// Removes a document from the collection. Removing an id the server
    /// does not hold succeeds (removal is idempotent).
    Remove {
        /// Correlates the write reply.
        request_id: u64,
        /// Which document to remove.
        id: TaskId,
    },
}

/// Frames pushed from the sync server to a subscribed client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerPush {
    /// The subscription is open; snapshots will follow.
    Subscribed,

    /// The subscribe handshake was refused (version mismatch, server not
    /// accepting subscribers). The server closes the connection after this.
    Rejected {
        /// Human-readable refusal reason.
        reason: String,
    },

    /// The complete collection, ordered by creation time descending.
    Snapshot {
        /// Every document the server holds, newest first.
        documents: Vec<Document>,
    },

    /// A write request was applied.
    WriteOk {
        /// The `request_id` of the applied request.
        request_id: u64,
    },

    /// A write request was refused; the collection is unchanged.
    WriteFailed {
        /// The `request_id` of the refused request.
        request_id: u64,
        /// Human-readable failure reason.
        reason: String,
    },
}

/// Encodes a [`ClientRequest`] into bytes using postcard.
///
/// # Errors
///
/// Returns an error string if serialization fails.
pub fn encode_request(msg: &ClientRequest) -> Result<Vec<u8>, String> {
    postcard::to_allocvec(msg).map_err(|e| format!("request encode error: {e}"))
}

/// Decodes a [`ClientRequest`] from bytes using postcard.
///
/// # Errors
///
/// Returns an error string if deserialization fails.
pub fn decode_request(bytes: &[u8]) -> Result<ClientRequest, String> {
    postcard::from_bytes(bytes).map_err(|e| format!("request decode error: {e}"))
}

/// Encodes a [`ServerPush`] into bytes using postcard.
///
/// # Errors
///
/// Returns an error string if serialization fails.
pub fn encode_push(msg: &ServerPush) -> Result<Vec<u8>, String> {
    postcard::to_allocvec(msg).map_err(|e| format!("push encode error: {e}"))
}

/// Decodes a [`ServerPush`] from bytes using postcard.
///
/// # Errors
///
/// Returns an error string if deserialization fails.
pub fn decode_push(bytes: &[u8]) -> Result<ServerPush, String> {
    postcard::from_bytes(bytes).map_err(|e| format!("push decode error: {e}"))
}
