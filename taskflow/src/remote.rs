//! WebSocket adapter for the sync server's document collection.
//!
//! [`RemoteCollection::connect`] establishes the connection, performs the
//! subscribe handshake, and spawns a background reader task. From then on
//! the server drives the view: every change arrives as a complete snapshot
//! on the subscription channel, and the adapter never synthesizes state of
//! its own.
//!
//! Writes are request/ack pairs: each call sends a frame tagged with a
//! request id and suspends until the matching `WriteOk`/`WriteFailed`
//! arrives (resolved by the reader task through a pending-ack map). No
//! timeout is imposed on an in-flight write; a dropped connection resolves
//! it as [`WriteError::ConnectionClosed`].

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use taskflow_proto::task::{Task, TaskId};
use taskflow_proto::wire::{self, ClientRequest, PROTOCOL_VERSION, ServerPush};

/// Type alias for the write half of a WebSocket connection.
type WsSender = futures_util::stream::SplitSink<
    WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
    Message,
>;

/// Type alias for the read half of a WebSocket connection.
type WsReader =
    futures_util::stream::SplitStream<WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>>;

/// Write acks awaited by in-flight requests, keyed by request id.
type PendingWrites = Arc<parking_lot::Mutex<HashMap<u64, oneshot::Sender<Result<(), String>>>>>;

/// Connection settings for the sync server.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// WebSocket URL of the sync server (e.g., `ws://127.0.0.1:7878/ws`).
    pub url: String,
    /// Timeout for establishing the WebSocket connection.
    pub connect_timeout: Duration,
    /// Timeout for the subscribe handshake reply.
    pub handshake_timeout: Duration,
    /// Capacity of the subscription event channel.
    pub channel_capacity: usize,
}

/// Default timeout for connecting to the sync server.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for the subscribe handshake reply.
const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default capacity of the subscription event channel.
const DEFAULT_CHANNEL_CAPACITY: usize = 256;

impl RemoteConfig {
    /// Creates a `RemoteConfig` with default timeouts and channel capacity.
    #[must_use]
    pub const fn new(url: String) -> Self {
        Self {
            url,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Errors that can occur while opening the subscription.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// No sync server URL is configured.
    #[error("no sync server configured")]
    NotConfigured,

    /// The configured URL is not a usable WebSocket URL.
    #[error("invalid sync server URL {url}: {reason}")]
    InvalidUrl {
        /// The URL as configured.
        url: String,
        /// Why it was refused.
        reason: String,
    },

    /// Connecting or the handshake reply timed out.
    #[error("connecting to the sync server timed out")]
    Timeout,

    /// The server could not be reached at all.
    #[error("sync server unreachable: {0}")]
    Unreachable(String),

    /// The server refused the subscription (version mismatch, not accepting
    /// subscribers). Usually a setup problem rather than a transient one.
    #[error("subscription rejected: {0}")]
    Rejected(String),

    /// The handshake did not complete as expected.
    #[error("subscribe handshake failed: {0}")]
    Handshake(String),
}

impl ConnectError {
    /// True when the failure looks like a setup problem the user must fix
    /// (no server configured, or the server refused the subscription),
    /// rather than a transient connectivity issue.
    #[must_use]
    pub const fn is_setup_issue(&self) -> bool {
        matches!(self, Self::NotConfigured | Self::Rejected(_))
    }
}

/// Errors that can occur while writing to the remote collection.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    /// The connection to the sync server is down.
    #[error("connection to sync server closed")]
    ConnectionClosed,

    /// The server refused the write; the collection is unchanged.
    #[error("{0}")]
    Rejected(String),

    /// The request could not be encoded.
    #[error("{0}")]
    Codec(String),
}

/// Events delivered on the subscription channel.
#[derive(Debug)]
pub enum SubscriptionEvent {
    /// The complete collection, replacing any previous view.
    Snapshot(Vec<Task>),

    /// The subscription ended and will not recover. Terminal: no further
    /// events follow.
    Lost {
        /// Why the subscription ended.
        reason: String,
    },
}

/// Live handle to the sync server's task collection.
///
/// Created via [`RemoteCollection::connect`], which also returns the
/// subscription channel carrying [`SubscriptionEvent`]s.
pub struct RemoteCollection {
    /// Write half of the WebSocket connection (shared for concurrent sends).
    ws_sender: Arc<Mutex<WsSender>>,
    /// Acks awaited by in-flight write requests.
    pending: PendingWrites,
    /// Source of write request ids.
    next_request_id: AtomicU64,
    /// Whether the connection is believed to be up.
    connected: Arc<AtomicBool>,
    /// Handle to the background reader task (kept for the adapter's lifetime).
    _reader_handle: tokio::task::JoinHandle<()>,
}

impl RemoteCollection {
    /// Connects to the sync server and opens the live subscription.
    ///
    /// Performs the following steps:
    /// 1. Validates the URL and establishes the WebSocket connection
    /// 2. Sends `Subscribe` with this client's protocol version
    /// 3. Waits for the `Subscribed` acknowledgment
    /// 4. Spawns a background task that forwards snapshots and write acks
    ///
    /// The current collection arrives as the first snapshot on the returned
    /// channel shortly after the handshake completes.
    ///
    /// # Errors
    ///
    /// - [`ConnectError::InvalidUrl`] for URLs that are not `ws`/`wss`.
    /// - [`ConnectError::Timeout`] if connecting or the handshake reply
    ///   exceeds the configured timeouts.
    /// - [`ConnectError::Unreachable`] if the server cannot be reached.
    /// - [`ConnectError::Rejected`] if the server refuses the subscription.
    /// - [`ConnectError::Handshake`] for any other handshake failure.
    pub async fn connect(
        config: &RemoteConfig,
    ) -> Result<(Self, mpsc::Receiver<SubscriptionEvent>), ConnectError> {
        let url = url::Url::parse(&config.url).map_err(|e| ConnectError::InvalidUrl {
            url: config.url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(ConnectError::InvalidUrl {
                url: config.url.clone(),
                reason: format!("unsupported scheme {:?}", url.scheme()),
            });
        }

        let (ws_stream, _response) =
            tokio::time::timeout(config.connect_timeout, connect_async(config.url.as_str()))
                .await
                .map_err(|_| {
                    tracing::warn!(url = %config.url, "sync server connect timed out");
                    ConnectError::Timeout
                })?
                .map_err(|e| {
                    tracing::warn!(url = %config.url, error = %e, "sync server connect failed");
                    map_ws_connect_error(&e)
                })?;

        let (mut ws_sender, mut ws_reader) = ws_stream.split();

        let subscribe = ClientRequest::Subscribe {
            protocol_version: PROTOCOL_VERSION,
        };
        let bytes = wire::encode_request(&subscribe)
            .map_err(|e| ConnectError::Handshake(format!("failed to encode subscribe: {e}")))?;
        ws_sender
            .send(Message::Binary(bytes.into()))
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "failed to send subscribe");
                ConnectError::Handshake(format!("failed to send subscribe: {e}"))
            })?;

        let ack = tokio::time::timeout(config.handshake_timeout, ws_reader.next())
            .await
            .map_err(|_| {
                tracing::warn!(url = %config.url, "subscribe acknowledgment timed out");
                ConnectError::Timeout
            })?;

        match ack {
            Some(Ok(Message::Binary(data))) => match wire::decode_push(&data) {
                Ok(ServerPush::Subscribed) => {
                    tracing::info!(url = %config.url, "subscribed to sync server");
                }
                Ok(ServerPush::Rejected { reason }) => {
                    tracing::warn!(reason = %reason, "subscription rejected");
                    return Err(ConnectError::Rejected(reason));
                }
                Ok(other) => {
                    tracing::warn!(?other, "unexpected reply during subscribe handshake");
                    return Err(ConnectError::Handshake(
                        "unexpected reply during handshake".to_string(),
                    ));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "malformed subscribe reply");
                    return Err(ConnectError::Handshake(format!("malformed reply: {e}")));
                }
            },
            Some(Ok(Message::Close(_))) | None => {
                tracing::warn!("connection closed during subscribe handshake");
                return Err(ConnectError::Handshake(
                    "connection closed during handshake".to_string(),
                ));
            }
            Some(Ok(_)) => {
                return Err(ConnectError::Handshake(
                    "unexpected non-binary frame during handshake".to_string(),
                ));
            }
            Some(Err(e)) => {
                return Err(ConnectError::Handshake(format!("stream error: {e}")));
            }
        }

        let (event_tx, event_rx) = mpsc::channel(config.channel_capacity);
        let pending: PendingWrites = Arc::new(parking_lot::Mutex::new(HashMap::new()));
        let connected = Arc::new(AtomicBool::new(true));

        let reader_handle = tokio::spawn(reader_loop(
            ws_reader,
            event_tx,
            Arc::clone(&pending),
            Arc::clone(&connected),
        ));

        Ok((
            Self {
                ws_sender: Arc::new(Mutex::new(ws_sender)),
                pending,
                next_request_id: AtomicU64::new(1),
                connected,
                _reader_handle: reader_handle,
            },
            event_rx,
        ))
    }

    /// Whether the connection to the sync server is believed to be up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Appends a new document. The new task reaches the view only through
    /// the subsequent snapshot push.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError`] if the request cannot be sent or the server
    /// refuses it.
    pub async fn append(&self, text: &str) -> Result<(), WriteError> {
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        self.request(
            ClientRequest::Append {
                request_id,
                text: text.to_string(),
            },
            request_id,
        )
        .await
    }

    /// Sets the completion flag of an existing document.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError`] if the request cannot be sent or the server
    /// refuses it (e.g. the document no longer exists).
    pub async fn patch(&self, id: &TaskId, completed: bool) -> Result<(), WriteError> {
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        self.request(
            ClientRequest::Patch {
                request_id,
                id: id.clone(),
                completed,
            },
            request_id,
        )
        .await
    }

    /// Removes a document. Removing an id the server no longer holds
    /// succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError`] if the request cannot be sent or the server
    /// refuses it.
    pub async fn remove(&self, id: &TaskId) -> Result<(), WriteError> {
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        self.request(
            ClientRequest::Remove {
                request_id,
                id: id.clone(),
            },
            request_id,
        )
        .await
    }

    /// Sends a write request and suspends until its ack arrives.
    async fn request(&self, request: ClientRequest, request_id: u64) -> Result<(), WriteError> {
        if !self.connected.load(Ordering::Relaxed) {
            return Err(WriteError::ConnectionClosed);
        }

        let bytes = wire::encode_request(&request).map_err(WriteError::Codec)?;

        let (ack_tx, ack_rx) = oneshot::channel();
        self.pending.lock().insert(request_id, ack_tx);

        {
            let mut sender = self.ws_sender.lock().await;
            if let Err(e) = sender.send(Message::Binary(bytes.into())).await {
                tracing::warn!(error = %e, "write send failed");
                self.pending.lock().remove(&request_id);
                self.connected.store(false, Ordering::Relaxed);
                return Err(WriteError::ConnectionClosed);
            }
        }

        match ack_rx.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(reason)) => Err(WriteError::Rejected(reason)),
            Err(_) => Err(WriteError::ConnectionClosed),
        }
    }
}

/// Background task that reads frames and dispatches them.
///
/// Snapshots go to the subscription channel; write acks resolve their
/// pending request. Malformed frames are logged and skipped. When the
/// stream ends — close frame, read error, or a late rejection — every
/// pending write fails, a terminal [`SubscriptionEvent::Lost`] is emitted,
/// and the task exits.
async fn reader_loop(
    mut ws_reader: WsReader,
    events: mpsc::Sender<SubscriptionEvent>,
    pending: PendingWrites,
    connected: Arc<AtomicBool>,
) {
    let mut reason = "subscription stream ended".to_string();

    while let Some(msg_result) = ws_reader.next().await {
        match msg_result {
            Ok(Message::Binary(data)) => match wire::decode_push(&data) {
                Ok(ServerPush::Snapshot { documents }) => {
                    let tasks: Vec<Task> = documents.into_iter().map(Task::from).collect();
                    if events.send(SubscriptionEvent::Snapshot(tasks)).await.is_err() {
                        // Receiver dropped — the store is gone, exit quietly.
                        connected.store(false, Ordering::Relaxed);
                        fail_pending(&pending, "subscription dropped");
                        return;
                    }
                }
                Ok(ServerPush::WriteOk { request_id }) => {
                    resolve_pending(&pending, request_id, Ok(()));
                }
                Ok(ServerPush::WriteFailed {
                    request_id,
                    reason: why,
                }) => {
                    resolve_pending(&pending, request_id, Err(why));
                }
                Ok(ServerPush::Subscribed) => {
                    tracing::debug!("duplicate subscribe acknowledgment");
                }
                Ok(ServerPush::Rejected { reason: why }) => {
                    reason = format!("server rejected the subscription: {why}");
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "malformed frame, skipping");
                }
            },
            Ok(Message::Close(_)) => {
                tracing::info!("sync server closed the connection");
                reason = "connection closed by sync server".to_string();
                break;
            }
            Ok(_) => {
                // Ignore ping/pong/text frames.
            }
            Err(e) => {
                tracing::warn!(error = %e, "sync server read error");
                reason = format!("stream error: {e}");
                break;
            }
        }
    }

    connected.store(false, Ordering::Relaxed);
    fail_pending(&pending, "connection to sync server closed");
    let _ = events.send(SubscriptionEvent::Lost { reason }).await;
    tracing::info!("subscription reader task exiting");
}

/// Resolves one pending write with the server's verdict.
fn resolve_pending(pending: &PendingWrites, request_id: u64, result: Result<(), String>) {
    if let Some(tx) = pending.lock().remove(&request_id) {
        let _ = tx.send(result);
    } else {
        tracing::debug!(request_id, "ack for unknown request");
    }
}

/// Fails every pending write, used when the connection goes away.
fn fail_pending(pending: &PendingWrites, reason: &str) {
    let drained: Vec<_> = pending.lock().drain().collect();
    for (_, tx) in drained {
        let _ = tx.send(Err(reason.to_string()));
    }
}

/// Maps a `tokio_tungstenite` connection error to a [`ConnectError`].
fn map_ws_connect_error(err: &tokio_tungstenite::tungstenite::Error) -> ConnectError {
    use tokio_tungstenite::tungstenite::Error as WsError;
    match err {
        WsError::Io(io_err) => {
            if io_err.kind() == std::io::ErrorKind::ConnectionRefused
                || io_err.kind() == std::io::ErrorKind::AddrNotAvailable
            {
                ConnectError::Unreachable(io_err.to_string())
            } else {
                ConnectError::Handshake(format!("I/O error: {io_err}"))
            }
        }
        WsError::Http(response) => {
            ConnectError::Handshake(format!("HTTP error: status {}", response.status()))
        }
        other => ConnectError::Unreachable(other.to_string()),
    }
}
