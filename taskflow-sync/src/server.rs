//! Sync server core: shared state, WebSocket handler, subscriber registry,
//! and snapshot broadcasting.
//!
//! Each client opens a WebSocket, performs the subscribe handshake, and
//! from then on receives the complete collection after every change. Write
//! requests are applied to the [`Collection`] and acknowledged per request;
//! a successful write triggers a snapshot broadcast to every subscriber,
//! including the writer.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use taskflow_proto::wire::{self, ClientRequest, PROTOCOL_VERSION, ServerPush};
use tokio::sync::{RwLock, mpsc};

use crate::collection::Collection;

/// Shared server state holding the collection and the subscriber registry.
pub struct SyncState {
    /// The authoritative task collection.
    pub collection: Collection,
    /// Maps a connection id to the channel feeding its WebSocket writer.
    subscribers: RwLock<HashMap<u64, mpsc::UnboundedSender<Message>>>,
    /// Source of per-connection ids.
    next_subscriber: AtomicU64,
}

impl Default for SyncState {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncState {
    /// Creates server state with an empty collection and default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::with_collection(Collection::new())
    }

    /// Creates server state around a pre-configured collection.
    #[must_use]
    pub fn with_collection(collection: Collection) -> Self {
        Self {
            collection,
            subscribers: RwLock::new(HashMap::new()),
            next_subscriber: AtomicU64::new(1),
        }
    }

    /// Registers a subscriber channel and returns its connection id.
    async fn register(&self, sender: mpsc::UnboundedSender<Message>) -> u64 {
        let id = self.next_subscriber.fetch_add(1, Ordering::Relaxed);
        self.subscribers.write().await.insert(id, sender);
        id
    }

    /// Removes a subscriber from the registry.
    async fn unregister(&self, id: u64) {
        self.subscribers.write().await.remove(&id);
    }

    /// Returns the number of live subscribers.
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Sends a WebSocket Close frame to every subscriber.
    ///
    /// Each connection's writer task forwards the close frame, which the
    /// client side observes as the subscription ending. Used for graceful
    /// shutdown and for exercising client-side disconnect handling in tests.
    pub async fn close_all(&self) {
        let subscribers = self.subscribers.read().await;
        for (id, sender) in subscribers.iter() {
            tracing::info!(subscriber = id, "sending close frame");
            let _ = sender.send(Message::Close(None));
        }
    }

    /// Pushes the current snapshot to every subscriber.
    async fn broadcast_snapshot(&self) {
        let documents = self.collection.snapshot().await;
        let push = ServerPush::Snapshot { documents };
        let bytes = match wire::encode_push(&push) {
            Ok(b) => b,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode snapshot");
                return;
            }
        };

        let mut dead = Vec::new();
        {
            let subscribers = self.subscribers.read().await;
            for (id, sender) in subscribers.iter() {
                if sender.send(Message::Binary(bytes.clone().into())).is_err() {
                    dead.push(*id);
                }
            }
        }
        for id in dead {
            tracing::debug!(subscriber = id, "dropping dead subscriber");
            self.unregister(id).await;
        }
    }
}

/// Handles an upgraded WebSocket connection for a single subscriber.
///
/// The connection lifecycle:
/// 1. Wait for a `Subscribe` frame and validate the protocol version.
/// 2. Reply `Subscribed` (or `Rejected` and hang up).
/// 3. Send the current snapshot so the client starts from live state.
/// 4. Enter the request loop, applying writes and broadcasting snapshots.
/// 5. On disconnect, unregister the subscriber.
pub async fn handle_socket(socket: WebSocket, state: Arc<SyncState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let Some(version) = wait_for_subscribe(&mut ws_receiver).await else {
        tracing::warn!("connection closed before subscribe");
        return;
    };

    if version != PROTOCOL_VERSION {
        tracing::warn!(
            client_version = version,
            server_version = PROTOCOL_VERSION,
            "rejecting subscriber with mismatched protocol version"
        );
        let reject = ServerPush::Rejected {
            reason: format!(
                "protocol version {version} not supported (server speaks {PROTOCOL_VERSION})"
            ),
        };
        let _ = send_push(&mut ws_sender, &reject).await;
        return;
    }

    if let Err(e) = send_push(&mut ws_sender, &ServerPush::Subscribed).await {
        tracing::warn!(error = %e, "failed to send subscribe ack");
        return;
    }

    // Initial snapshot, sent directly before the writer task takes over the
    // sink so it is guaranteed to precede any broadcast.
    let initial = ServerPush::Snapshot {
        documents: state.collection.snapshot().await,
    };
    if let Err(e) = send_push(&mut ws_sender, &initial).await {
        tracing::warn!(error = %e, "failed to send initial snapshot");
        return;
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let subscriber_id = state.register(tx.clone()).await;
    tracing::info!(subscriber = subscriber_id, "subscriber registered");

    // Writer task: forwards channel messages to the WebSocket.
    let mut write_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let is_close = matches!(msg, Message::Close(_));
            if ws_sender.send(msg).await.is_err() {
                break;
            }
            if is_close {
                break;
            }
        }
    });

    // Reader task: applies requests from this subscriber.
    let reader_state = Arc::clone(&state);
    let mut read_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Binary(data) => {
                    handle_request(&reader_state, &tx, subscriber_id, &data).await;
                }
                Message::Close(_) => {
                    tracing::info!(subscriber = subscriber_id, "received close frame");
                    break;
                }
                _ => {
                    // Ignore text, ping, pong frames.
                }
            }
        }
    });

    tokio::select! {
        _ = &mut read_task => {
            write_task.abort();
        }
        _ = &mut write_task => {
            read_task.abort();
        }
    }

    state.unregister(subscriber_id).await;
    tracing::info!(subscriber = subscriber_id, "subscriber disconnected");
}

/// Waits for the first frame, expecting a `Subscribe` request.
///
/// Returns the client's protocol version, or `None` if the connection
/// closes or an invalid frame arrives first.
async fn wait_for_subscribe(
    receiver: &mut (impl StreamExt<Item = Result<Message, axum::Error>> + Unpin),
) -> Option<u16> {
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Binary(data) => match wire::decode_request(&data) {
                Ok(ClientRequest::Subscribe { protocol_version }) => {
                    return Some(protocol_version);
                }
                Ok(other) => {
                    tracing::warn!(request = ?other, "expected Subscribe, got different request");
                    return None;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to decode subscribe frame");
                    return None;
                }
            },
            Message::Close(_) => return None,
            _ => {
                // Skip non-binary frames during the handshake.
            }
        }
    }
    None
}

/// Applies one request from a registered subscriber.
///
/// Write acks go back to the requester only; a successful write also
/// triggers a snapshot broadcast to every subscriber. Malformed frames are
/// logged and skipped without disconnecting.
async fn handle_request(
    state: &Arc<SyncState>,
    reply: &mpsc::UnboundedSender<Message>,
    subscriber_id: u64,
    data: &[u8],
) {
    let request = match wire::decode_request(data) {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(subscriber = subscriber_id, error = %e, "malformed frame, skipping");
            return;
        }
    };

    match request {
        ClientRequest::Subscribe { .. } => {
            tracing::warn!(
                subscriber = subscriber_id,
                "duplicate Subscribe from registered subscriber"
            );
        }
        ClientRequest::Append { request_id, text } => {
            match state.collection.append(&text).await {
                Ok(doc) => {
                    tracing::debug!(subscriber = subscriber_id, id = %doc.id, "document appended");
                    send_reply(reply, &ServerPush::WriteOk { request_id });
                    state.broadcast_snapshot().await;
                }
                Err(e) => {
                    send_reply(
                        reply,
                        &ServerPush::WriteFailed {
                            request_id,
                            reason: e.to_string(),
                        },
                    );
                }
            }
        }
        ClientRequest::Patch {
            request_id,
            id,
            completed,
        } => match state.collection.patch(&id, completed).await {
            Ok(()) => {
                tracing::debug!(subscriber = subscriber_id, id = %id, completed, "document patched");
                send_reply(reply, &ServerPush::WriteOk { request_id });
                state.broadcast_snapshot().await;
            }
            Err(e) => {
                send_reply(
                    reply,
                    &ServerPush::WriteFailed {
                        request_id,
                        reason: e.to_string(),
                    },
                );
            }
        },
        ClientRequest::Remove { request_id, id } => {
            let existed = state.collection.remove(&id).await;
            tracing::debug!(subscriber = subscriber_id, id = %id, existed, "document removed");
            send_reply(reply, &ServerPush::WriteOk { request_id });
            state.broadcast_snapshot().await;
        }
    }
}

/// Encodes a push and queues it on a subscriber's writer channel.
fn send_reply(reply: &mpsc::UnboundedSender<Message>, push: &ServerPush) {
    match wire::encode_push(push) {
        Ok(bytes) => {
            let _ = reply.send(Message::Binary(bytes.into()));
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to encode reply");
        }
    }
}

/// Encodes a push and sends it directly on the WebSocket sink.
async fn send_push(
    sender: &mut (impl SinkExt<Message, Error = axum::Error> + Unpin),
    push: &ServerPush,
) -> Result<(), String> {
    let bytes = wire::encode_push(push).map_err(|e| format!("encode failed: {e}"))?;
    sender
        .send(Message::Binary(bytes.into()))
        .await
        .map_err(|e| format!("send failed: {e}"))
}

/// Starts the sync server on the given address with fresh state.
///
/// This is the primary entry point used by both `main.rs` and test code.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server(
    addr: &str,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    start_server_with_state(addr, Arc::new(SyncState::new())).await
}

/// Starts the sync server with pre-configured [`SyncState`].
///
/// Use [`SyncState::with_collection`] to install a collection with custom
/// limits from the resolved [`crate::config::SyncConfig`].
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_state(
    addr: &str,
    state: Arc<SyncState>,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = axum::Router::new()
        .route("/ws", axum::routing::get(ws_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "sync server error");
        }
    });

    Ok((bound_addr, handle))
}

/// axum handler that upgrades an HTTP request to a WebSocket connection.
async fn ws_handler(
    ws: axum::extract::ws::WebSocketUpgrade,
    axum::extract::State(state): axum::extract::State<Arc<SyncState>>,
) -> impl axum::response::IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}
