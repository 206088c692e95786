//! WebSocket API handler and connection management.

use crate::dispatch;
use crate::outbox::{outbox, Outbox};
use crate::subscriber::ConnectionSubscriber;
use crate::AppState;
use axum::{
    extract::{
        ws::{Message as AxumMessage, WebSocket},
        ConnectInfo, Extension, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use geobase_protocol::command;
use geobase_store::{Subscriber, SubscriberId};
use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::RwLock;

/// A registered connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    /// Identity the connection subscribes under.
    pub id: SubscriberId,
    /// Sequential index, used as a log prefix.
    pub index: usize,
}

/// Tracks open `/events` connections.
#[derive(Clone, Default)]
pub struct ConnectionManager {
    /// Active sessions: subscriber id -> connection index.
    sessions: Arc<RwLock<HashMap<SubscriberId, usize>>>,
    next_index: Arc<AtomicUsize>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection and assigns it a fresh id and index.
    pub async fn add_session(&self) -> Session {
        let session = Session {
            id: SubscriberId::new(),
            index: self.next_index.fetch_add(1, Ordering::Relaxed),
        };
        self.sessions.write().await.insert(session.id, session.index);
        session
    }

    /// Removes a session. Returns `false` if it was already gone, so a
    /// connection is only ever counted out once.
    pub async fn remove_session(&self, id: SubscriberId) -> bool {
        self.sessions.write().await.remove(&id).is_some()
    }

    /// Number of connected clients.
    pub async fn connected(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// WebSocket handler: `GET /events`.
pub async fn ws_handler(
    Extension(state): Extension<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    tracing::debug!(remote_addr = %addr, "websocket upgrade requested");
    ws.on_upgrade(move |socket| handle_socket(socket, state, addr))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, addr: SocketAddr) {
    let (mut sender, mut receiver) = socket.split();

    let (outbox, mut rx) = outbox(state.connection.max_queued_frames);

    let session = state.connection_manager.add_session().await;
    let connected = state.connection_manager.connected().await;
    tracing::info!(
        connection = session.index,
        subscriber = %session.id,
        remote_addr = %addr,
        connected,
        "client connected"
    );

    let subscriber: Arc<dyn Subscriber> = Arc::new(ConnectionSubscriber::new(
        session.id,
        session.index,
        outbox.clone(),
    ));

    // Spawn a task to forward messages from the outbox to the websocket sender
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(AxumMessage::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    outbox.push(command::HELLO.to_string());
    let ping_task = tokio::spawn(ping_loop(
        outbox.clone(),
        state.connection.ping_interval(),
    ));

    loop {
        let msg = tokio::select! {
            msg = receiver.next() => msg,
            _ = outbox.failed() => {
                tracing::warn!(
                    connection = session.index,
                    pending = outbox.pending(),
                    "client fell too far behind, closing"
                );
                break;
            }
        };
        match msg {
            Some(Ok(AxumMessage::Text(text))) => {
                tracing::debug!(connection = session.index, frame = %text.as_str(), "received");
                if let Some(reply) = dispatch::handle(&state.store, &subscriber, text.as_str()) {
                    outbox.push(reply);
                }
            }
            Some(Ok(AxumMessage::Close(_))) | Some(Err(_)) | None => break,
            Some(Ok(_)) => {}
        }
    }

    state.store.unsubscribe_all(session.id);
    let removed = state.connection_manager.remove_session(session.id).await;
    ping_task.abort();
    // Dropping both halves of the socket closes the connection.
    send_task.abort();

    if removed {
        let connected = state.connection_manager.connected().await;
        tracing::info!(connection = session.index, connected, "client closed");
    }
}

/// Sends `PING <n>` every `period`, counting from zero, until the
/// connection's outbox stops accepting frames.
async fn ping_loop(outbox: Outbox, period: Duration) {
    let mut interval = tokio::time::interval(period);
    for n in 0u64.. {
        interval.tick().await;
        if !outbox.push(format!("{} {}", command::PING, n)) {
            break;
        }
    }
}
