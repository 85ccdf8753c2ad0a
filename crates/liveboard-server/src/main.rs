//! Liveboard WebSocket Relay Server
//!
//! Relays transaction and presence messages between the connections of a
//! board, assigns stable numeric connection ids, and keeps the latest
//! document snapshot per board so late joiners can bootstrap.
//!
//! ## Protocol
//!
//! Messages are JSON with the following format:
//! ```json
//! { "type": "join", "board": "board-id", "info": { "name": "Ada" } }
//! { "type": "transaction", "ops": [ ... ] }
//! { "type": "presence", "cursor": { "x": 100.0, "y": 200.0 }, ... }
//! { "type": "snapshot", "document": { ... } }
//! ```
//!
//! Transaction, presence and snapshot payloads are opaque to the relay;
//! only the clients interpret them.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
};
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

/// Server configuration
const CHANNEL_CAPACITY: usize = 256;

/// A message sent by a client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join a board
    Join {
        board: String,
        #[serde(default)]
        info: Option<Value>,
    },
    /// Leave the current board
    Leave,
    /// Document deltas from one transaction (opaque to the relay)
    Transaction { ops: Value },
    /// Presence snapshot (opaque to the relay)
    Presence {
        #[serde(flatten)]
        state: Value,
    },
    /// Full document snapshot, retained for late joiners
    Snapshot { document: Value },
}

/// A message broadcast to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirm board join with the assigned connection id
    Joined {
        board: String,
        connection_id: u32,
        others: Vec<Peer>,
        #[serde(skip_serializing_if = "Option::is_none")]
        snapshot: Option<Value>,
    },
    /// A peer joined the board
    PeerJoined {
        connection_id: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        info: Option<Value>,
    },
    /// A peer left the board
    PeerLeft { connection_id: u32 },
    /// Transaction deltas from another connection
    Transaction { from: u32, ops: Value },
    /// Presence snapshot from another connection
    Presence {
        from: u32,
        #[serde(flatten)]
        state: Value,
    },
    /// Error message
    Error { message: String },
}

/// One participant as reported to joiners
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Peer {
    pub connection_id: u32,
    pub info: Value,
}

/// Board state
struct Board {
    /// Broadcast channel for this board
    tx: broadcast::Sender<(u32, ServerMessage)>,
    /// Connected peers and their identity info
    peers: HashMap<u32, Option<Value>>,
    /// Latest full document snapshot (for new joiners)
    last_snapshot: Option<Value>,
}

impl Board {
    fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tx,
            peers: HashMap::new(),
            last_snapshot: None,
        }
    }
}

/// Shared application state
struct AppState {
    /// Active boards
    boards: DashMap<String, Board>,
    /// Connection id allocator
    next_connection_id: AtomicU32,
}

impl AppState {
    fn new() -> Self {
        Self {
            boards: DashMap::new(),
            next_connection_id: AtomicU32::new(0),
        }
    }

    fn allocate_connection_id(&self) -> u32 {
        self.next_connection_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Add a peer to a board, returning its event stream, the other
    /// participants and the bootstrap snapshot.
    fn join_board(
        &self,
        board_id: &str,
        connection_id: u32,
        info: Option<Value>,
    ) -> (
        broadcast::Receiver<(u32, ServerMessage)>,
        Vec<Peer>,
        Option<Value>,
    ) {
        let mut board = self
            .boards
            .entry(board_id.to_string())
            .or_insert_with(Board::new);
        let others = board
            .peers
            .iter()
            .map(|(id, info)| Peer {
                connection_id: *id,
                // An empty object, not null, so clients with typed identity
                // records can still parse the peer
                info: info
                    .clone()
                    .unwrap_or_else(|| Value::Object(serde_json::Map::new())),
            })
            .collect();
        board.peers.insert(connection_id, info);
        let rx = board.tx.subscribe();
        let snapshot = board.last_snapshot.clone();
        (rx, others, snapshot)
    }

    /// Remove a peer from a board
    fn leave_board(&self, board_id: &str, connection_id: u32) {
        if let Some(mut board) = self.boards.get_mut(board_id) {
            board.peers.remove(&connection_id);
            // Clean up empty boards
            if board.peers.is_empty() {
                drop(board);
                self.boards.remove(board_id);
            }
        }
    }

    /// Retain the latest snapshot for late joiners
    fn update_snapshot(&self, board_id: &str, document: Value) {
        if let Some(mut board) = self.boards.get_mut(board_id) {
            board.last_snapshot = Some(document);
        }
    }

    /// Broadcast a message to a board
    fn broadcast(&self, board_id: &str, from: u32, msg: ServerMessage) {
        if let Some(board) = self.boards.get(board_id) {
            let _ = board.tx.send((from, msg));
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "liveboard_server=info,tower_http=info".into()),
        )
        .init();

    let state = Arc::new(AppState::new());

    let app = Router::new()
        .route("/", get(index))
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], 3030));
    info!("Liveboard relay server listening on {}", addr);
    info!("WebSocket endpoint: ws://localhost:3030/ws");

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

/// Index page
async fn index() -> &'static str {
    "Liveboard Relay Server - Connect via WebSocket at /ws"
}

/// Health check
async fn health() -> &'static str {
    "ok"
}

/// WebSocket upgrade handler
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle a WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let connection_id = state.allocate_connection_id();
    info!("New connection: {}", connection_id);

    let (mut sender, mut receiver) = socket.split();
    let mut current_board: Option<String> = None;
    let mut board_rx: Option<broadcast::Receiver<(u32, ServerMessage)>> = None;

    loop {
        tokio::select! {
            // Handle incoming messages from the client
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                match client_msg {
                                    ClientMessage::Join { board, info } => {
                                        // Leave current board if any
                                        if let Some(ref old_board) = current_board {
                                            state.leave_board(old_board, connection_id);
                                            state.broadcast(old_board, connection_id, ServerMessage::PeerLeft {
                                                connection_id,
                                            });
                                        }

                                        // Join new board
                                        let (rx, others, snapshot) =
                                            state.join_board(&board, connection_id, info.clone());
                                        board_rx = Some(rx);
                                        current_board = Some(board.clone());

                                        // Send joined confirmation
                                        let joined = ServerMessage::Joined {
                                            board: board.clone(),
                                            connection_id,
                                            others,
                                            snapshot,
                                        };
                                        if sender.send(Message::Text(serde_json::to_string(&joined).unwrap().into())).await.is_err() {
                                            break;
                                        }

                                        // Notify others
                                        state.broadcast(&board, connection_id, ServerMessage::PeerJoined {
                                            connection_id,
                                            info,
                                        });

                                        info!("Connection {} joined board {}", connection_id, board);
                                    }
                                    ClientMessage::Leave => {
                                        if let Some(ref board) = current_board {
                                            state.leave_board(board, connection_id);
                                            state.broadcast(board, connection_id, ServerMessage::PeerLeft {
                                                connection_id,
                                            });
                                            info!("Connection {} left board {}", connection_id, board);
                                        }
                                        current_board = None;
                                        board_rx = None;
                                    }
                                    ClientMessage::Transaction { ops } => {
                                        if let Some(ref board) = current_board {
                                            state.broadcast(board, connection_id, ServerMessage::Transaction {
                                                from: connection_id,
                                                ops,
                                            });
                                        }
                                    }
                                    ClientMessage::Presence { state: presence } => {
                                        if let Some(ref board) = current_board {
                                            state.broadcast(board, connection_id, ServerMessage::Presence {
                                                from: connection_id,
                                                state: presence,
                                            });
                                        }
                                    }
                                    ClientMessage::Snapshot { document } => {
                                        if let Some(ref board) = current_board {
                                            state.update_snapshot(board, document);
                                        }
                                    }
                                }
                            }
                            Err(e) => {
                                warn!("Invalid message from {}: {}", connection_id, e);
                                let err = ServerMessage::Error {
                                    message: format!("Invalid message: {}", e),
                                };
                                let _ = sender.send(Message::Text(serde_json::to_string(&err).unwrap().into())).await;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break;
                    }
                    Some(Ok(_)) => {} // Ignore binary, ping, pong
                    Some(Err(e)) => {
                        warn!("WebSocket error for {}: {}", connection_id, e);
                        break;
                    }
                }
            }

            // Handle broadcast messages from the board
            msg = async {
                match &mut board_rx {
                    Some(rx) => rx.recv().await.ok(),
                    None => {
                        // No board joined, just wait forever
                        std::future::pending::<Option<(u32, ServerMessage)>>().await
                    }
                }
            } => {
                if let Some((from, server_msg)) = msg {
                    // Don't echo back to the sender
                    if from != connection_id {
                        let json = serde_json::to_string(&server_msg).unwrap();
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }
    }

    // Cleanup on disconnect
    if let Some(ref board) = current_board {
        state.leave_board(board, connection_id);
        state.broadcast(board, connection_id, ServerMessage::PeerLeft {
            connection_id,
        });
    }
    info!("Connection closed: {}", connection_id);
}
