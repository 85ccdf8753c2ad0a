//! In-memory shared board state for one collaborative session.
//!
//! A `Room` is the authority every connection's transactions run against:
//! one shared document plus the ephemeral presence of each participant.
//! Transactions apply serially in arrival order, which gives per-field
//! last-write-wins with causal ordering within a connection. The same type
//! doubles as the in-memory fake for any real-time backend implementing
//! the synchronization contract.

use crate::document::BoardDocument;
use crate::presence::Presence;
use crate::session::{BoardSession, Op};
use crate::sync::{Participant, UserInfo};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Stable numeric id assigned to each live connection, never reused
/// within a room.
pub type ConnectionId = u32;

/// Change notification delivered to every other connection in the room.
#[derive(Debug, Clone)]
pub enum RoomEvent {
    /// A participant joined.
    PeerJoined {
        connection_id: ConnectionId,
        info: UserInfo,
    },
    /// A participant left.
    PeerLeft { connection_id: ConnectionId },
    /// Document deltas from one committed transaction.
    Transaction { from: ConnectionId, ops: Vec<Op> },
    /// Full presence snapshot of one participant.
    Presence {
        from: ConnectionId,
        presence: Presence,
    },
}

#[derive(Debug)]
pub(crate) struct ConnectionEntry {
    pub(crate) info: UserInfo,
    pub(crate) presence: Presence,
    pub(crate) inbox: Vec<RoomEvent>,
}

#[derive(Debug)]
pub(crate) struct RoomState {
    board_id: String,
    pub(crate) document: BoardDocument,
    pub(crate) connections: BTreeMap<ConnectionId, ConnectionEntry>,
    next_connection_id: ConnectionId,
}

impl RoomState {
    /// Queue an event for every connection except the sender.
    pub(crate) fn broadcast_from(&mut self, from: ConnectionId, event: RoomEvent) {
        for (id, connection) in self.connections.iter_mut() {
            if *id != from {
                connection.inbox.push(event.clone());
            }
        }
    }

    pub(crate) fn presence_of(&self, id: ConnectionId) -> Option<&Presence> {
        self.connections.get(&id).map(|c| &c.presence)
    }
}

/// Handle to a shared board session. Cheap to clone; all clones address
/// the same state.
#[derive(Debug, Clone)]
pub struct Room {
    inner: Arc<RwLock<RoomState>>,
}

impl Room {
    /// Open a room for the board with the given (opaque) id, starting from
    /// an empty document.
    pub fn new(board_id: impl Into<String>) -> Self {
        Self::with_document(board_id, BoardDocument::new())
    }

    /// Open a room seeded from a bootstrap snapshot.
    pub fn with_document(board_id: impl Into<String>, document: BoardDocument) -> Self {
        Self {
            inner: Arc::new(RwLock::new(RoomState {
                board_id: board_id.into(),
                document,
                connections: BTreeMap::new(),
                next_connection_id: 0,
            })),
        }
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, RoomState> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, RoomState> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn board_id(&self) -> String {
        self.read().board_id.clone()
    }

    /// Join the room as a new connection.
    pub fn connect(&self, info: UserInfo) -> BoardSession {
        let connection_id = {
            let mut state = self.write();
            let connection_id = state.next_connection_id;
            state.next_connection_id += 1;
            state.broadcast_from(
                connection_id,
                RoomEvent::PeerJoined {
                    connection_id,
                    info: info.clone(),
                },
            );
            state.connections.insert(
                connection_id,
                ConnectionEntry {
                    info,
                    presence: Presence::new(),
                    inbox: Vec::new(),
                },
            );
            connection_id
        };
        log::info!("connection {connection_id} joined board {}", self.board_id());
        BoardSession::new(self.clone(), connection_id)
    }

    pub(crate) fn disconnect(&self, connection_id: ConnectionId) {
        let mut state = self.write();
        if state.connections.remove(&connection_id).is_some() {
            state.broadcast_from(connection_id, RoomEvent::PeerLeft { connection_id });
        }
    }

    /// Ids of all live connections, in join order.
    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.read().connections.keys().copied().collect()
    }

    /// All live participants, in join order.
    pub fn participants(&self) -> Vec<Participant> {
        self.read()
            .connections
            .iter()
            .map(|(id, c)| Participant {
                connection_id: *id,
                info: c.info.clone(),
            })
            .collect()
    }

    /// Every participant except the given connection.
    pub fn others(&self, connection_id: ConnectionId) -> Vec<Participant> {
        self.participants()
            .into_iter()
            .filter(|p| p.connection_id != connection_id)
            .collect()
    }

    /// Current presence of a connection.
    pub fn presence_of(&self, connection_id: ConnectionId) -> Option<Presence> {
        self.read().presence_of(connection_id).cloned()
    }

    /// Copy of the current document, e.g. for bootstrapping a late joiner.
    pub fn snapshot(&self) -> BoardDocument {
        self.read().document.clone()
    }
}
