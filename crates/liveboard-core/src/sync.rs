//! Wire protocol for the relay and the identity collaborator boundary.
//!
//! Messages are JSON, tagged by `type`. The relay forwards transaction and
//! presence payloads blindly; only this crate interprets them.

use crate::color::{connection_id_to_color, Color};
use crate::document::BoardDocument;
use crate::presence::Presence;
use crate::room::ConnectionId;
use crate::session::Op;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Display identity supplied per connection by the identity provider.
/// Both fields may be absent and degrade to placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl UserInfo {
    /// Avatar fallback: first letter of the name, or "A" when absent.
    pub fn initial(&self) -> String {
        self.name
            .as_deref()
            .and_then(|name| name.chars().next())
            .map(|c| c.to_string())
            .unwrap_or_else(|| "A".to_string())
    }
}

/// One live participant as seen by everyone in the room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub connection_id: ConnectionId,
    pub info: UserInfo,
}

impl Participant {
    /// The palette color shown for this participant's cursor and
    /// selections.
    pub fn color(&self) -> Color {
        connection_id_to_color(self.connection_id)
    }
}

/// Messages sent to the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join a board session.
    Join {
        board: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        info: Option<UserInfo>,
    },
    /// Leave the current board.
    Leave,
    /// Document deltas from one committed transaction.
    Transaction { ops: Vec<Op> },
    /// Full presence snapshot for this connection.
    Presence {
        #[serde(flatten)]
        state: Presence,
    },
    /// Full document snapshot, retained by the relay for late joiners.
    Snapshot { document: BoardDocument },
}

/// Messages received from the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Join confirmation with the connection's assigned id, the other
    /// participants, and a bootstrap snapshot when the room has one.
    Joined {
        board: String,
        connection_id: ConnectionId,
        others: Vec<Participant>,
        #[serde(skip_serializing_if = "Option::is_none")]
        snapshot: Option<BoardDocument>,
    },
    /// A participant joined the board.
    PeerJoined {
        connection_id: ConnectionId,
        #[serde(skip_serializing_if = "Option::is_none")]
        info: Option<UserInfo>,
    },
    /// A participant left the board.
    PeerLeft { connection_id: ConnectionId },
    /// Transaction deltas from another connection.
    Transaction {
        from: ConnectionId,
        ops: Vec<Op>,
    },
    /// Presence snapshot from another connection.
    Presence {
        from: ConnectionId,
        #[serde(flatten)]
        state: Presence,
    },
    /// Relay-side failure (e.g. malformed message).
    Error { message: String },
}

/// Wire encode/decode failures.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid message: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientMessage {
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(json)?)
    }
}

impl ServerMessage {
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(json)?)
    }
}
