//! Liveboard Core Library
//!
//! Backend-agnostic collaboration core for the Liveboard whiteboard:
//! the shared layer document, per-connection presence, the transactional
//! mutation engine with undo/redo, and the pointer-driven interaction
//! state machine.

pub mod camera;
pub mod color;
pub mod document;
pub mod geometry;
pub mod history;
pub mod interaction;
pub mod layer;
pub mod presence;
pub mod room;
pub mod session;
pub mod sync;

pub use camera::Camera;
pub use color::{connection_id_to_color, Color, CONNECTION_PALETTE};
pub use document::{BoardDocument, MAX_LAYERS};
pub use geometry::{find_intersecting_layers_with_rectangle, resize_bounds, Side};
pub use history::{History, MAX_UNDO_HISTORY};
pub use interaction::{CanvasController, CanvasMode, Modifiers, Tool};
pub use layer::{Layer, LayerId, LayerPatch, LayerType, PathPoint};
pub use presence::Presence;
pub use room::{ConnectionId, Room, RoomEvent};
pub use session::{BoardSession, Op, Txn};
pub use sync::{ClientMessage, Participant, ProtocolError, ServerMessage, UserInfo};
