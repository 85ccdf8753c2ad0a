//! The mutation engine: atomic, broadcastable transactions against the
//! shared board.
//!
//! Every write to the document or to this connection's presence happens
//! inside [`BoardSession::mutate`]. The transaction body works against the
//! current shared state; its changes are applied atomically, broadcast to
//! all other connections as deltas, and (when eligible) recorded as one
//! history step. Failures named by the error design (capacity, invalid
//! draft, missing ids) are silent no-ops, never errors: during live
//! collaboration a dropped gesture beats a torn one.

use crate::color::{connection_id_to_color, Color};
use crate::document::BoardDocument;
use crate::history::History;
use crate::layer::{Layer, LayerId, LayerPatch, LayerType};
use crate::presence::Presence;
use crate::room::{ConnectionId, Room, RoomEvent, RoomState};
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// One delta produced by a transaction. Ops are the unit of broadcast,
/// of history recording, and of undo/redo replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    /// A layer appeared at the given paint-order index.
    InsertLayer { index: usize, layer: Layer },
    /// A layer was removed.
    DeleteLayer { id: LayerId },
    /// Fields merged into a layer.
    PatchLayer { id: LayerId, patch: LayerPatch },
    /// Layers offset uniformly.
    TranslateLayers {
        ids: Vec<LayerId>,
        dx: f64,
        dy: f64,
    },
    /// A layer moved to a new paint-order index.
    ReorderLayer { id: LayerId, index: usize },
    /// This connection's selection changed. Carried in history entries and
    /// replayed on undo, but broadcast to peers via presence snapshots.
    SetSelection { ids: Vec<LayerId> },
}

#[derive(Debug, Default)]
struct TxnOutcome {
    doc_ops: Vec<Op>,
    forward: Vec<Op>,
    inverse: Vec<Op>,
    presence_changed: bool,
}

/// Read/write access to the shared state for the duration of one
/// transaction body.
pub struct Txn<'a> {
    state: &'a mut RoomState,
    connection_id: ConnectionId,
    outcome: TxnOutcome,
}

impl<'a> Txn<'a> {
    fn new(state: &'a mut RoomState, connection_id: ConnectionId) -> Self {
        Self {
            state,
            connection_id,
            outcome: TxnOutcome::default(),
        }
    }

    fn into_outcome(self) -> TxnOutcome {
        self.outcome
    }

    fn record(&mut self, forward: Op, inverse: Op) {
        if !matches!(forward, Op::SetSelection { .. }) {
            self.outcome.doc_ops.push(forward.clone());
        }
        self.outcome.forward.push(forward);
        self.outcome.inverse.push(inverse);
    }

    fn own_presence_mut(&mut self) -> Option<&mut Presence> {
        self.state
            .connections
            .get_mut(&self.connection_id)
            .map(|c| &mut c.presence)
    }

    // --- Reads ---

    pub fn document(&self) -> &BoardDocument {
        &self.state.document
    }

    /// This connection's presence.
    pub fn presence(&self) -> Presence {
        self.state
            .presence_of(self.connection_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn selection(&self) -> Vec<LayerId> {
        self.presence().selection
    }

    // --- Layer store operations ---

    /// Insert a layer with the default extent at `position`.
    /// Silently rejected when the board is at capacity.
    pub fn insert_layer(
        &mut self,
        layer_type: LayerType,
        position: Point,
        fill: Option<Color>,
    ) -> Option<LayerId> {
        let id = self.state.document.insert(layer_type, position, fill)?;
        let index = self.state.document.len() - 1;
        let layer = self.state.document.get(id)?.clone();
        self.record(Op::InsertLayer { index, layer }, Op::DeleteLayer { id });
        Some(id)
    }

    /// Merge fields into an existing layer; no-op when the id is gone.
    pub fn update_layer(&mut self, id: LayerId, patch: LayerPatch) {
        if patch.is_empty() {
            return;
        }
        if let Some(inverse) = self.state.document.update(id, &patch) {
            self.record(
                Op::PatchLayer { id, patch },
                Op::PatchLayer { id, patch: inverse },
            );
        }
    }

    /// Offset the named layers; ids deleted by a peer are skipped.
    pub fn translate_layers(&mut self, ids: &[LayerId], dx: f64, dy: f64) {
        let moved = self.state.document.translate(ids, dx, dy);
        if moved.is_empty() {
            return;
        }
        self.record(
            Op::TranslateLayers {
                ids: moved.clone(),
                dx,
                dy,
            },
            Op::TranslateLayers {
                ids: moved,
                dx: -dx,
                dy: -dy,
            },
        );
    }

    /// Offset every selected layer.
    pub fn translate_selection(&mut self, dx: f64, dy: f64) {
        let ids = self.selection();
        self.translate_layers(&ids, dx, dy);
    }

    /// Remove the named layers; absent ids are ignored.
    pub fn delete_layers(&mut self, ids: &[LayerId]) {
        for &id in ids {
            if let Some((index, layer)) = self.state.document.remove(id) {
                self.record(Op::DeleteLayer { id }, Op::InsertLayer { index, layer });
            }
        }
    }

    /// Move a layer to the top of the paint order.
    pub fn bring_to_front(&mut self, id: LayerId) {
        self.reorder_layer(id, usize::MAX);
    }

    /// Move a layer to the bottom of the paint order.
    pub fn send_to_back(&mut self, id: LayerId) {
        self.reorder_layer(id, 0);
    }

    pub(crate) fn reorder_layer(&mut self, id: LayerId, index: usize) {
        let target = index.min(self.state.document.len().saturating_sub(1));
        if let Some(previous) = self.state.document.reorder(id, target) {
            if previous == target {
                return;
            }
            self.record(
                Op::ReorderLayer { id, index: target },
                Op::ReorderLayer { id, index: previous },
            );
        }
    }

    // --- Presence operations ---

    /// Replace this connection's selection. With `add_to_history`, the
    /// change is undoable; clearing an already empty selection never
    /// records or broadcasts anything.
    pub fn set_selection(&mut self, ids: Vec<LayerId>, add_to_history: bool) {
        let Some(previous) = self
            .own_presence_mut()
            .and_then(|p| p.set_selection(ids.clone()))
        else {
            return;
        };
        self.outcome.presence_changed = true;
        if add_to_history {
            self.outcome.forward.push(Op::SetSelection { ids });
            self.outcome.inverse.push(Op::SetSelection { ids: previous });
        }
    }

    /// Clear the selection as an undoable step.
    pub fn unselect(&mut self) {
        self.set_selection(Vec::new(), true);
    }

    /// Update the cursor; never recorded in history.
    pub fn set_cursor(&mut self, cursor: Option<Point>) {
        if let Some(presence) = self.own_presence_mut() {
            if presence.set_cursor(cursor) {
                self.outcome.presence_changed = true;
            }
        }
    }

    /// Begin a freehand stroke, snapshotting the pen color.
    pub fn start_draft(&mut self, point: Point, pressure: f64, color: Color) {
        if let Some(presence) = self.own_presence_mut() {
            presence.start_draft(point, pressure, color);
            self.outcome.presence_changed = true;
        }
    }

    /// Append a sample to the in-progress stroke.
    pub fn append_to_draft(&mut self, point: Point, pressure: f64) {
        if let Some(presence) = self.own_presence_mut() {
            if presence.append_to_draft(point, pressure) {
                self.outcome.presence_changed = true;
            }
        }
    }

    /// Commit the stroke as a path layer and clear the draft. A draft with
    /// fewer than 2 samples, or a full board, just clears the draft.
    pub fn commit_draft(&mut self) -> Option<LayerId> {
        let (points, fill) = {
            let presence = self.own_presence_mut()?;
            let points = presence.take_draft()?;
            (points, presence.pen_color)
        };
        self.outcome.presence_changed = true;

        let id = self.state.document.insert_path(&points, Some(fill))?;
        let index = self.state.document.len() - 1;
        let layer = self.state.document.get(id)?.clone();
        self.record(Op::InsertLayer { index, layer }, Op::DeleteLayer { id });
        Some(id)
    }

    /// Abandon the in-progress stroke.
    pub fn cancel_draft(&mut self) {
        if let Some(presence) = self.own_presence_mut() {
            if presence.take_draft().is_some() {
                self.outcome.presence_changed = true;
            }
        }
    }

    // --- Replay ---

    /// Apply a previously recorded op. Ids that have vanished in the
    /// meantime make the op a no-op; re-inserts respect the capacity cap.
    pub(crate) fn apply(&mut self, op: &Op) {
        match op {
            Op::InsertLayer { index, layer } => {
                if self.state.document.restore(*index, layer.clone()) {
                    self.record(
                        Op::InsertLayer {
                            index: *index,
                            layer: layer.clone(),
                        },
                        Op::DeleteLayer { id: layer.id() },
                    );
                }
            }
            Op::DeleteLayer { id } => self.delete_layers(&[*id]),
            Op::PatchLayer { id, patch } => self.update_layer(*id, patch.clone()),
            Op::TranslateLayers { ids, dx, dy } => self.translate_layers(ids, *dx, *dy),
            Op::ReorderLayer { id, index } => self.reorder_layer(*id, *index),
            Op::SetSelection { ids } => self.set_selection(ids.clone(), false),
        }
    }
}

/// One connection's handle onto a shared board: the mutation engine plus
/// its private undo/redo history.
#[derive(Debug)]
pub struct BoardSession {
    room: Room,
    connection_id: ConnectionId,
    history: History,
}

impl BoardSession {
    pub(crate) fn new(room: Room, connection_id: ConnectionId) -> Self {
        Self {
            room,
            connection_id,
            history: History::new(),
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// The palette color other participants see for this connection.
    pub fn color(&self) -> Color {
        connection_id_to_color(self.connection_id)
    }

    pub fn room(&self) -> &Room {
        &self.room
    }

    /// Run a transaction body against the current shared state. Changes
    /// are applied atomically, broadcast to peers, and recorded as one
    /// history step when any history-eligible mutation ran.
    pub fn mutate<R>(&mut self, body: impl FnOnce(&mut Txn) -> R) -> R {
        self.run_txn(true, body)
    }

    fn run_txn<R>(&mut self, record_history: bool, body: impl FnOnce(&mut Txn) -> R) -> R {
        let room = self.room.clone();
        let mut state = room.write();
        let mut txn = Txn::new(&mut state, self.connection_id);
        let out = body(&mut txn);
        let outcome = txn.into_outcome();

        if !outcome.doc_ops.is_empty() {
            state.broadcast_from(
                self.connection_id,
                RoomEvent::Transaction {
                    from: self.connection_id,
                    ops: outcome.doc_ops,
                },
            );
        }
        if outcome.presence_changed {
            if let Some(presence) = state.presence_of(self.connection_id).cloned() {
                state.broadcast_from(
                    self.connection_id,
                    RoomEvent::Presence {
                        from: self.connection_id,
                        presence,
                    },
                );
            }
        }
        drop(state);

        if record_history {
            self.history.record(outcome.forward, outcome.inverse);
        }
        out
    }

    // --- History ---

    /// Collapse subsequent mutations into a single undo step.
    pub fn pause_history(&mut self) {
        self.history.pause();
    }

    /// Seal the current gesture. Safe to call on every pointer-up.
    pub fn resume_history(&mut self) {
        self.history.resume();
    }

    /// Revert the most recent history step. Replays inverse deltas through
    /// a no-history transaction, so changes landed by peers in the
    /// meantime win (a concurrently deleted layer stays deleted).
    pub fn undo(&mut self) -> bool {
        let Some(entry) = self.history.pop_undo() else {
            return false;
        };
        self.run_txn(false, |txn| {
            for op in entry.inverse.iter().rev() {
                txn.apply(op);
            }
        });
        self.history.push_redo(entry);
        true
    }

    /// Reapply the most recently undone step.
    pub fn redo(&mut self) -> bool {
        let Some(entry) = self.history.pop_redo() else {
            return false;
        };
        self.run_txn(false, |txn| {
            for op in entry.forward.iter() {
                txn.apply(op);
            }
        });
        self.history.restore_undo(entry);
        true
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    // --- Reads and change subscription ---

    /// Read the shared document.
    pub fn with_document<R>(&self, read: impl FnOnce(&BoardDocument) -> R) -> R {
        read(&self.room.read().document)
    }

    /// This connection's current presence.
    pub fn presence(&self) -> Presence {
        self.room
            .presence_of(self.connection_id)
            .unwrap_or_default()
    }

    pub fn selection(&self) -> Vec<LayerId> {
        self.presence().selection
    }

    /// Union of the selected layers' bounding boxes.
    pub fn selection_bounds(&self) -> Option<Rect> {
        let selection = self.selection();
        self.with_document(|doc| doc.bounds_of(&selection))
    }

    /// Drain events queued by other connections since the last poll.
    pub fn poll_events(&mut self) -> Vec<RoomEvent> {
        let mut state = self.room.write();
        state
            .connections
            .get_mut(&self.connection_id)
            .map(|c| std::mem::take(&mut c.inbox))
            .unwrap_or_default()
    }
}

impl Drop for BoardSession {
    fn drop(&mut self) {
        self.room.disconnect(self.connection_id);
    }
}
