//! Pointer-driven interaction state machine.
//!
//! One `CanvasController` per connection translates pointer and keyboard
//! events into session transactions. The current gesture is a single
//! tagged [`CanvasMode`] value, created on pointer-down, advanced on
//! pointer-move and resolved on pointer-up, so impossible combinations
//! (resizing with nothing selected, drawing while inserting) cannot be
//! represented.

use crate::camera::Camera;
use crate::color::Color;
use crate::geometry::{self, Side};
use crate::layer::{LayerId, LayerPatch, LayerType};
use crate::session::BoardSession;
use kurbo::{Point, Rect};

/// Manhattan drag distance before a press becomes a selection net.
pub const SELECTION_NET_THRESHOLD: f64 = 5.0;

/// Modifier keys held during a keyboard event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

/// Toolbar tools a user can pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    #[default]
    Select,
    Pencil,
    Rectangle,
    Ellipse,
    Text,
    Note,
}

/// The active interaction state. Connection-local, never broadcast.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CanvasMode {
    /// Nothing in progress.
    None,
    /// Pointer down on empty canvas, waiting to see if this is a click or
    /// a drag.
    Pressing { origin: Point },
    /// Dragging a rectangular multi-select net.
    SelectionNet { origin: Point, current: Point },
    /// Dragging the selected layers.
    Translating { current: Point },
    /// Dragging a resize handle of the sole selected layer.
    Resizing { initial_bounds: Rect, corner: Side },
    /// Pencil tool active; strokes accumulate in the presence draft.
    Pencil,
    /// Insert tool active; the layer is created on pointer-up.
    Inserting { layer_type: LayerType },
}

/// Drives the interaction state machine for one connection.
pub struct CanvasController {
    session: BoardSession,
    /// View transform for this connection. Local value, threaded through
    /// every pointer conversion.
    pub camera: Camera,
    mode: CanvasMode,
    last_used_color: Color,
    primary_pressed: bool,
}

impl CanvasController {
    pub fn new(session: BoardSession) -> Self {
        Self {
            session,
            camera: Camera::new(),
            mode: CanvasMode::None,
            last_used_color: Color::black(),
            primary_pressed: false,
        }
    }

    pub fn mode(&self) -> &CanvasMode {
        &self.mode
    }

    pub fn session(&self) -> &BoardSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut BoardSession {
        &mut self.session
    }

    pub fn last_used_color(&self) -> Color {
        self.last_used_color
    }

    /// Switch tools. Select returns to the idle mode; pencil and the
    /// insert tools arm their respective modes.
    pub fn set_tool(&mut self, tool: Tool) {
        self.mode = match tool {
            Tool::Select => CanvasMode::None,
            Tool::Pencil => CanvasMode::Pencil,
            Tool::Rectangle => CanvasMode::Inserting {
                layer_type: LayerType::Rectangle,
            },
            Tool::Ellipse => CanvasMode::Inserting {
                layer_type: LayerType::Ellipse,
            },
            Tool::Text => CanvasMode::Inserting {
                layer_type: LayerType::Text,
            },
            Tool::Note => CanvasMode::Inserting {
                layer_type: LayerType::Note,
            },
        };
    }

    /// Pick a fill color: remembered for future inserts and applied to the
    /// current selection as one undoable step.
    pub fn set_fill(&mut self, color: Color) {
        self.last_used_color = color;
        self.session.mutate(|txn| {
            for id in txn.selection() {
                txn.update_layer(id, LayerPatch::fill(color));
            }
        });
    }

    /// Delete the selected layers. Only reachable through an explicit
    /// call; there is no keyboard binding for it.
    pub fn delete_selected(&mut self) {
        self.session.mutate(|txn| {
            let ids = txn.selection();
            txn.delete_layers(&ids);
            txn.set_selection(Vec::new(), true);
        });
    }

    /// Primary-button pointer-down anywhere on the canvas.
    pub fn on_pointer_down(&mut self, screen: Point, pressure: f64) {
        self.primary_pressed = true;
        let point = self.camera.screen_to_world(screen);
        match self.mode {
            // Insertion happens on pointer-up
            CanvasMode::Inserting { .. } => {}
            CanvasMode::Pencil => {
                let color = self.last_used_color;
                self.session
                    .mutate(|txn| txn.start_draft(point, pressure, color));
            }
            _ => {
                let hit = self
                    .session
                    .with_document(|doc| doc.layer_at_point(point, 0.0));
                match hit {
                    Some(id) => self.begin_translate(id, point),
                    None => self.mode = CanvasMode::Pressing { origin: point },
                }
            }
        }
    }

    /// Pointer-down delivered on a specific layer (e.g. by a host UI with
    /// its own hit-testing). Tool modes suppress the select behavior.
    pub fn on_layer_pointer_down(&mut self, id: LayerId, screen: Point) {
        if matches!(self.mode, CanvasMode::Pencil | CanvasMode::Inserting { .. }) {
            return;
        }
        self.primary_pressed = true;
        let point = self.camera.screen_to_world(screen);
        self.begin_translate(id, point);
    }

    fn begin_translate(&mut self, id: LayerId, point: Point) {
        self.session.pause_history();
        self.session.mutate(|txn| {
            if !txn.selection().contains(&id) {
                txn.set_selection(vec![id], true);
            }
        });
        self.mode = CanvasMode::Translating { current: point };
    }

    /// Pointer-down on a resize handle of the selection box.
    pub fn on_resize_handle_pointer_down(&mut self, corner: Side, initial_bounds: Rect) {
        self.primary_pressed = true;
        self.session.pause_history();
        self.mode = CanvasMode::Resizing {
            initial_bounds,
            corner,
        };
    }

    pub fn on_pointer_move(&mut self, screen: Point, pressure: f64) {
        let point = self.camera.screen_to_world(screen);
        match self.mode {
            CanvasMode::Pressing { origin } => {
                let distance = (point.x - origin.x).abs() + (point.y - origin.y).abs();
                if distance > SELECTION_NET_THRESHOLD {
                    self.mode = CanvasMode::SelectionNet {
                        origin,
                        current: point,
                    };
                }
                self.session.mutate(|txn| txn.set_cursor(Some(point)));
            }
            CanvasMode::SelectionNet { origin, .. } => {
                self.mode = CanvasMode::SelectionNet {
                    origin,
                    current: point,
                };
                self.session.mutate(|txn| {
                    let ids = txn.document().layers_in_rect(origin, point);
                    txn.set_selection(ids, false);
                    txn.set_cursor(Some(point));
                });
            }
            CanvasMode::Translating { current } => {
                let dx = point.x - current.x;
                let dy = point.y - current.y;
                self.mode = CanvasMode::Translating { current: point };
                self.session.mutate(|txn| {
                    txn.translate_selection(dx, dy);
                    txn.set_cursor(Some(point));
                });
            }
            CanvasMode::Resizing {
                initial_bounds,
                corner,
            } => {
                let bounds = geometry::resize_bounds(initial_bounds, corner, point);
                self.session.mutate(|txn| {
                    let selection = txn.selection();
                    if let Some(&id) = selection.first() {
                        txn.update_layer(id, LayerPatch::from_bounds(bounds));
                    }
                    txn.set_cursor(Some(point));
                });
            }
            CanvasMode::Pencil => {
                let drawing = self.primary_pressed;
                self.session.mutate(|txn| {
                    if drawing {
                        txn.append_to_draft(point, pressure);
                    }
                    txn.set_cursor(Some(point));
                });
            }
            CanvasMode::None | CanvasMode::Inserting { .. } => {
                self.session.mutate(|txn| txn.set_cursor(Some(point)));
            }
        }
    }

    pub fn on_pointer_up(&mut self, screen: Point) {
        let point = self.camera.screen_to_world(screen);
        self.primary_pressed = false;
        match self.mode {
            CanvasMode::None | CanvasMode::Pressing { .. } => {
                self.session.mutate(|txn| txn.unselect());
                self.mode = CanvasMode::None;
            }
            CanvasMode::Pencil => {
                // Stays in pencil mode, ready for the next stroke
                let _ = self.session.mutate(|txn| txn.commit_draft());
            }
            CanvasMode::Inserting { layer_type } => {
                let fill = self.last_used_color;
                self.session.mutate(|txn| {
                    if let Some(id) = txn.insert_layer(layer_type, point, Some(fill)) {
                        txn.set_selection(vec![id], true);
                    }
                });
                self.mode = CanvasMode::None;
            }
            CanvasMode::SelectionNet { .. }
            | CanvasMode::Translating { .. }
            | CanvasMode::Resizing { .. } => {
                self.mode = CanvasMode::None;
            }
        }
        // Every branch ends the gesture here. A pause leaking past
        // pointer-up would merge unrelated future edits into one step.
        self.session.resume_history();
    }

    /// Pointer left the canvas: drop the cursor from presence. The up
    /// event still arrives through pointer capture and ends the gesture.
    pub fn on_pointer_leave(&mut self) {
        self.session.mutate(|txn| txn.set_cursor(None));
    }

    /// Gesture abandoned without an up event (capture lost, window blur).
    /// Resets the gesture and makes sure history is not left paused.
    pub fn cancel_gesture(&mut self) {
        match self.mode {
            CanvasMode::Pencil => self.session.mutate(|txn| txn.cancel_draft()),
            CanvasMode::Inserting { .. } | CanvasMode::None => {}
            CanvasMode::Pressing { .. }
            | CanvasMode::SelectionNet { .. }
            | CanvasMode::Translating { .. }
            | CanvasMode::Resizing { .. } => self.mode = CanvasMode::None,
        }
        self.primary_pressed = false;
        self.session.resume_history();
    }

    /// Undo/redo shortcuts. These bypass the state machine and talk to the
    /// history controller directly. Returns whether the key was handled.
    pub fn on_key_down(&mut self, key: &str, modifiers: Modifiers) -> bool {
        if !(modifiers.ctrl || modifiers.meta) {
            return false;
        }
        match key {
            "z" | "Z" => {
                if modifiers.shift {
                    self.session.redo();
                } else {
                    self.session.undo();
                }
                true
            }
            "y" | "Y" => {
                self.session.redo();
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::Room;
    use crate::sync::UserInfo;
    use kurbo::Vec2;

    fn controller() -> CanvasController {
        CanvasController::new(Room::new("board-1").connect(UserInfo::default()))
    }

    fn insert_rect(controller: &mut CanvasController, x: f64, y: f64) -> LayerId {
        controller
            .session_mut()
            .mutate(|txn| {
                txn.insert_layer(
                    LayerType::Rectangle,
                    Point::new(x, y),
                    Some(Color::black()),
                )
            })
            .unwrap()
    }

    #[test]
    fn test_press_below_threshold_stays_pressing() {
        let mut c = controller();
        c.on_pointer_down(Point::new(500.0, 500.0), 1.0);
        assert!(matches!(c.mode(), CanvasMode::Pressing { .. }));

        c.on_pointer_move(Point::new(502.0, 502.0), 1.0);
        assert!(matches!(c.mode(), CanvasMode::Pressing { .. }));

        c.on_pointer_move(Point::new(504.0, 504.0), 1.0);
        assert!(matches!(c.mode(), CanvasMode::SelectionNet { .. }));
    }

    #[test]
    fn test_selection_net_selects_intersecting() {
        let mut c = controller();
        let a = insert_rect(&mut c, 0.0, 0.0);
        let _b = insert_rect(&mut c, 500.0, 500.0);

        c.on_pointer_down(Point::new(-20.0, -20.0), 1.0);
        c.on_pointer_move(Point::new(-10.0, -10.0), 1.0);
        c.on_pointer_move(Point::new(50.0, 50.0), 1.0);
        assert_eq!(c.session().selection(), vec![a]);

        c.on_pointer_up(Point::new(50.0, 50.0));
        assert_eq!(*c.mode(), CanvasMode::None);
        // Net selection stays after the gesture
        assert_eq!(c.session().selection(), vec![a]);
    }

    #[test]
    fn test_click_on_empty_canvas_clears_selection_undoably() {
        let mut c = controller();
        let id = insert_rect(&mut c, 0.0, 0.0);
        c.session_mut().mutate(|txn| txn.set_selection(vec![id], true));

        c.on_pointer_down(Point::new(500.0, 500.0), 1.0);
        c.on_pointer_up(Point::new(500.0, 500.0));
        assert!(c.session().selection().is_empty());

        assert!(c.session_mut().undo());
        assert_eq!(c.session().selection(), vec![id]);
    }

    #[test]
    fn test_drag_translates_as_single_undo_step() {
        let mut c = controller();
        let id = insert_rect(&mut c, 0.0, 0.0);

        // Pointer-down on the layer selects it and starts translating
        c.on_pointer_down(Point::new(50.0, 50.0), 1.0);
        assert!(matches!(c.mode(), CanvasMode::Translating { .. }));
        assert_eq!(c.session().selection(), vec![id]);

        c.on_pointer_move(Point::new(54.0, 54.0), 1.0);
        c.on_pointer_move(Point::new(57.0, 57.0), 1.0);
        c.on_pointer_move(Point::new(60.0, 60.0), 1.0);
        c.on_pointer_up(Point::new(60.0, 60.0));

        c.session().with_document(|doc| {
            assert_eq!(doc.get(id).unwrap().position(), Point::new(10.0, 10.0));
        });

        // Selection and all three moves collapse into one step
        assert!(c.session_mut().undo());
        c.session().with_document(|doc| {
            assert_eq!(doc.get(id).unwrap().position(), Point::new(0.0, 0.0));
        });
        assert!(c.session().selection().is_empty());
    }

    #[test]
    fn test_gesture_does_not_leak_paused_history() {
        let mut c = controller();
        insert_rect(&mut c, 0.0, 0.0);

        // A full drag gesture, then two independent edits
        c.on_pointer_down(Point::new(50.0, 50.0), 1.0);
        c.on_pointer_move(Point::new(60.0, 60.0), 1.0);
        c.on_pointer_up(Point::new(60.0, 60.0));

        let second = insert_rect(&mut c, 200.0, 0.0);
        let third = insert_rect(&mut c, 300.0, 0.0);

        // The two inserts are separate steps, not merged into the gesture
        assert!(c.session_mut().undo());
        c.session().with_document(|doc| {
            assert!(!doc.contains(third));
            assert!(doc.contains(second));
        });
    }

    #[test]
    fn test_resize_updates_sole_selected_layer() {
        let mut c = controller();
        let id = insert_rect(&mut c, 0.0, 0.0);
        c.session_mut().mutate(|txn| txn.set_selection(vec![id], true));

        let initial = c.session().selection_bounds().unwrap();
        c.on_resize_handle_pointer_down(Side::BottomRight, initial);
        c.on_pointer_move(Point::new(150.0, 120.0), 1.0);
        c.on_pointer_up(Point::new(150.0, 120.0));

        c.session().with_document(|doc| {
            let bounds = doc.get(id).unwrap().bounds();
            assert!((bounds.width() - 150.0).abs() < 1e-9);
            assert!((bounds.height() - 120.0).abs() < 1e-9);
        });
        assert_eq!(*c.mode(), CanvasMode::None);
    }

    #[test]
    fn test_resize_tolerates_layer_deleted_mid_gesture() {
        let room = Room::new("board-1");
        let mut c = CanvasController::new(room.connect(UserInfo::default()));
        let mut peer = room.connect(UserInfo::default());
        let id = insert_rect(&mut c, 0.0, 0.0);
        c.session_mut().mutate(|txn| txn.set_selection(vec![id], true));

        let initial = c.session().selection_bounds().unwrap();
        c.on_resize_handle_pointer_down(Side::BottomRight, initial);
        peer.mutate(|txn| txn.delete_layers(&[id]));

        // The selected layer vanished; the move must be a silent no-op
        c.on_pointer_move(Point::new(150.0, 120.0), 1.0);
        c.on_pointer_up(Point::new(150.0, 120.0));
        c.session().with_document(|doc| assert!(!doc.contains(id)));
    }

    #[test]
    fn test_pencil_stroke_lifecycle() {
        let mut c = controller();
        c.set_tool(Tool::Pencil);

        c.on_pointer_down(Point::new(0.0, 0.0), 0.5);
        c.on_pointer_move(Point::new(10.0, 0.0), 0.5);
        c.on_pointer_move(Point::new(10.0, 10.0), 0.5);
        c.on_pointer_up(Point::new(10.0, 10.0));

        // Stroke committed as a path layer; mode stays pencil for the next one
        assert_eq!(*c.mode(), CanvasMode::Pencil);
        c.session().with_document(|doc| {
            assert_eq!(doc.len(), 1);
            let layer = doc.layers_ordered().next().unwrap();
            assert_eq!(layer.layer_type(), LayerType::Path);
            assert_eq!(layer.points().unwrap().len(), 3);
        });
        assert!(c.session().presence().pencil_draft.is_none());
    }

    #[test]
    fn test_pencil_ignores_hover_moves() {
        let mut c = controller();
        c.set_tool(Tool::Pencil);
        // Move without pressing: no draft accumulates
        c.on_pointer_move(Point::new(10.0, 10.0), 0.5);
        assert!(c.session().presence().pencil_draft.is_none());
    }

    #[test]
    fn test_pencil_suppresses_layer_selection() {
        let mut c = controller();
        let id = insert_rect(&mut c, 0.0, 0.0);
        c.set_tool(Tool::Pencil);
        c.on_layer_pointer_down(id, Point::new(50.0, 50.0));
        assert!(c.session().selection().is_empty());
        assert_eq!(*c.mode(), CanvasMode::Pencil);
    }

    #[test]
    fn test_insert_tool_places_layer_on_pointer_up() {
        let mut c = controller();
        c.set_tool(Tool::Note);

        // Down is ignored in inserting mode
        c.on_pointer_down(Point::new(40.0, 60.0), 1.0);
        assert!(matches!(c.mode(), CanvasMode::Inserting { .. }));

        c.on_pointer_up(Point::new(40.0, 60.0));
        assert_eq!(*c.mode(), CanvasMode::None);

        let selection = c.session().selection();
        assert_eq!(selection.len(), 1);
        c.session().with_document(|doc| {
            let layer = doc.get(selection[0]).unwrap();
            assert_eq!(layer.layer_type(), LayerType::Note);
            assert_eq!(layer.position(), Point::new(40.0, 60.0));
        });
    }

    #[test]
    fn test_insert_uses_last_used_color() {
        let mut c = controller();
        c.set_fill(Color::white());
        c.set_tool(Tool::Rectangle);
        c.on_pointer_down(Point::new(0.0, 0.0), 1.0);
        c.on_pointer_up(Point::new(0.0, 0.0));

        let selection = c.session().selection();
        c.session().with_document(|doc| {
            assert_eq!(doc.get(selection[0]).unwrap().fill(), Some(Color::white()));
        });
    }

    #[test]
    fn test_camera_pan_offsets_insert_position() {
        let mut c = controller();
        c.camera.pan(Vec2::new(100.0, 50.0));
        c.set_tool(Tool::Ellipse);
        c.on_pointer_up(Point::new(120.0, 70.0));

        let selection = c.session().selection();
        c.session().with_document(|doc| {
            assert_eq!(
                doc.get(selection[0]).unwrap().position(),
                Point::new(20.0, 20.0)
            );
        });
    }

    #[test]
    fn test_pointer_leave_clears_cursor() {
        let mut c = controller();
        c.on_pointer_move(Point::new(10.0, 10.0), 1.0);
        assert!(c.session().presence().cursor.is_some());
        c.on_pointer_leave();
        assert!(c.session().presence().cursor.is_none());
    }

    #[test]
    fn test_cancel_gesture_resumes_history() {
        let mut c = controller();
        let id = insert_rect(&mut c, 0.0, 0.0);

        c.on_layer_pointer_down(id, Point::new(50.0, 50.0));
        c.cancel_gesture();
        assert_eq!(*c.mode(), CanvasMode::None);

        // History must be active again: new edits undo individually
        let second = insert_rect(&mut c, 200.0, 0.0);
        assert!(c.session_mut().undo());
        c.session().with_document(|doc| {
            assert!(!doc.contains(second));
            assert!(doc.contains(id));
        });
    }

    #[test]
    fn test_undo_shortcut_bypasses_state_machine() {
        let mut c = controller();
        let id = insert_rect(&mut c, 0.0, 0.0);

        let ctrl = Modifiers {
            ctrl: true,
            ..Default::default()
        };
        assert!(c.on_key_down("z", ctrl));
        c.session().with_document(|doc| assert!(!doc.contains(id)));

        let ctrl_shift = Modifiers {
            ctrl: true,
            shift: true,
            ..Default::default()
        };
        assert!(c.on_key_down("z", ctrl_shift));
        c.session().with_document(|doc| assert!(doc.contains(id)));

        // Plain keys are not handled
        assert!(!c.on_key_down("z", Modifiers::default()));
        assert!(!c.on_key_down("a", ctrl));
    }

    #[test]
    fn test_delete_selected_is_undoable() {
        let mut c = controller();
        let id = insert_rect(&mut c, 0.0, 0.0);
        c.session_mut().mutate(|txn| txn.set_selection(vec![id], true));

        c.delete_selected();
        c.session().with_document(|doc| assert!(doc.is_empty()));
        assert!(c.session().selection().is_empty());

        assert!(c.session_mut().undo());
        c.session().with_document(|doc| assert!(doc.contains(id)));
        assert_eq!(c.session().selection(), vec![id]);
    }
}
