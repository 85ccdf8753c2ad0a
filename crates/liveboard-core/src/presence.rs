//! Ephemeral per-connection presence state.

use crate::color::Color;
use crate::layer::{LayerId, PathPoint};
use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Ephemeral state of one live connection, broadcast to peers but never
/// part of the durable document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Presence {
    /// Last known pointer position; absent when the pointer left the canvas.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<Point>,
    /// Layers currently selected by this connection. The first element is
    /// the primary selection (e.g. the resize target).
    pub selection: Vec<LayerId>,
    /// In-progress freehand stroke, cleared on commit or cancel.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pencil_draft: Option<Vec<PathPoint>>,
    /// Color of the in-progress stroke, snapshotted at stroke start so a
    /// mid-stroke color change does not corrupt the draft.
    pub pen_color: Color,
}

impl Default for Presence {
    fn default() -> Self {
        Self {
            cursor: None,
            selection: Vec::new(),
            pencil_draft: None,
            pen_color: Color::black(),
        }
    }
}

impl Presence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update the cursor. Returns false when nothing changed.
    pub(crate) fn set_cursor(&mut self, cursor: Option<Point>) -> bool {
        if self.cursor == cursor {
            return false;
        }
        self.cursor = cursor;
        true
    }

    /// Replace the selection, returning the previous one.
    /// Returns `None` when the selection is unchanged (in particular,
    /// clearing an already empty selection stays silent).
    pub(crate) fn set_selection(&mut self, ids: Vec<LayerId>) -> Option<Vec<LayerId>> {
        if self.selection == ids {
            return None;
        }
        Some(std::mem::replace(&mut self.selection, ids))
    }

    /// Begin a stroke at `point`, snapshotting the pen color.
    pub(crate) fn start_draft(&mut self, point: Point, pressure: f64, color: Color) {
        self.pencil_draft = Some(vec![PathPoint::new(point.x, point.y, pressure)]);
        self.pen_color = color;
    }

    /// Append a sample to the stroke. No-op when no draft is active, or
    /// when the new point equals the only existing point (avoids
    /// zero-length draft churn).
    pub(crate) fn append_to_draft(&mut self, point: Point, pressure: f64) -> bool {
        let Some(draft) = self.pencil_draft.as_mut() else {
            return false;
        };
        if draft.len() == 1 && draft[0].x == point.x && draft[0].y == point.y {
            return false;
        }
        draft.push(PathPoint::new(point.x, point.y, pressure));
        true
    }

    /// Take the draft, leaving none in progress.
    pub(crate) fn take_draft(&mut self) -> Option<Vec<PathPoint>> {
        self.pencil_draft.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_cursor_change_detection() {
        let mut presence = Presence::new();
        assert!(presence.set_cursor(Some(Point::new(1.0, 2.0))));
        assert!(!presence.set_cursor(Some(Point::new(1.0, 2.0))));
        assert!(presence.set_cursor(None));
        assert!(!presence.set_cursor(None));
    }

    #[test]
    fn test_clear_empty_selection_is_silent() {
        let mut presence = Presence::new();
        assert!(presence.set_selection(Vec::new()).is_none());

        let id = Uuid::new_v4();
        assert_eq!(presence.set_selection(vec![id]), Some(Vec::new()));
        assert_eq!(presence.set_selection(Vec::new()), Some(vec![id]));
    }

    #[test]
    fn test_draft_requires_start() {
        let mut presence = Presence::new();
        assert!(!presence.append_to_draft(Point::new(1.0, 1.0), 0.5));
        assert!(presence.pencil_draft.is_none());
    }

    #[test]
    fn test_draft_suppresses_duplicate_first_point() {
        let mut presence = Presence::new();
        presence.start_draft(Point::new(5.0, 5.0), 0.5, Color::black());
        assert!(!presence.append_to_draft(Point::new(5.0, 5.0), 0.5));
        assert_eq!(presence.pencil_draft.as_ref().unwrap().len(), 1);

        assert!(presence.append_to_draft(Point::new(6.0, 5.0), 0.5));
        // Only the single-point case is deduplicated
        assert!(presence.append_to_draft(Point::new(6.0, 5.0), 0.5));
        assert_eq!(presence.pencil_draft.as_ref().unwrap().len(), 3);
    }

    #[test]
    fn test_pen_color_snapshot() {
        let mut presence = Presence::new();
        presence.start_draft(Point::ZERO, 1.0, Color::white());
        assert_eq!(presence.pen_color, Color::white());
        let draft = presence.take_draft().unwrap();
        assert_eq!(draft.len(), 1);
        assert!(presence.pencil_draft.is_none());
    }
}
