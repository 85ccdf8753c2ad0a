//! Resize math and selection-rectangle intersection.

use crate::layer::{Layer, LayerId};
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Corner or edge of a selection box being dragged during a resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Top,
    Bottom,
    Left,
    Right,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// Recompute bounds while a resize handle is dragged to `point`.
///
/// Dragging a handle past the opposite edge is allowed; the result is
/// normalized so width and height are always non-negative.
pub fn resize_bounds(initial: Rect, corner: Side, point: Point) -> Rect {
    let (mut x0, mut y0, mut x1, mut y1) = (initial.x0, initial.y0, initial.x1, initial.y1);
    match corner {
        Side::Top => y0 = point.y,
        Side::Bottom => y1 = point.y,
        Side::Left => x0 = point.x,
        Side::Right => x1 = point.x,
        Side::TopLeft => {
            x0 = point.x;
            y0 = point.y;
        }
        Side::TopRight => {
            x1 = point.x;
            y0 = point.y;
        }
        Side::BottomLeft => {
            x0 = point.x;
            y1 = point.y;
        }
        Side::BottomRight => {
            x1 = point.x;
            y1 = point.y;
        }
    }
    Rect::from_points(Point::new(x0, y0), Point::new(x1, y1))
}

/// Normalized rectangle spanned by a drag, whichever direction it went.
pub fn drag_rect(origin: Point, current: Point) -> Rect {
    Rect::from_points(origin, current)
}

/// Inclusive axis-aligned overlap test: touching edges count.
fn rects_overlap(a: Rect, b: Rect) -> bool {
    a.x0 <= b.x1 && a.x1 >= b.x0 && a.y0 <= b.y1 && a.y1 >= b.y0
}

/// Ids of layers whose bounding box overlaps the drag rectangle.
///
/// Returned in the iteration order of `layer_ids`, so results are stable
/// across calls with the same document order.
pub fn find_intersecting_layers_with_rectangle(
    layer_ids: &[LayerId],
    layers: &HashMap<LayerId, Layer>,
    origin: Point,
    current: Point,
) -> Vec<LayerId> {
    let rect = drag_rect(origin, current);
    layer_ids
        .iter()
        .filter(|&id| {
            layers
                .get(id)
                .is_some_and(|layer| rects_overlap(rect, layer.bounds()))
        })
        .copied()
        .collect()
}
