//! Layer definitions for the board document.

use crate::color::Color;
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for layers. Assigned at creation, never reused.
pub type LayerId = Uuid;

/// Width and height given to newly inserted non-path layers.
pub const DEFAULT_LAYER_SIZE: f64 = 100.0;

/// Kind of layer. Immutable after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerType {
    Rectangle,
    Ellipse,
    Text,
    Note,
    Path,
}

/// One sample of a freehand stroke, relative to the path's own origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathPoint {
    pub x: f64,
    pub y: f64,
    pub pressure: f64,
}

impl PathPoint {
    pub fn new(x: f64, y: f64, pressure: f64) -> Self {
        Self { x, y, pressure }
    }
}

/// A rectangle layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RectangleLayer {
    pub id: LayerId,
    pub position: Point,
    pub width: f64,
    pub height: f64,
    pub fill: Option<Color>,
}

/// An ellipse layer, stored by its bounding box like every other layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EllipseLayer {
    pub id: LayerId,
    pub position: Point,
    pub width: f64,
    pub height: f64,
    pub fill: Option<Color>,
}

/// A text layer with editable content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLayer {
    pub id: LayerId,
    pub position: Point,
    pub width: f64,
    pub height: f64,
    pub fill: Option<Color>,
    pub value: String,
}

/// A sticky note layer with editable content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteLayer {
    pub id: LayerId,
    pub position: Point,
    pub width: f64,
    pub height: f64,
    pub fill: Option<Color>,
    pub value: String,
}

/// A freehand path layer. Bounds are the tight bounding box of the points;
/// points are stored relative to that box's origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathLayer {
    pub id: LayerId,
    pub position: Point,
    pub width: f64,
    pub height: f64,
    pub fill: Option<Color>,
    pub points: Vec<PathPoint>,
}

impl PathLayer {
    /// Build a path layer from an in-progress stroke.
    ///
    /// Returns `None` for strokes with fewer than 2 samples; a path needs
    /// at least two points to be visible. Input samples are in canvas
    /// coordinates and are rebased onto the tight bounding box origin.
    pub fn from_draft(points: &[PathPoint], fill: Option<Color>) -> Option<Self> {
        if points.len() < 2 {
            return None;
        }

        let mut min_x = f64::MAX;
        let mut min_y = f64::MAX;
        let mut max_x = f64::MIN;
        let mut max_y = f64::MIN;
        for point in points {
            min_x = min_x.min(point.x);
            min_y = min_y.min(point.y);
            max_x = max_x.max(point.x);
            max_y = max_y.max(point.y);
        }

        let rebased = points
            .iter()
            .map(|p| PathPoint::new(p.x - min_x, p.y - min_y, p.pressure))
            .collect();

        Some(Self {
            id: Uuid::new_v4(),
            position: Point::new(min_x, min_y),
            width: max_x - min_x,
            height: max_y - min_y,
            fill,
            points: rebased,
        })
    }
}

/// Partial update merged into an existing layer.
///
/// `value` only applies to text and note layers and is ignored elsewhere.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill: Option<Color>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl LayerPatch {
    /// Patch setting position and extents from a bounding rectangle.
    pub fn from_bounds(bounds: Rect) -> Self {
        Self {
            x: Some(bounds.x0),
            y: Some(bounds.y0),
            width: Some(bounds.width()),
            height: Some(bounds.height()),
            ..Default::default()
        }
    }

    /// Patch setting only the fill color.
    pub fn fill(color: Color) -> Self {
        Self {
            fill: Some(color),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Enum wrapper over all layer kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Layer {
    Rectangle(RectangleLayer),
    Ellipse(EllipseLayer),
    Text(TextLayer),
    Note(NoteLayer),
    Path(PathLayer),
}

impl Layer {
    /// Create a layer of the given kind at `position` with the default
    /// 100x100 extent. Path layers are built from strokes instead; see
    /// [`PathLayer::from_draft`].
    pub fn with_default_size(
        layer_type: LayerType,
        position: Point,
        fill: Option<Color>,
    ) -> Option<Self> {
        let id = Uuid::new_v4();
        let (width, height) = (DEFAULT_LAYER_SIZE, DEFAULT_LAYER_SIZE);
        match layer_type {
            LayerType::Rectangle => Some(Layer::Rectangle(RectangleLayer {
                id,
                position,
                width,
                height,
                fill,
            })),
            LayerType::Ellipse => Some(Layer::Ellipse(EllipseLayer {
                id,
                position,
                width,
                height,
                fill,
            })),
            LayerType::Text => Some(Layer::Text(TextLayer {
                id,
                position,
                width,
                height,
                fill,
                value: String::new(),
            })),
            LayerType::Note => Some(Layer::Note(NoteLayer {
                id,
                position,
                width,
                height,
                fill,
                value: String::new(),
            })),
            LayerType::Path => None,
        }
    }

    pub fn id(&self) -> LayerId {
        match self {
            Layer::Rectangle(l) => l.id,
            Layer::Ellipse(l) => l.id,
            Layer::Text(l) => l.id,
            Layer::Note(l) => l.id,
            Layer::Path(l) => l.id,
        }
    }

    pub fn layer_type(&self) -> LayerType {
        match self {
            Layer::Rectangle(_) => LayerType::Rectangle,
            Layer::Ellipse(_) => LayerType::Ellipse,
            Layer::Text(_) => LayerType::Text,
            Layer::Note(_) => LayerType::Note,
            Layer::Path(_) => LayerType::Path,
        }
    }

    pub fn position(&self) -> Point {
        match self {
            Layer::Rectangle(l) => l.position,
            Layer::Ellipse(l) => l.position,
            Layer::Text(l) => l.position,
            Layer::Note(l) => l.position,
            Layer::Path(l) => l.position,
        }
    }

    pub fn fill(&self) -> Option<Color> {
        match self {
            Layer::Rectangle(l) => l.fill,
            Layer::Ellipse(l) => l.fill,
            Layer::Text(l) => l.fill,
            Layer::Note(l) => l.fill,
            Layer::Path(l) => l.fill,
        }
    }

    /// Text content for text and note layers.
    pub fn value(&self) -> Option<&str> {
        match self {
            Layer::Text(l) => Some(&l.value),
            Layer::Note(l) => Some(&l.value),
            _ => None,
        }
    }

    /// Stroke samples for path layers.
    pub fn points(&self) -> Option<&[PathPoint]> {
        match self {
            Layer::Path(l) => Some(&l.points),
            _ => None,
        }
    }

    /// Bounding box in canvas coordinates.
    pub fn bounds(&self) -> Rect {
        let (position, width, height) = match self {
            Layer::Rectangle(l) => (l.position, l.width, l.height),
            Layer::Ellipse(l) => (l.position, l.width, l.height),
            Layer::Text(l) => (l.position, l.width, l.height),
            Layer::Note(l) => (l.position, l.width, l.height),
            Layer::Path(l) => (l.position, l.width, l.height),
        };
        Rect::new(position.x, position.y, position.x + width, position.y + height)
    }

    /// Offset the layer position. Applies uniformly to every kind.
    pub(crate) fn translate(&mut self, dx: f64, dy: f64) {
        let position = match self {
            Layer::Rectangle(l) => &mut l.position,
            Layer::Ellipse(l) => &mut l.position,
            Layer::Text(l) => &mut l.position,
            Layer::Note(l) => &mut l.position,
            Layer::Path(l) => &mut l.position,
        };
        position.x += dx;
        position.y += dy;
    }

    /// Merge a partial update into the layer.
    ///
    /// Returns the inverse patch holding the previous values of exactly
    /// the fields that changed, so the edit can be replayed backwards.
    pub(crate) fn apply(&mut self, patch: &LayerPatch) -> LayerPatch {
        let mut inverse = LayerPatch::default();

        {
            let (position, width, height, fill) = match self {
                Layer::Rectangle(l) => (&mut l.position, &mut l.width, &mut l.height, &mut l.fill),
                Layer::Ellipse(l) => (&mut l.position, &mut l.width, &mut l.height, &mut l.fill),
                Layer::Text(l) => (&mut l.position, &mut l.width, &mut l.height, &mut l.fill),
                Layer::Note(l) => (&mut l.position, &mut l.width, &mut l.height, &mut l.fill),
                Layer::Path(l) => (&mut l.position, &mut l.width, &mut l.height, &mut l.fill),
            };

            if let Some(x) = patch.x {
                inverse.x = Some(position.x);
                position.x = x;
            }
            if let Some(y) = patch.y {
                inverse.y = Some(position.y);
                position.y = y;
            }
            if let Some(w) = patch.width {
                inverse.width = Some(*width);
                *width = w.max(0.0);
            }
            if let Some(h) = patch.height {
                inverse.height = Some(*height);
                *height = h.max(0.0);
            }
            if let Some(new_fill) = patch.fill {
                // A fill can only be replaced, never removed, so filling a
                // bare layer has an empty inverse.
                inverse.fill = *fill;
                *fill = Some(new_fill);
            }
        }

        if let Some(value) = &patch.value {
            let slot = match self {
                Layer::Text(l) => Some(&mut l.value),
                Layer::Note(l) => Some(&mut l.value),
                _ => None,
            };
            if let Some(slot) = slot {
                inverse.value = Some(std::mem::replace(slot, value.clone()));
            }
        }

        inverse
    }

    /// Whether a canvas point hits this layer.
    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        match self {
            Layer::Rectangle(_) | Layer::Text(_) | Layer::Note(_) => self
                .bounds()
                .inflate(tolerance, tolerance)
                .contains(point),
            Layer::Ellipse(l) => {
                let rx = l.width / 2.0 + tolerance;
                let ry = l.height / 2.0 + tolerance;
                if rx <= 0.0 || ry <= 0.0 {
                    return false;
                }
                let cx = l.position.x + l.width / 2.0;
                let cy = l.position.y + l.height / 2.0;
                let nx = (point.x - cx) / rx;
                let ny = (point.y - cy) / ry;
                nx * nx + ny * ny <= 1.0
            }
            Layer::Path(l) => {
                let local = Point::new(point.x - l.position.x, point.y - l.position.y);
                l.points
                    .windows(2)
                    .map(|w| {
                        point_to_segment_dist(
                            local,
                            Point::new(w[0].x, w[0].y),
                            Point::new(w[1].x, w[1].y),
                        )
                    })
                    .fold(f64::INFINITY, f64::min)
                    <= tolerance.max(4.0)
            }
        }
    }
}

/// Distance from a point to a line segment (a to b).
fn point_to_segment_dist(point: Point, a: Point, b: Point) -> f64 {
    let seg = kurbo::Vec2::new(b.x - a.x, b.y - a.y);
    let pv = kurbo::Vec2::new(point.x - a.x, point.y - a.y);
    let len_sq = seg.hypot2();
    if len_sq < f64::EPSILON {
        return pv.hypot();
    }
    let t = (pv.dot(seg) / len_sq).clamp(0.0, 1.0);
    let proj = Point::new(a.x + t * seg.x, a.y + t * seg.y);
    ((point.x - proj.x).powi(2) + (point.y - proj.y).powi(2)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_size_insert() {
        let layer =
            Layer::with_default_size(LayerType::Note, Point::new(10.0, 20.0), None).unwrap();
        let bounds = layer.bounds();
        assert!((bounds.width() - DEFAULT_LAYER_SIZE).abs() < f64::EPSILON);
        assert!((bounds.height() - DEFAULT_LAYER_SIZE).abs() < f64::EPSILON);
        assert_eq!(layer.value(), Some(""));
    }

    #[test]
    fn test_path_needs_two_points() {
        let one = [PathPoint::new(5.0, 5.0, 1.0)];
        assert!(PathLayer::from_draft(&one, None).is_none());
    }

    #[test]
    fn test_path_from_draft_rebases_points() {
        let stroke = [
            PathPoint::new(10.0, 30.0, 0.5),
            PathPoint::new(40.0, 10.0, 0.6),
            PathPoint::new(25.0, 50.0, 0.7),
        ];
        let path = PathLayer::from_draft(&stroke, Some(Color::black())).unwrap();
        assert!((path.position.x - 10.0).abs() < f64::EPSILON);
        assert!((path.position.y - 10.0).abs() < f64::EPSILON);
        assert!((path.width - 30.0).abs() < f64::EPSILON);
        assert!((path.height - 40.0).abs() < f64::EPSILON);
        assert_eq!(path.points.len(), 3);
        // First sample rebased to (0, 20)
        assert!((path.points[0].x).abs() < f64::EPSILON);
        assert!((path.points[0].y - 20.0).abs() < f64::EPSILON);
        assert!((path.points[0].pressure - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_patch_apply_and_inverse() {
        let mut layer =
            Layer::with_default_size(LayerType::Rectangle, Point::new(0.0, 0.0), None).unwrap();
        let patch = LayerPatch {
            x: Some(50.0),
            width: Some(200.0),
            fill: Some(Color::white()),
            ..Default::default()
        };
        let inverse = layer.apply(&patch);

        assert!((layer.position().x - 50.0).abs() < f64::EPSILON);
        assert!((layer.bounds().width() - 200.0).abs() < f64::EPSILON);
        assert_eq!(layer.fill(), Some(Color::white()));

        assert_eq!(inverse.x, Some(0.0));
        assert_eq!(inverse.width, Some(DEFAULT_LAYER_SIZE));
        assert!(inverse.y.is_none());

        layer.apply(&inverse);
        assert!((layer.position().x).abs() < f64::EPSILON);
        assert!((layer.bounds().width() - DEFAULT_LAYER_SIZE).abs() < f64::EPSILON);
    }

    #[test]
    fn test_patch_value_only_on_text_layers() {
        let mut rect =
            Layer::with_default_size(LayerType::Rectangle, Point::ZERO, None).unwrap();
        let patch = LayerPatch {
            value: Some("hello".into()),
            ..Default::default()
        };
        let inverse = rect.apply(&patch);
        assert!(inverse.is_empty());

        let mut text = Layer::with_default_size(LayerType::Text, Point::ZERO, None).unwrap();
        let inverse = text.apply(&patch);
        assert_eq!(text.value(), Some("hello"));
        assert_eq!(inverse.value.as_deref(), Some(""));
    }

    #[test]
    fn test_patch_clamps_negative_extent() {
        let mut layer =
            Layer::with_default_size(LayerType::Ellipse, Point::ZERO, None).unwrap();
        layer.apply(&LayerPatch {
            width: Some(-10.0),
            ..Default::default()
        });
        assert!(layer.bounds().width().abs() < f64::EPSILON);
    }

    #[test]
    fn test_ellipse_hit_test() {
        let layer =
            Layer::with_default_size(LayerType::Ellipse, Point::new(0.0, 0.0), None).unwrap();
        // Center hits, bounding-box corner does not
        assert!(layer.hit_test(Point::new(50.0, 50.0), 0.0));
        assert!(!layer.hit_test(Point::new(2.0, 2.0), 0.0));
    }

    #[test]
    fn test_path_hit_test() {
        let stroke = [PathPoint::new(0.0, 0.0, 1.0), PathPoint::new(100.0, 0.0, 1.0)];
        let layer = Layer::Path(PathLayer::from_draft(&stroke, None).unwrap());
        assert!(layer.hit_test(Point::new(50.0, 2.0), 4.0));
        assert!(!layer.hit_test(Point::new(50.0, 30.0), 4.0));
    }

    #[test]
    fn test_layer_json_shape() {
        let layer =
            Layer::with_default_size(LayerType::Rectangle, Point::new(1.0, 2.0), None).unwrap();
        let json = serde_json::to_value(&layer).unwrap();
        assert_eq!(json["type"], "rectangle");
        let back: Layer = serde_json::from_value(json).unwrap();
        assert_eq!(back, layer);
    }
}
