//! Board document: ordered layers and capacity-bounded CRUD.

use crate::color::Color;
use crate::geometry;
use crate::layer::{Layer, LayerId, LayerPatch, LayerType, PathLayer, PathPoint};
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Maximum number of layers a board can hold. Inserts beyond the cap are
/// rejected, not truncated.
pub const MAX_LAYERS: usize = 100;

/// The shared board document.
///
/// `layer_order` defines paint order (back to front); every id in it has
/// exactly one entry in `layers` and vice versa. Mutators are crate-private
/// so that all writes flow through a session transaction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoardDocument {
    layer_order: Vec<LayerId>,
    layers: HashMap<LayerId, Layer>,
}

impl BoardDocument {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn contains(&self, id: LayerId) -> bool {
        self.layers.contains_key(&id)
    }

    /// Layer ids in paint order (back to front).
    pub fn layer_ids(&self) -> &[LayerId] {
        &self.layer_order
    }

    pub fn get(&self, id: LayerId) -> Option<&Layer> {
        self.layers.get(&id)
    }

    /// Layers in paint order.
    pub fn layers_ordered(&self) -> impl Iterator<Item = &Layer> {
        self.layer_order.iter().filter_map(|id| self.layers.get(id))
    }

    /// Topmost layer hit by a canvas point, if any.
    pub fn layer_at_point(&self, point: Point, tolerance: f64) -> Option<LayerId> {
        self.layer_order
            .iter()
            .rev()
            .find(|&id| {
                self.layers
                    .get(id)
                    .is_some_and(|layer| layer.hit_test(point, tolerance))
            })
            .copied()
    }

    /// Ids of layers overlapping the drag rectangle, in paint order.
    pub fn layers_in_rect(&self, origin: Point, current: Point) -> Vec<LayerId> {
        geometry::find_intersecting_layers_with_rectangle(
            &self.layer_order,
            &self.layers,
            origin,
            current,
        )
    }

    /// Union of the bounding boxes of the given layers. Absent ids are
    /// skipped; `None` when nothing is left.
    pub fn bounds_of(&self, ids: &[LayerId]) -> Option<Rect> {
        let mut result: Option<Rect> = None;
        for id in ids {
            if let Some(layer) = self.layers.get(id) {
                let bounds = layer.bounds();
                result = Some(match result {
                    Some(r) => r.union(bounds),
                    None => bounds,
                });
            }
        }
        result
    }

    /// Serialize the document to JSON (session bootstrap snapshot).
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize a document from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Whether order and key-set agree with no duplicates.
    pub fn is_consistent(&self) -> bool {
        if self.layer_order.len() != self.layers.len() || self.layers.len() > MAX_LAYERS {
            return false;
        }
        let mut seen = std::collections::HashSet::new();
        self.layer_order
            .iter()
            .all(|id| seen.insert(*id) && self.layers.contains_key(id))
    }

    // --- Mutators (session transactions only) ---

    /// Create and append a layer with the default extent.
    /// Returns `None` when the board is full or the kind is `Path`.
    pub(crate) fn insert(
        &mut self,
        layer_type: LayerType,
        position: Point,
        fill: Option<Color>,
    ) -> Option<LayerId> {
        if self.layers.len() >= MAX_LAYERS {
            log::debug!("layer insert rejected: board at capacity");
            return None;
        }
        let layer = Layer::with_default_size(layer_type, position, fill)?;
        let id = layer.id();
        self.layer_order.push(id);
        self.layers.insert(id, layer);
        Some(id)
    }

    /// Create and append a path layer from stroke samples.
    /// Returns `None` when the board is full or the stroke has fewer than
    /// 2 samples.
    pub(crate) fn insert_path(
        &mut self,
        points: &[PathPoint],
        fill: Option<Color>,
    ) -> Option<LayerId> {
        if self.layers.len() >= MAX_LAYERS {
            log::debug!("path insert rejected: board at capacity");
            return None;
        }
        let layer = Layer::Path(PathLayer::from_draft(points, fill)?);
        let id = layer.id();
        self.layer_order.push(id);
        self.layers.insert(id, layer);
        Some(id)
    }

    /// Re-insert a previously removed layer at its old position in the
    /// paint order. Used by undo replay; no-op when the board is full or
    /// the id is already live again.
    pub(crate) fn restore(&mut self, index: usize, layer: Layer) -> bool {
        if self.layers.len() >= MAX_LAYERS || self.layers.contains_key(&layer.id()) {
            return false;
        }
        let index = index.min(self.layer_order.len());
        self.layer_order.insert(index, layer.id());
        self.layers.insert(layer.id(), layer);
        true
    }

    /// Merge a partial update into a layer. Returns the inverse patch, or
    /// `None` when the id is absent (deleted by a peer) and nothing happened.
    pub(crate) fn update(&mut self, id: LayerId, patch: &LayerPatch) -> Option<LayerPatch> {
        self.layers.get_mut(&id).map(|layer| layer.apply(patch))
    }

    /// Remove a layer, returning its paint-order index and record so the
    /// deletion can be inverted. Absent ids are ignored.
    pub(crate) fn remove(&mut self, id: LayerId) -> Option<(usize, Layer)> {
        let layer = self.layers.remove(&id)?;
        let index = self
            .layer_order
            .iter()
            .position(|&other| other == id)
            .unwrap_or(self.layer_order.len());
        if index < self.layer_order.len() {
            self.layer_order.remove(index);
        }
        Some((index, layer))
    }

    /// Offset the named layers uniformly. Returns the ids actually moved.
    pub(crate) fn translate(&mut self, ids: &[LayerId], dx: f64, dy: f64) -> Vec<LayerId> {
        let mut moved = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(layer) = self.layers.get_mut(id) {
                layer.translate(dx, dy);
                moved.push(*id);
            }
        }
        moved
    }

    /// Move a layer to a new paint-order index (clamped). Returns its
    /// previous index, or `None` when the id is absent.
    pub(crate) fn reorder(&mut self, id: LayerId, index: usize) -> Option<usize> {
        let from = self.layer_order.iter().position(|&other| other == id)?;
        self.layer_order.remove(from);
        let to = index.min(self.layer_order.len());
        self.layer_order.insert(to, id);
        Some(from)
    }
}
