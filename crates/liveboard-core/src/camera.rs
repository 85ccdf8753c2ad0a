//! Camera module for the connection-local view transform.

use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};

/// Camera manages the pan offset for the canvas.
///
/// The camera is owned by one connection and never broadcast; every
/// pointer event is translated into canvas coordinates through it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Camera {
    /// Current translation offset (pan).
    pub offset: Vec2,
}

impl Camera {
    /// Create a camera at the origin.
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert a raw pointer position to canvas coordinates.
    pub fn screen_to_world(&self, screen_point: Point) -> Point {
        screen_point - self.offset
    }

    /// Convert a canvas point back to screen coordinates.
    pub fn world_to_screen(&self, world_point: Point) -> Point {
        world_point + self.offset
    }

    /// Pan the camera by a delta in screen coordinates.
    pub fn pan(&mut self, delta: Vec2) {
        self.offset += delta;
    }

    /// Reset the camera to the origin.
    pub fn reset(&mut self) {
        self.offset = Vec2::ZERO;
    }
}
