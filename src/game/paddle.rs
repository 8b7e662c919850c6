//! A player paddle : a rectangle that only ever moves vertically, clamped to the court.

use crate::game::geometry::Rect;

/// A paddle owned by exactly one match and one side. Its `shape.y` stays within
/// `[0, arena_height - shape.height]` at all times.
#[derive(Debug, Clone)]
pub struct Paddle {
    pub shape: Rect,
    pub y_vector: f64,
}

impl Paddle {
    pub fn new(shape: Rect, y_vector: f64) -> Paddle {
        Paddle { shape, y_vector }
    }

    /// Move one speed step up, pinning at the top wall.
    pub fn move_up(&mut self) {
        self.shape.y = f64::max(self.shape.y - self.y_vector, 0.0);
    }

    /// Move one speed step down, pinning at the bottom wall.
    pub fn move_down(&mut self, arena_height: f64) {
        self.shape.y = f64::min(self.shape.y + self.y_vector, arena_height - self.shape.height);
    }
}
