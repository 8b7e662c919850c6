//! Geometry primitives : 2D vectors, axis-aligned rectangles and a finite segment intersection test.

/// A pair of coordinates, used either as a position, a displacement, or a direction.
///
/// When used as the ball's direction during play, both components stay confined to {-1, 0, 1}. The
/// engine never re-normalizes a direction : the movement speed scales the raw components directly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vector2 {
    pub x: f64,
    pub y: f64,
}

impl Vector2 {
    pub fn new(x: f64, y: f64) -> Vector2 {
        Vector2 { x, y }
    }
}

/// Axis-aligned rectangle anchored at its top-left corner. Corners are derived, not stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Rect {
        Rect {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> Vector2 {
        Vector2::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Move the rectangle so that its center lands on the given point.
    pub fn set_center(&mut self, center: Vector2) {
        self.x = center.x - self.width / 2.0;
        self.y = center.y - self.height / 2.0;
    }
}

/// Label for the face of a rectangle or wall that a segment hit. The intersection routine itself is
/// side-agnostic : this is a caller-supplied tag carried through for the reflection logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeSide {
    Top,
    Bottom,
    Left,
    Right,
}

/// Intersection of the finite segment `p1 -> p2` with the finite segment `p3 -> p4`, using the
/// standard 2x2 determinant method.
///
/// Returns [`None`] when the segments are parallel (zero denominator) or when either intersection
/// parameter falls outside `[0, 1]` - this is a segment test, not a line test.
pub fn segment_intersect(
    p1: Vector2,
    p2: Vector2,
    p3: Vector2,
    p4: Vector2,
    side: EdgeSide,
) -> Option<(Vector2, EdgeSide)> {
    let denom = (p4.y - p3.y) * (p2.x - p1.x) - (p4.x - p3.x) * (p2.y - p1.y);
    if denom == 0.0 {
        return None;
    }
    let t1 = ((p4.x - p3.x) * (p1.y - p3.y) - (p4.y - p3.y) * (p1.x - p3.x)) / denom;
    let t2 = ((p2.x - p1.x) * (p1.y - p3.y) - (p2.y - p1.y) * (p1.x - p3.x)) / denom;
    if !(0.0..=1.0).contains(&t1) || !(0.0..=1.0).contains(&t2) {
        return None;
    }
    let intersection = Vector2::new(p1.x + t1 * (p2.x - p1.x), p1.y + t1 * (p2.y - p1.y));
    Some((intersection, side))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BIAS: f64 = 1.0e-9;

    #[test]
    fn crossing_segments_intersect() {
        let (point, side) = segment_intersect(
            Vector2::new(0.0, 0.0),
            Vector2::new(10.0, 10.0),
            Vector2::new(0.0, 10.0),
            Vector2::new(10.0, 0.0),
            EdgeSide::Top,
        )
        .unwrap();
        assert!((point.x - 5.0).abs() < BIAS);
        assert!((point.y - 5.0).abs() < BIAS);
        assert_eq!(side, EdgeSide::Top);
    }

    #[test]
    fn parallel_segments_do_not_intersect() {
        let result = segment_intersect(
            Vector2::new(0.0, 0.0),
            Vector2::new(10.0, 0.0),
            Vector2::new(0.0, 1.0),
            Vector2::new(10.0, 1.0),
            EdgeSide::Top,
        );
        assert_eq!(result, None);
    }

    #[test]
    fn lines_crossing_outside_the_segments_do_not_intersect() {
        // The infinite lines meet at (15, 15), beyond both segment ends.
        let result = segment_intersect(
            Vector2::new(0.0, 0.0),
            Vector2::new(10.0, 10.0),
            Vector2::new(20.0, 10.0),
            Vector2::new(10.0, 20.0),
            EdgeSide::Left,
        );
        assert_eq!(result, None);
    }

    #[test]
    fn side_tag_is_passed_through_unchanged() {
        for tag in [
            EdgeSide::Top,
            EdgeSide::Bottom,
            EdgeSide::Left,
            EdgeSide::Right,
        ] {
            let (_, side) = segment_intersect(
                Vector2::new(-1.0, -1.0),
                Vector2::new(1.0, 1.0),
                Vector2::new(-1.0, 1.0),
                Vector2::new(1.0, -1.0),
                tag,
            )
            .unwrap();
            assert_eq!(side, tag);
        }
    }

    #[test]
    fn rect_center_round_trips() {
        let mut rect = Rect::new(0.0, 0.0, 30.0, 30.0);
        rect.set_center(Vector2::new(512.0, 384.0));
        assert_eq!(rect.x, 497.0);
        assert_eq!(rect.y, 369.0);
        assert_eq!(rect.center(), Vector2::new(512.0, 384.0));
    }
}
