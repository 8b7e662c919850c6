//! Swept collision resolution between the ball's center path for one tick and the paddles or the
//! court walls.
//!
//! The resolver runs once per tick per ball, with a fixed priority order : the one candidate paddle
//! selected by the ball's horizontal direction, then the top/bottom wall selected by its vertical
//! direction, then a vertical-only fallback clamp. The first segment hit wins - there is no
//! sub-stepping across multiple collisions within one tick, and the remaining fraction of the
//! tick's movement past a bounce point is discarded.

use crate::game::ball::Ball;
use crate::game::geometry::{segment_intersect, EdgeSide, Vector2};
use crate::game::paddle::Paddle;

/// What the ball's path met during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Contact {
    /// The ball bounced off a face of the active paddle.
    Paddle(EdgeSide),
    /// The ball bounced off the top or bottom wall.
    Wall(EdgeSide),
    /// No swept segment produced a solution but the projected position left the court vertically :
    /// the vertical direction was flipped and the ball pinned flush against the violated wall.
    Clamp,
    /// Free movement, no collision this tick.
    None,
}

/// Advance the ball by one tick of movement, resolving at most one collision.
///
/// The horizontal axis is deliberately never clamped : a horizontal overshoot passes through so
/// that the scoring check can observe it.
pub fn resolve_ball_movement(
    ball: &mut Ball,
    l_paddle: &Paddle,
    r_paddle: &Paddle,
    arena_height: f64,
) -> Contact {
    let old_center = ball.center();
    let new_center = Vector2::new(
        old_center.x + ball.dir_vect.x * ball.movement_speed,
        old_center.y + ball.dir_vect.y * ball.movement_speed,
    );

    // The only paddle candidate is the one the ball is moving towards.
    let candidate = if ball.dir_vect.x < 0.0 {
        Some(l_paddle)
    } else if ball.dir_vect.x > 0.0 {
        Some(r_paddle)
    } else {
        None
    };
    if let Some(paddle) = candidate {
        if let Some((hit, side)) = paddle_hit(old_center, new_center, ball, paddle) {
            reflect(ball, side);
            ball.shape.set_center(hit);
            return Contact::Paddle(side);
        }
    }

    if let Some((hit, side)) = wall_hit(old_center, new_center, ball, arena_height) {
        reflect(ball, side);
        ball.shape.set_center(hit);
        return Contact::Wall(side);
    }

    // Fallback for degenerate sweeps (too fast, axis-aligned, or already past the wall line) :
    // clamp the vertical axis only.
    if new_center.y - ball.radius_px < 0.0 {
        ball.dir_vect.y = -ball.dir_vect.y;
        ball.shape.x = new_center.x - ball.radius_px;
        ball.shape.y = 0.0;
        return Contact::Clamp;
    }
    if new_center.y + ball.radius_px > arena_height {
        ball.dir_vect.y = -ball.dir_vect.y;
        ball.shape.x = new_center.x - ball.radius_px;
        ball.shape.y = arena_height - ball.shape.height;
        return Contact::Clamp;
    }

    ball.shape.set_center(new_center);
    Contact::None
}

/// Flip the direction component orthogonal to the hit side.
fn reflect(ball: &mut Ball, side: EdgeSide) {
    match side {
        EdgeSide::Left | EdgeSide::Right => ball.dir_vect.x = -ball.dir_vect.x,
        EdgeSide::Top | EdgeSide::Bottom => ball.dir_vect.y = -ball.dir_vect.y,
    }
}

/// Test the center path against the candidate paddle's faces, expanded outward by the ball radius
/// so the intersection point is directly the contact position of the center.
///
/// The face the ball is moving towards is tested first; if it misses, the top or bottom face
/// selected by the vertical direction sign is tested. At most one face is reported per tick.
fn paddle_hit(
    old_center: Vector2,
    new_center: Vector2,
    ball: &Ball,
    paddle: &Paddle,
) -> Option<(Vector2, EdgeSide)> {
    let radius = ball.radius_px;
    let pad = &paddle.shape;

    let (face_x, face_side) = if ball.dir_vect.x > 0.0 {
        (pad.x - radius, EdgeSide::Left)
    } else {
        (pad.x + pad.width + radius, EdgeSide::Right)
    };
    let face_top = Vector2::new(face_x, pad.y - radius);
    let face_bottom = Vector2::new(face_x, pad.y + pad.height + radius);
    if let Some(hit) = segment_intersect(old_center, new_center, face_top, face_bottom, face_side) {
        return Some(hit);
    }

    if ball.dir_vect.y == 0.0 {
        return None;
    }
    let (edge_y, edge_side) = if ball.dir_vect.y > 0.0 {
        (pad.y - radius, EdgeSide::Top)
    } else {
        (pad.y + pad.height + radius, EdgeSide::Bottom)
    };
    let edge_left = Vector2::new(pad.x - radius, edge_y);
    let edge_right = Vector2::new(pad.x + pad.width + radius, edge_y);
    segment_intersect(old_center, new_center, edge_left, edge_right, edge_side)
}

/// Test the center path against the top or bottom wall line, offset into the court by the ball
/// radius and spanning the swept horizontal range.
fn wall_hit(
    old_center: Vector2,
    new_center: Vector2,
    ball: &Ball,
    arena_height: f64,
) -> Option<(Vector2, EdgeSide)> {
    if ball.dir_vect.y == 0.0 {
        return None;
    }
    let (wall_y, wall_side) = if ball.dir_vect.y < 0.0 {
        (ball.radius_px, EdgeSide::Top)
    } else {
        (arena_height - ball.radius_px, EdgeSide::Bottom)
    };
    let wall_start = Vector2::new(f64::min(old_center.x, new_center.x) - 1.0, wall_y);
    let wall_end = Vector2::new(f64::max(old_center.x, new_center.x) + 1.0, wall_y);
    segment_intersect(old_center, new_center, wall_start, wall_end, wall_side)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::geometry::Rect;

    const ARENA_WIDTH: f64 = 1024.0;
    const ARENA_HEIGHT: f64 = 768.0;

    fn make_ball(center_x: f64, center_y: f64, dir_x: f64, dir_y: f64, speed: f64) -> Ball {
        let mut ball = Ball::new(speed, 12.0, 15.0);
        ball.shape.set_center(Vector2::new(center_x, center_y));
        ball.dir_vect = Vector2::new(dir_x, dir_y);
        ball
    }

    fn make_paddles() -> (Paddle, Paddle) {
        let y = (ARENA_HEIGHT - 150.0) / 2.0;
        (
            Paddle::new(Rect::new(50.0, y, 20.0, 150.0), 10.0),
            Paddle::new(Rect::new(ARENA_WIDTH - 50.0 - 20.0, y, 20.0, 150.0), 10.0),
        )
    }

    #[test]
    fn free_diagonal_movement_from_the_center() {
        let (l_paddle, r_paddle) = make_paddles();
        let mut ball = make_ball(512.0, 384.0, 1.0, 1.0, 4.0);
        let contact = resolve_ball_movement(&mut ball, &l_paddle, &r_paddle, ARENA_HEIGHT);
        assert_eq!(contact, Contact::None);
        assert_eq!(ball.center(), Vector2::new(516.0, 388.0));
        assert_eq!(ball.dir_vect, Vector2::new(1.0, 1.0));
    }

    #[test]
    fn top_wall_bounce_flips_only_the_vertical_component() {
        let (l_paddle, r_paddle) = make_paddles();
        let mut ball = make_ball(300.0, 17.0, 1.0, -1.0, 4.0);
        let contact = resolve_ball_movement(&mut ball, &l_paddle, &r_paddle, ARENA_HEIGHT);
        assert_eq!(contact, Contact::Wall(EdgeSide::Top));
        assert_eq!(ball.dir_vect, Vector2::new(1.0, 1.0));
        assert_eq!(ball.center().y, 15.0);
        assert_eq!(ball.shape.y, 0.0);
    }

    #[test]
    fn bottom_wall_bounce_repositions_at_the_contact_point() {
        let (l_paddle, r_paddle) = make_paddles();
        let mut ball = make_ball(300.0, ARENA_HEIGHT - 17.0, 1.0, 1.0, 4.0);
        let contact = resolve_ball_movement(&mut ball, &l_paddle, &r_paddle, ARENA_HEIGHT);
        assert_eq!(contact, Contact::Wall(EdgeSide::Bottom));
        assert_eq!(ball.dir_vect, Vector2::new(1.0, -1.0));
        assert_eq!(ball.center().y, ARENA_HEIGHT - 15.0);
        // The remaining movement past the bounce point is discarded, not slid.
        assert_eq!(ball.center().x, 302.0);
    }

    #[test]
    fn paddle_face_bounce_flips_only_the_horizontal_component() {
        let (l_paddle, r_paddle) = make_paddles();
        // Right paddle starts at x = 954; its radius-expanded left face sits at x = 939.
        let mut ball = make_ball(936.0, 384.0, 1.0, 0.0, 4.0);
        let contact = resolve_ball_movement(&mut ball, &l_paddle, &r_paddle, ARENA_HEIGHT);
        assert_eq!(contact, Contact::Paddle(EdgeSide::Left));
        assert_eq!(ball.dir_vect, Vector2::new(-1.0, 0.0));
        assert_eq!(ball.center(), Vector2::new(939.0, 384.0));
    }

    #[test]
    fn paddle_top_edge_bounce_flips_only_the_vertical_component() {
        let (l_paddle, r_paddle) = make_paddles();
        let pad_top = r_paddle.shape.y;
        // Ball already past the expanded face line, dropping onto the paddle's top edge.
        let mut ball = make_ball(950.0, pad_top - 19.0, 1.0, 1.0, 8.0);
        let contact = resolve_ball_movement(&mut ball, &l_paddle, &r_paddle, ARENA_HEIGHT);
        assert_eq!(contact, Contact::Paddle(EdgeSide::Top));
        assert_eq!(ball.dir_vect, Vector2::new(1.0, -1.0));
        assert_eq!(ball.center().y, pad_top - 15.0);
    }

    #[test]
    fn fallback_clamp_pins_flush_against_the_violated_wall() {
        let (l_paddle, r_paddle) = make_paddles();
        // Center already above the top wall line : the swept segment cannot cross it.
        let mut ball = make_ball(300.0, 14.0, 1.0, -1.0, 4.0);
        let contact = resolve_ball_movement(&mut ball, &l_paddle, &r_paddle, ARENA_HEIGHT);
        assert_eq!(contact, Contact::Clamp);
        assert_eq!(ball.dir_vect, Vector2::new(1.0, 1.0));
        assert_eq!(ball.shape.y, 0.0);
        assert_eq!(ball.shape.x, 304.0 - 15.0);
    }

    #[test]
    fn horizontal_exit_is_never_clamped() {
        let (l_paddle, r_paddle) = make_paddles();
        // Moving left, already past the left paddle : the ball crosses out for scoring to observe.
        let mut ball = make_ball(5.0, 384.0, -1.0, 0.0, 4.0);
        let contact = resolve_ball_movement(&mut ball, &l_paddle, &r_paddle, ARENA_HEIGHT);
        assert_eq!(contact, Contact::None);
        assert_eq!(ball.center(), Vector2::new(1.0, 384.0));
        assert_eq!(ball.dir_vect, Vector2::new(-1.0, 0.0));
        assert!(ball.shape.x < 0.0);
    }

    #[test]
    fn no_overlap_remains_after_a_paddle_bounce() {
        let (l_paddle, r_paddle) = make_paddles();
        let mut ball = make_ball(936.0, 384.0, 1.0, 1.0, 10.0);
        let contact = resolve_ball_movement(&mut ball, &l_paddle, &r_paddle, ARENA_HEIGHT);
        assert_eq!(contact, Contact::Paddle(EdgeSide::Left));
        assert!(ball.shape.x + ball.shape.width <= r_paddle.shape.x);
    }
}
