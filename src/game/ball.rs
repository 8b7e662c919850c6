//! The ball : a square hitbox, an integer-component direction vector and a ramping scalar speed.

use rand::distributions::{Distribution, Standard};
use rand::Rng;

use crate::game::geometry::{Rect, Vector2};

/// A fresh service direction : each axis independently -1 or +1 with equal probability.
struct DiagonalDir {
    x: f64,
    y: f64,
}

impl Distribution<DiagonalDir> for Standard {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> DiagonalDir {
        DiagonalDir {
            x: if rng.gen() { 1.0 } else { -1.0 },
            y: if rng.gen() { 1.0 } else { -1.0 },
        }
    }
}

/// The ball. Its `shape` edge always equals `2 * radius_px`, and `movement_speed` never exceeds
/// `max_speed`. Created once per match and re-centered - not re-created - on every score.
#[derive(Debug, Clone)]
pub struct Ball {
    pub shape: Rect,
    pub dir_vect: Vector2,
    pub movement_speed: f64,
    pub max_speed: f64,
    pub speed_incr: u32,
    pub radius_px: f64,
    start_speed: f64,
}

impl Ball {
    pub fn new(movement_speed: f64, max_speed: f64, radius_px: f64) -> Ball {
        Ball {
            shape: Rect::new(0.0, 0.0, radius_px * 2.0, radius_px * 2.0),
            dir_vect: Vector2::new(0.0, 0.0),
            movement_speed,
            max_speed,
            speed_incr: 0,
            radius_px,
            start_speed: movement_speed,
        }
    }

    pub fn center(&self) -> Vector2 {
        self.shape.center()
    }

    /// Re-center the ball at the arena midpoint, pick a fresh random diagonal direction and reset
    /// the speed ramp for the new round.
    pub fn set_start<R: Rng + ?Sized>(&mut self, arena_width: f64, arena_height: f64, rng: &mut R) {
        self.shape.x = arena_width / 2.0 - self.radius_px;
        self.shape.y = arena_height / 2.0 - self.radius_px;
        let direction: DiagonalDir = rng.gen();
        self.dir_vect = Vector2::new(direction.x, direction.y);
        self.movement_speed = self.start_speed;
        self.speed_incr = 0;
    }

    /// Ramp the speed up after a paddle hit. Each hit adds `0.5 * 1.2^n` where `n` counts the hits
    /// since the last service, capped at `max_speed`.
    pub fn increase_speed(&mut self) {
        if self.movement_speed < self.max_speed {
            self.movement_speed += 0.5 * f64::powi(1.2, self.speed_incr as i32);
            self.speed_incr += 1;
        }
        if self.movement_speed > self.max_speed {
            self.movement_speed = self.max_speed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_edge_is_twice_the_radius() {
        let ball = Ball::new(4.0, 12.0, 15.0);
        assert_eq!(ball.shape.width, 30.0);
        assert_eq!(ball.shape.height, 30.0);
    }

    #[test]
    fn set_start_centers_the_shape_and_picks_a_diagonal() {
        let mut ball = Ball::new(4.0, 12.0, 15.0);
        ball.set_start(1024.0, 768.0, &mut rand::thread_rng());
        assert_eq!(ball.shape.x, 497.0);
        assert_eq!(ball.shape.y, 369.0);
        assert_eq!(ball.dir_vect.x.abs(), 1.0);
        assert_eq!(ball.dir_vect.y.abs(), 1.0);
    }

    #[test]
    fn speed_ramp_grows_and_caps_at_max() {
        let mut ball = Ball::new(4.0, 12.0, 15.0);
        ball.increase_speed();
        assert_eq!(ball.movement_speed, 4.5);
        assert_eq!(ball.speed_incr, 1);
        for _ in 0..50 {
            ball.increase_speed();
            assert!(ball.movement_speed <= ball.max_speed);
        }
        assert_eq!(ball.movement_speed, ball.max_speed);
    }

    #[test]
    fn set_start_resets_the_speed_ramp() {
        let mut ball = Ball::new(4.0, 12.0, 15.0);
        for _ in 0..10 {
            ball.increase_speed();
        }
        ball.set_start(1024.0, 768.0, &mut rand::thread_rng());
        assert_eq!(ball.movement_speed, 4.0);
        assert_eq!(ball.speed_incr, 0);
    }
}
