//! Constants defining the court, the element speeds and the lifecycle timings.

use std::time::Duration;

pub const ARENA_WIDTH: f64 = 1024.0;
pub const ARENA_HEIGHT: f64 = 768.0;

pub const BALL_RADIUS: f64 = 15.0;
/// The ball's hitbox is square; this is its edge length.
pub const BALL_EDGE: f64 = BALL_RADIUS * 2.0;
/// How far past a goal line the ball must travel, beyond its own edge, before a point is awarded.
pub const GOAL_DEPTH: f64 = BALL_EDGE * 2.0;

pub const PAD_WIDTH: f64 = 20.0;
pub const PAD_HEIGHT: f64 = 150.0;
/// Horizontal distance between each goal line and its paddle.
pub const PAD_X_OFFSET: f64 = 50.0;

pub const BALL_SPEED_PER_TICK: f64 = 4.0;
pub const BALL_MAX_SPEED_PER_TICK: f64 = 12.0;
pub const PAD_SPEED_PER_TICK: f64 = 10.0;

pub const TICKS_PER_SECOND: u64 = 66;
pub const ROUND_TARGET_SCORE: u32 = 10;

pub const LOBBY_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const LOBBY_TIMEOUT: Duration = Duration::from_secs(30);
pub const REGISTRY_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Depth of each side's bounded input queue. The producer side never blocks : a move that does
/// not fit before the next tick drains the queue is dropped.
pub const INPUT_QUEUE_DEPTH: usize = 64;
/// Depth of each player's outbound event queue. State frames are superseded every tick, so a
/// session too slow to drain its queue loses stale frames rather than stalling the tick loop.
pub const OUTBOUND_QUEUE_DEPTH: usize = 64;
