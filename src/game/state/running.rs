//! The running phase : the fixed-rate tick loop driving physics, input application and scoring.

use std::time::{Duration, SystemTime};

use rand::Rng;

use crate::game::ball::Ball;
use crate::game::collision::{resolve_ball_movement, Contact};
use crate::game::geometry::Rect;
use crate::game::paddle::Paddle;
use crate::game::state::done::MatchOutcome;
use crate::game::{MoveDir, PlayerLink, Side};
use crate::protocol::constants::{
    ARENA_HEIGHT, ARENA_WIDTH, BALL_MAX_SPEED_PER_TICK, BALL_RADIUS, BALL_SPEED_PER_TICK,
    GOAL_DEPTH, PAD_HEIGHT, PAD_SPEED_PER_TICK, PAD_WIDTH, PAD_X_OFFSET, ROUND_TARGET_SCORE,
    TICKS_PER_SECOND,
};
use crate::protocol::{ServerEvent, StateSnapshot};

/// The live match state : one ball, two paddles, two score counters and the two player links
/// carrying the per-side input queues and outbound channels.
pub(in crate::game) struct RunningState {
    ball: Ball,
    l_paddle: Paddle,
    r_paddle: Paddle,
    scores: [u32; 2],
    players: [PlayerLink; 2],
}

/// Drive the tick loop until one side reaches the round target.
///
/// Input ingestion happens on the session tasks; this loop only suspends on its own interval
/// timer and drains the queues between physics and scoring.
pub(in crate::game) async fn run_match_loop(mut state: RunningState) -> MatchOutcome {
    let mut tick_interval = tokio::time::interval(Duration::from_millis(1000 / TICKS_PER_SECOND));
    loop {
        tick_interval.tick().await;
        if let Some(outcome) = state.update_on_tick(&mut rand::thread_rng()) {
            break outcome;
        }
    }
}

impl RunningState {
    /// Position the elements for the first service.
    pub(in crate::game) fn new<R: Rng + ?Sized>(players: [PlayerLink; 2], rng: &mut R) -> Self {
        let mut ball = Ball::new(BALL_SPEED_PER_TICK, BALL_MAX_SPEED_PER_TICK, BALL_RADIUS);
        ball.set_start(ARENA_WIDTH, ARENA_HEIGHT, rng);
        let pad_y = (ARENA_HEIGHT - PAD_HEIGHT) / 2.0;
        RunningState {
            ball,
            l_paddle: Paddle::new(
                Rect::new(PAD_X_OFFSET, pad_y, PAD_WIDTH, PAD_HEIGHT),
                PAD_SPEED_PER_TICK,
            ),
            r_paddle: Paddle::new(
                Rect::new(
                    ARENA_WIDTH - PAD_X_OFFSET - PAD_WIDTH,
                    pad_y,
                    PAD_WIDTH,
                    PAD_HEIGHT,
                ),
                PAD_SPEED_PER_TICK,
            ),
            scores: [0, 0],
            players,
        }
    }

    /// One simulation step, in the fixed order : withdrawal check, physics, input application,
    /// scoring check, state broadcast.
    fn update_on_tick<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<MatchOutcome> {
        if let Some(outcome) = self.check_withdrawal() {
            return Some(outcome);
        }
        let contact =
            resolve_ball_movement(&mut self.ball, &self.l_paddle, &self.r_paddle, ARENA_HEIGHT);
        if let Contact::Paddle(_) = contact {
            self.ball.increase_speed();
        }
        self.drain_inputs();
        let outcome = self.check_scoring(rng);
        if outcome.is_none() {
            self.broadcast(&ServerEvent::State(self.snapshot()));
        }
        outcome
    }

    /// End the match when a player's session has dropped its receiving end : the remaining side
    /// wins by withdrawal at the current scores.
    fn check_withdrawal(&self) -> Option<MatchOutcome> {
        for (index, link) in self.players.iter().enumerate() {
            if link.outbound.is_closed() {
                let deserter = if index == Side::Left.index() {
                    Side::Left
                } else {
                    Side::Right
                };
                log::info!(
                    "Participant {} left the match; side {:?} wins by withdrawal.",
                    link.participant_id,
                    !deserter
                );
                let _ = self.players[(!deserter).index()].outbound.try_send(
                    ServerEvent::Error {
                        message: String::from("opponent left the match"),
                    },
                );
                return Some(MatchOutcome::Completed {
                    winner: !deserter,
                    scores: self.scores,
                    finished_at: SystemTime::now(),
                });
            }
        }
        None
    }

    /// Apply every move queued since the previous tick, in arrival order, and record the timestamp
    /// of the last processed input per side. Draining an empty queue is a no-op.
    fn drain_inputs(&mut self) {
        for (index, link) in self.players.iter_mut().enumerate() {
            let paddle = if index == Side::Left.index() {
                &mut self.l_paddle
            } else {
                &mut self.r_paddle
            };
            while let Ok(queued) = link.input_rx.try_recv() {
                match queued.dir {
                    MoveDir::Up => paddle.move_up(),
                    MoveDir::Down => paddle.move_down(ARENA_HEIGHT),
                }
                link.last_ts = queued.timestamp;
            }
        }
    }

    /// Award a point when the ball has moved fully past a goal line by more than twice its
    /// diameter - close misses still inside a paddle's collision zone don't count.
    fn check_scoring<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<MatchOutcome> {
        let scorer = if self.ball.shape.x + self.ball.shape.width < -GOAL_DEPTH {
            Side::Right
        } else if self.ball.shape.x > ARENA_WIDTH + GOAL_DEPTH {
            Side::Left
        } else {
            return None;
        };
        self.scores[scorer.index()] += 1;
        self.broadcast(&ServerEvent::Score { scored_by: scorer });
        if self.scores[scorer.index()] >= ROUND_TARGET_SCORE {
            return Some(MatchOutcome::Completed {
                winner: scorer,
                scores: self.scores,
                finished_at: SystemTime::now(),
            });
        }
        self.ball.set_start(ARENA_WIDTH, ARENA_HEIGHT, rng);
        None
    }

    fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            ball_x: self.ball.shape.x,
            ball_y: self.ball.shape.y,
            p1_x: self.l_paddle.shape.x,
            p1_y: self.l_paddle.shape.y,
            p1_last_ts: self.players[Side::Left.index()].last_ts,
            p2_x: self.r_paddle.shape.x,
            p2_y: self.r_paddle.shape.y,
            p2_last_ts: self.players[Side::Right.index()].last_ts,
        }
    }

    /// Fan an event out to both players. The queues are bounded and never awaited : a session too
    /// slow to drain its queue loses this frame and catches up on the next one.
    fn broadcast(&self, event: &ServerEvent) {
        for link in &self.players {
            let _ = link.outbound.try_send(event.clone());
        }
    }
}
