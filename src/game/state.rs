//! Encapsulation of a match's lifecycle phase, and computation of its evolution.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;

pub use done::MatchOutcome;
use running::RunningState;

use super::JoinRequest;

mod done;
mod running;
mod waiting;

/// Current phase of a match. `WAITING` is initial, `FINISHED` is terminal, and a match that
/// reached `RUNNING` never returns to `WAITING`.
pub(super) enum MatchPhase {
    Waiting {
        player1_id: i64,
        player2_id: i64,
        join_rx: mpsc::Receiver<JoinRequest>,
    },
    Running(RunningState),
    Finished(MatchOutcome),
}

impl MatchPhase {
    /// Create a new match phase at the initial waiting stage.
    pub(super) fn new(
        player1_id: i64,
        player2_id: i64,
        join_rx: mpsc::Receiver<JoinRequest>,
    ) -> Self {
        Self::Waiting {
            player1_id,
            player2_id,
            join_rx,
        }
    }

    /// Complete the current phase to get to the next one and return it.
    ///
    /// The `started` flag is raised on the transition out of the waiting phase; from then on the
    /// registry handle rejects further joins as lobby-full.
    pub(super) async fn advance(self, started: &AtomicBool) -> MatchPhase {
        match self {
            Self::Waiting {
                player1_id,
                player2_id,
                mut join_rx,
            } => match waiting::wait_for_players(player1_id, player2_id, &mut join_rx).await {
                Ok(players) => {
                    started.store(true, Ordering::Release);
                    Self::Running(RunningState::new(players, &mut rand::thread_rng()))
                }
                Err(_) => Self::Finished(MatchOutcome::TimedOut),
            },
            Self::Running(state) => Self::Finished(running::run_match_loop(state).await),
            Self::Finished(outcome) => Self::Finished(outcome),
        }
    }
}
