//! Implementation of the logic of the match simulation.
//!
//! This mod defines the per-match engine : geometry, ball, paddles, the swept collision resolver,
//! and the lifecycle state machine driven by the entrypoint function [`run_match`]. Each match runs
//! as one independent asynchronous task; sessions talk to it only through the channels bundled in a
//! [`JoinRequest`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

pub use side::Side;
pub use state::MatchOutcome;
use state::MatchPhase;

use crate::persist;
use crate::protocol::ServerEvent;

pub mod ball;
pub mod collision;
pub mod geometry;
pub mod paddle;
mod side;
mod state;

/// The immutable identity of a match : its external record key and the two registered players.
#[derive(Debug, Clone)]
pub struct MatchSeed {
    /// Identifier keying the match's record in the external results store.
    pub external_id: String,
    /// Registered left-side participant.
    pub player1_id: i64,
    /// Registered right-side participant.
    pub player2_id: i64,
}

/// A paddle intent queued by a session, carried with the client's own timestamp.
#[derive(Debug, Clone, Copy)]
pub struct QueuedMove {
    pub dir: MoveDir,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDir {
    Up,
    Down,
}

/// A session's request to take part in a match, answered through the bundled [`oneshot`] channel.
pub struct JoinRequest {
    pub participant_id: i64,
    pub outbound: mpsc::Sender<ServerEvent>,
    pub reply: oneshot::Sender<Result<JoinedPlayer, MatchError>>,
}

/// What a successfully joined session gets back : its side and the producer end of that side's
/// bounded input queue. Sending on a full queue never blocks - the move is simply dropped.
#[derive(Debug)]
pub struct JoinedPlayer {
    pub side: Side,
    pub input: mpsc::Sender<QueuedMove>,
}

/// The match task's view of one joined player. A closed `outbound` means the session dropped its
/// receiving end : the player is gone.
pub(crate) struct PlayerLink {
    pub(crate) participant_id: i64,
    pub(crate) outbound: mpsc::Sender<ServerEvent>,
    pub(crate) input_rx: mpsc::Receiver<QueuedMove>,
    pub(crate) last_ts: u64,
}

/// Errors a session can get back when interacting with a match.
#[derive(thiserror::Error, Debug)]
pub enum MatchError {
    /// The match already has its two players and is running.
    #[error("the lobby is already at its two-player capacity")]
    LobbyFull,

    /// The waiting phase exceeded its deadline with fewer than two players.
    #[error("the lobby timed out before both players joined")]
    LobbyTimeout,

    /// The joining identity is not one of the two registered participants.
    #[error("participant `{0}` is not registered in this match")]
    UnknownParticipant(i64),

    /// The match finished or was reaped; it no longer accepts interactions.
    #[error("the match is no longer accepting joins")]
    Closed,
}

/// Run one match to its terminal state : wait for the players, play the game, then report the
/// outcome to the results store.
///
/// Persistence is best-effort with at-most-once delivery : a failed write is logged and never
/// rolls the completed match back. The `finished` flag makes the match eligible for the registry
/// sweep whatever the outcome was.
pub async fn run_match(
    seed: MatchSeed,
    join_rx: mpsc::Receiver<JoinRequest>,
    started: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    db_client: Arc<tokio_postgres::Client>,
) {
    let mut phase = MatchPhase::new(seed.player1_id, seed.player2_id, join_rx);
    let outcome = loop {
        phase = match phase.advance(&started).await {
            MatchPhase::Finished(outcome) => break outcome,
            other_phase => other_phase,
        };
    };

    match &outcome {
        MatchOutcome::Completed {
            winner,
            scores,
            finished_at,
        } => {
            log::info!(
                "{}: Match completed {}-{}.",
                seed.external_id,
                scores[0],
                scores[1]
            );
            match persist::report_match_result(&db_client, &seed, *winner, *scores, *finished_at)
                .await
            {
                Ok(()) => log::trace!("{}: Match result persisted.", seed.external_id),
                Err(e) => log::warn!(
                    "{}: Failed to persist the match result : {e}.",
                    seed.external_id
                ),
            }
        }
        MatchOutcome::TimedOut => {
            log::info!("{}: Lobby timed out, the match never ran.", seed.external_id);
        }
    }
    finished.store(true, Ordering::Release);
}
