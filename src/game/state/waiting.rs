//! The lobby phase : collect the two expected players, advertise the wait, enforce the deadline.

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::game::{JoinRequest, JoinedPlayer, MatchError, PlayerLink, Side};
use crate::protocol::constants::{INPUT_QUEUE_DEPTH, LOBBY_POLL_INTERVAL, LOBBY_TIMEOUT};
use crate::protocol::ServerEvent;

/// Wait until both registered players have joined, or until the lobby deadline passes.
///
/// Every poll interval, a lobby-wait notice goes out to whoever is already connected. A join by a
/// participant already holding a slot replaces the previous session - that is a reconnection, not
/// an error. On timeout, the connected participants are notified before the error is returned.
pub(in crate::game) async fn wait_for_players(
    player1_id: i64,
    player2_id: i64,
    join_rx: &mut mpsc::Receiver<JoinRequest>,
) -> Result<[PlayerLink; 2], MatchError> {
    let deadline = Instant::now() + LOBBY_TIMEOUT;
    let mut poll = tokio::time::interval(LOBBY_POLL_INTERVAL);
    let mut slots: [Option<PlayerLink>; 2] = [None, None];
    loop {
        tokio::select! {
            request = join_rx.recv() => match request {
                Some(request) => {
                    accept_join(player1_id, player2_id, request, &mut slots);
                    if slots[0].is_some() && slots[1].is_some() {
                        let (Some(left), Some(right)) = (slots[0].take(), slots[1].take()) else {
                            // Both slots were just checked.
                            continue;
                        };
                        return Ok([left, right]);
                    }
                }
                None => {
                    // The registry dropped the handle : nobody can join anymore.
                    return Err(MatchError::LobbyTimeout);
                }
            },
            _ = poll.tick() => {
                for link in slots.iter().flatten() {
                    let _ = link.outbound.try_send(ServerEvent::LobbyWait);
                }
            }
            _ = tokio::time::sleep_until(deadline) => {
                for link in slots.iter().flatten() {
                    let _ = link.outbound.try_send(ServerEvent::Error {
                        message: String::from("lobby timed out before both players joined"),
                    });
                }
                return Err(MatchError::LobbyTimeout);
            }
        }
    }
}

/// Assign the joiner to its registered slot and answer the request. Unknown identities are
/// rejected without disturbing the players already present.
fn accept_join(
    player1_id: i64,
    player2_id: i64,
    request: JoinRequest,
    slots: &mut [Option<PlayerLink>; 2],
) {
    let side = if request.participant_id == player1_id {
        Side::Left
    } else if request.participant_id == player2_id {
        Side::Right
    } else {
        let _ = request
            .reply
            .send(Err(MatchError::UnknownParticipant(request.participant_id)));
        return;
    };
    let (input_tx, input_rx) = mpsc::channel(INPUT_QUEUE_DEPTH);
    let link = PlayerLink {
        participant_id: request.participant_id,
        outbound: request.outbound,
        input_rx,
        last_ts: 0,
    };
    if slots[side.index()].replace(link).is_some() {
        log::info!(
            "Participant {} rejoined the lobby, replacing its previous session.",
            request.participant_id
        );
    }
    let _ = request.reply.send(Ok(JoinedPlayer {
        side,
        input: input_tx,
    }));
}
