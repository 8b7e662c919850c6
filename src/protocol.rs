//! Implementation of the client-server communication protocol
//!
//! This module provides structures mapping the protocol messages, helper functions for messages and an entrypoint
//! function that runs the protocol on a given [`WebSocketStream`] connection : [`execute_protocol_on_connection`].
//!
//! The structures are :
//! * Serializable : [`ServerEvent`] and its [`StateSnapshot`] payload.
//! * Deserializable : [`HelloMessage`] and [`ClientEvent`].
//!
//! The messages received from the client are processed through the helper functions [`parse_client_event`] and
//! [`receive_hello_message`].

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

pub use messages::{
    parse_client_event, receive_hello_message, ClientEvent, ClientEventError, HelloMessage,
    ServerEvent, StateSnapshot,
};

use crate::game::{JoinedPlayer, MatchSeed, MoveDir, QueuedMove};
use crate::persist;
use crate::registry::MatchRegistry;

pub mod constants;
mod messages;
mod side;

/// The current maximum version of the protocol supported.
const SUPPORTED_PROTO_VERSION: u8 = 1;

/// Receives a [`HelloMessage`], then drives the identified participant through lobby entry and the
/// realtime exchange of moves and state frames.
pub async fn execute_protocol_on_connection<S, D>(
    mut websocket: WebSocketStream<S>,
    log_id: D,
    registry: Arc<MatchRegistry>,
    db_client: Arc<tokio_postgres::Client>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
    D: Display,
{
    log::info!("{log_id}: Beginning to unroll the protocol with a client.");
    match receive_hello_message(&mut websocket).await {
        Ok(HelloMessage { proto_version, .. }) if proto_version != SUPPORTED_PROTO_VERSION => {
            log::info!(
                "{log_id}: Received a request for protocol version {proto_version}, but is not \
                supported."
            );
        }
        Ok(HelloMessage { participant_id, .. }) => {
            if is_id_valid(&db_client, participant_id).await {
                run_identified_session(websocket, &log_id, participant_id, registry, db_client)
                    .await;
            } else {
                log::info!(
                    "{log_id}: The client sent an id that doesn't exist in the users database."
                );
            }
        }
        Err(e) => log::info!("{log_id}: Error while receiving a hello message : {e}."),
    }
    log::info!("{log_id}: Protocol done.");
}

/// Check in the database if the id given by the remote client exists. Refuses the connection on a
/// database failure, same as on an unknown id.
async fn is_id_valid(db_client: &Arc<tokio_postgres::Client>, participant_id: i64) -> bool {
    match persist::participant_exists(db_client, participant_id).await {
        Ok(exists) => exists,
        Err(e) => {
            log::error!("Database error while checking a participant id : {e}.");
            false
        }
    }
}

/// Wait for the client's match request, join the designated lobby, then pump moves inward and
/// state frames outward until either side is done.
async fn run_identified_session<S, D>(
    mut websocket: WebSocketStream<S>,
    log_id: &D,
    participant_id: i64,
    registry: Arc<MatchRegistry>,
    db_client: Arc<tokio_postgres::Client>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
    D: Display,
{
    let Some(seed) = await_match_request(&mut websocket, log_id).await else {
        let _ = websocket.close(None).await;
        return;
    };

    // A participant can re-enter the lobby they already belong to, but never a second match.
    let handle = match registry.find_by_participant(participant_id) {
        Some(existing) if existing.external_id() != seed.external_id => {
            log::info!("{log_id}: Participant {participant_id} is already in another match.");
            let refusal = ServerEvent::Error {
                message: String::from("already taking part in another match"),
            };
            let _ = websocket.send(Message::Binary(Vec::from(&refusal))).await;
            let _ = websocket.close(None).await;
            return;
        }
        Some(existing) => existing,
        None => registry.find_or_create(seed, db_client),
    };

    let (outbound_tx, outbound_rx) = mpsc::channel(constants::OUTBOUND_QUEUE_DEPTH);
    let joined = match handle
        .join(participant_id, &log_id.to_string(), outbound_tx)
        .await
    {
        Ok(joined) => joined,
        Err(e) => {
            log::info!("{log_id}: Lobby refused the participant : {e}.");
            let refusal = ServerEvent::Error {
                message: e.to_string(),
            };
            let _ = websocket.send(Message::Binary(Vec::from(&refusal))).await;
            let _ = websocket.close(None).await;
            return;
        }
    };
    log::trace!("{log_id}: Joined a lobby on side {:?}.", joined.side);

    pump_session(websocket, log_id, joined, outbound_rx).await;

    handle.leave(&log_id.to_string());
}

/// Read client events until a [`ClientEvent::StartGame`] identifies the requested match. A client
/// that stays silent past the deadline is cut off, same as for the hello message.
async fn await_match_request<S, D>(
    websocket: &mut WebSocketStream<S>,
    log_id: &D,
) -> Option<MatchSeed>
where
    S: AsyncRead + AsyncWrite + Unpin,
    D: Display,
{
    let timeout_instant = Instant::now() + Duration::from_secs(5);
    loop {
        let msg = match tokio::time::timeout_at(timeout_instant, websocket.next()).await {
            Ok(msg) => msg,
            Err(_) => {
                log::info!("{log_id}: No match request arrived within the deadline.");
                return None;
            }
        };
        match parse_client_event(msg) {
            Ok(Some(ClientEvent::StartGame {
                game_id,
                player1_id,
                player2_id,
            })) => {
                return Some(MatchSeed {
                    external_id: game_id,
                    player1_id,
                    player2_id,
                });
            }
            Ok(Some(other)) => {
                log::debug!("{log_id}: Dropping an event received before a match request : {other:?}.");
            }
            Ok(None) => {}
            Err(ClientEventError::ConnectionLost) | Err(ClientEventError::Connection(_)) => {
                log::info!("{log_id}: Connection lost before a match request.");
                return None;
            }
            Err(e) => {
                log::info!("{log_id}: Invalid event before a match request : {e}.");
                return None;
            }
        }
    }
}

/// Forward match events to the client and queued moves to the match, until the match broadcast
/// channel closes or the client leaves.
async fn pump_session<S, D>(
    mut websocket: WebSocketStream<S>,
    log_id: &D,
    joined: JoinedPlayer,
    mut outbound_rx: mpsc::Receiver<ServerEvent>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
    D: Display,
{
    loop {
        tokio::select! {
            event = outbound_rx.recv() => match event {
                Some(event) => {
                    if let Err(e) = websocket.send(Message::Binary(Vec::from(&event))).await {
                        log::info!("{log_id}: Error while sending an event : {e}.");
                        break;
                    }
                }
                None => {
                    log::trace!("{log_id}: The match is over, ending the session.");
                    break;
                }
            },
            msg = websocket.next() => match parse_client_event(msg) {
                Ok(Some(event)) => forward_client_event(log_id, &joined, event),
                Ok(None) => {}
                Err(ClientEventError::ConnectionLost) | Err(ClientEventError::Connection(_)) => {
                    log::info!("{log_id}: Client connection lost.");
                    break;
                }
                Err(e) => log::debug!("{log_id}: Dropping an invalid event : {e}."),
            },
        }
    }
    let _ = websocket.close(None).await;
}

/// Route one in-match client event. Moves are queued towards the match task; a full queue drops
/// the move, keeping a slow match from stalling the connection.
fn forward_client_event<D: Display>(log_id: &D, joined: &JoinedPlayer, event: ClientEvent) {
    match event {
        ClientEvent::MoveUp { timestamp } => {
            queue_move(log_id, joined, QueuedMove { dir: MoveDir::Up, timestamp });
        }
        ClientEvent::MoveDown { timestamp } => {
            queue_move(log_id, joined, QueuedMove { dir: MoveDir::Down, timestamp });
        }
        ClientEvent::Heartbeat { timestamp } => {
            log::trace!("{log_id}: Heartbeat at client time {timestamp}.");
        }
        ClientEvent::StartGame { .. } => {
            log::debug!("{log_id}: Ignoring a match request received mid-match.");
        }
    }
}

fn queue_move<D: Display>(log_id: &D, joined: &JoinedPlayer, queued: QueuedMove) {
    if joined.input.try_send(queued).is_err() {
        log::debug!("{log_id}: Move queue full, dropping a move.");
    }
}
