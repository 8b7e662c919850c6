//! Wire-compliant (de)serializable event types and helper functions to communicate with clients.
//!
//! Every message is a CBOR-encoded tuple whose first element is a `u8` event id. Inbound payloads
//! are validated here, at the boundary : the core only ever sees the closed [`ClientEvent`] and
//! [`ServerEvent`] unions.

use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::WebSocketStream;

use crate::game::Side;

const START_GAME_ID: u8 = 0;
const MOVE_UP_ID: u8 = 1;
const MOVE_DOWN_ID: u8 = 2;
const HEARTBEAT_ID: u8 = 3;

const STATE_ID: u8 = 0;
const LOBBY_WAIT_ID: u8 = 1;
const SCORE_ID: u8 = 2;
const ERROR_ID: u8 = 3;

/// Errors encountered while receiving an event from the client.
#[derive(thiserror::Error, Debug)]
pub enum ClientEventError {
    /// This error happens when a poll to a [`WebSocketStream`] returns an error.
    #[error("Error at the websocket layer : {0}")]
    Connection(#[from] tungstenite::Error),

    /// This error happens when a poll to a [`WebSocketStream`] returns [`None`], or that the
    /// connection has been closed.
    #[error("Connection closed or lost")]
    ConnectionLost,

    /// This error happens when the deserialization of the binary data received failed.
    #[error("Parsing failed : {0:?}")]
    ParsingFailed(#[from] ciborium::de::Error<<&'static [u8] as ciborium_io::Read>::Error>),

    /// This error happens when a decoded event is missing a required field or carries a field of
    /// the wrong shape.
    #[error("Event is missing required fields")]
    MalformedInput,

    /// This error happens when the event id is not part of the protocol.
    #[error("Unknown event type `{0}`")]
    UnknownEventType(u8),

    /// This error happens when the client sends any message type other than [`Message::Ping`],
    /// [`Message::Pong`] and [`Message::Binary`].
    #[error("Received a wrong websocket message type")]
    ProtocolViolation,

    /// This error indicates that the client took long enough to send the expected hello message
    /// that it is considered an error.
    #[error("Didn't receive a hello message within 5 seconds")]
    Timeout,
}

/// The closed union of events a client can send once identified.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Register (or locate) the match this connection wants to take part in.
    StartGame {
        game_id: String,
        player1_id: i64,
        player2_id: i64,
    },
    MoveUp { timestamp: u64 },
    MoveDown { timestamp: u64 },
    Heartbeat { timestamp: u64 },
}

/// Process the output of a poll on the given [`WebSocketStream`]. Pings and pongs are transparent
/// and yield [`None`]; a binary frame is decoded into a [`ClientEvent`].
pub fn parse_client_event(
    msg: Option<Result<Message, tungstenite::Error>>,
) -> Result<Option<ClientEvent>, ClientEventError> {
    match msg {
        Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => Ok(None),
        Some(Ok(Message::Binary(b))) => decode_client_event(b.as_slice()).map(Some),
        Some(Ok(Message::Close(_))) => Err(ClientEventError::ConnectionLost),
        Some(Ok(_)) => Err(ClientEventError::ProtocolViolation),
        Some(Err(tungstenite::Error::ConnectionClosed)) | None => {
            Err(ClientEventError::ConnectionLost)
        }
        Some(Err(e)) => Err(ClientEventError::Connection(e)),
    }
}

fn decode_client_event(bytes: &[u8]) -> Result<ClientEvent, ClientEventError> {
    let value: ciborium::Value = ciborium::from_reader(bytes)?;
    let fields = value.as_array().ok_or(ClientEventError::MalformedInput)?;
    let event_id = fields
        .first()
        .and_then(ciborium::Value::as_integer)
        .and_then(|i| u8::try_from(i).ok())
        .ok_or(ClientEventError::MalformedInput)?;
    match event_id {
        START_GAME_ID => Ok(ClientEvent::StartGame {
            game_id: String::from(text_field(fields, 1)?),
            player1_id: int_field(fields, 2)?,
            player2_id: int_field(fields, 3)?,
        }),
        MOVE_UP_ID => Ok(ClientEvent::MoveUp {
            timestamp: ts_field(fields)?,
        }),
        MOVE_DOWN_ID => Ok(ClientEvent::MoveDown {
            timestamp: ts_field(fields)?,
        }),
        HEARTBEAT_ID => Ok(ClientEvent::Heartbeat {
            timestamp: ts_field(fields)?,
        }),
        other => Err(ClientEventError::UnknownEventType(other)),
    }
}

fn text_field(fields: &[ciborium::Value], index: usize) -> Result<&str, ClientEventError> {
    fields
        .get(index)
        .and_then(ciborium::Value::as_text)
        .ok_or(ClientEventError::MalformedInput)
}

fn int_field(fields: &[ciborium::Value], index: usize) -> Result<i64, ClientEventError> {
    fields
        .get(index)
        .and_then(ciborium::Value::as_integer)
        .and_then(|i| i64::try_from(i).ok())
        .ok_or(ClientEventError::MalformedInput)
}

fn ts_field(fields: &[ciborium::Value]) -> Result<u64, ClientEventError> {
    fields
        .get(1)
        .and_then(ciborium::Value::as_integer)
        .and_then(|i| u64::try_from(i).ok())
        .ok_or(ClientEventError::MalformedInput)
}

/// The per-tick state payload fanned out to both participants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateSnapshot {
    pub ball_x: f64,
    pub ball_y: f64,
    pub p1_x: f64,
    pub p1_y: f64,
    pub p1_last_ts: u64,
    pub p2_x: f64,
    pub p2_y: f64,
    pub p2_last_ts: u64,
}

/// The closed union of server-to-client events.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    State(StateSnapshot),
    LobbyWait,
    Score { scored_by: Side },
    Error { message: String },
}

impl From<&ServerEvent> for Vec<u8> {
    fn from(value: &ServerEvent) -> Self {
        let mut bytes = Vec::new();
        match value {
            ServerEvent::State(s) => ciborium::into_writer(
                &(
                    STATE_ID,
                    s.ball_x,
                    s.ball_y,
                    s.p1_x,
                    s.p1_y,
                    s.p1_last_ts,
                    s.p2_x,
                    s.p2_y,
                    s.p2_last_ts,
                ),
                &mut bytes,
            ),
            ServerEvent::LobbyWait => ciborium::into_writer(&(LOBBY_WAIT_ID,), &mut bytes),
            ServerEvent::Score { scored_by } => {
                ciborium::into_writer(&(SCORE_ID, u8::from(*scored_by)), &mut bytes)
            }
            ServerEvent::Error { message } => {
                ciborium::into_writer(&(ERROR_ID, message.as_str()), &mut bytes)
            }
        }
        .expect("Could not serialize a server event.");
        bytes
    }
}

/// Structure representing the hello message opening every connection : the protocol version the
/// client speaks and the identity the excluded auth layer vouched for.
pub struct HelloMessage {
    pub proto_version: u8,
    pub participant_id: i64,
}

/// Wait for the client to send the [`HelloMessage`].
///
/// Answers nothing and skips pings, until either timing out, receiving some kind of error or
/// erroneous message, or the expected [`HelloMessage`].
pub async fn receive_hello_message<S>(
    websocket: &mut WebSocketStream<S>,
) -> Result<HelloMessage, ClientEventError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let timeout_instant = Instant::now() + Duration::from_secs(5);
    let mut timeout_result = tokio::time::timeout_at(timeout_instant, websocket.next()).await;

    while let Ok(Some(Ok(Message::Ping(_) | Message::Pong(_)))) = timeout_result {
        timeout_result = tokio::time::timeout_at(timeout_instant, websocket.next()).await;
    }

    match timeout_result {
        Ok(Some(Ok(Message::Binary(msg)))) => match ciborium::from_reader(msg.as_slice()) {
            Ok((proto_version, participant_id)) => Ok(HelloMessage {
                proto_version,
                participant_id,
            }),
            Err(e) => Err(e.into()),
        },
        Ok(Some(Ok(_))) => Err(ClientEventError::ProtocolViolation),
        Ok(Some(Err(tungstenite::Error::ConnectionClosed))) | Ok(None) => {
            Err(ClientEventError::ConnectionLost)
        }
        Ok(Some(Err(e))) => Err(ClientEventError::Connection(e)),
        Err(_) => Err(ClientEventError::Timeout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! encode {
        ($tuple:expr) => {{
            let mut bytes = Vec::new();
            ciborium::into_writer(&$tuple, &mut bytes).unwrap();
            bytes
        }};
    }

    #[test]
    fn a_move_event_decodes_with_its_timestamp() {
        let bytes = encode!((MOVE_UP_ID, 1234u64));
        assert_eq!(
            decode_client_event(&bytes).unwrap(),
            ClientEvent::MoveUp { timestamp: 1234 }
        );

        let bytes = encode!((MOVE_DOWN_ID, 99u64));
        assert_eq!(
            decode_client_event(&bytes).unwrap(),
            ClientEvent::MoveDown { timestamp: 99 }
        );
    }

    #[test]
    fn a_start_event_decodes_all_its_fields() {
        let bytes = encode!((START_GAME_ID, "match-41", 7i64, 8i64));
        assert_eq!(
            decode_client_event(&bytes).unwrap(),
            ClientEvent::StartGame {
                game_id: String::from("match-41"),
                player1_id: 7,
                player2_id: 8,
            }
        );
    }

    #[test]
    fn a_missing_field_is_a_malformed_event() {
        let bytes = encode!((START_GAME_ID, "match-41", 7i64));
        match decode_client_event(&bytes) {
            Err(ClientEventError::MalformedInput) => {}
            other => panic!("expected a malformed-input error, got {other:?}"),
        }
    }

    #[test]
    fn an_unknown_event_id_is_rejected() {
        let bytes = encode!((200u8, 1234u64));
        match decode_client_event(&bytes) {
            Err(ClientEventError::UnknownEventType(200)) => {}
            other => panic!("expected an unknown-event error, got {other:?}"),
        }
    }

    #[test]
    fn pings_are_transparent_to_event_parsing() {
        let parsed = parse_client_event(Some(Ok(Message::Ping(Vec::new())))).unwrap();
        assert_eq!(parsed, None);
    }

    #[test]
    fn a_text_frame_is_a_protocol_violation() {
        match parse_client_event(Some(Ok(Message::Text(String::from("hi"))))) {
            Err(ClientEventError::ProtocolViolation) => {}
            other => panic!("expected a protocol violation, got {other:?}"),
        }
    }

    #[test]
    fn a_score_event_encodes_the_scoring_side() {
        let bytes = Vec::from(&ServerEvent::Score {
            scored_by: Side::Right,
        });
        let value: ciborium::Value = ciborium::from_reader(bytes.as_slice()).unwrap();
        let fields = value.as_array().unwrap();
        assert_eq!(u8::try_from(fields[0].as_integer().unwrap()).unwrap(), SCORE_ID);
        assert_eq!(u8::try_from(fields[1].as_integer().unwrap()).unwrap(), 1);
    }
}
