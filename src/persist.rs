//! Best-effort persistence of finished matches.
//!
//! The server is authoritative over the realtime match, not over the result store : a failed
//! write is logged by the caller and never blocks or aborts anything.

use std::time::SystemTime;

use tokio_postgres::types::ToSql;

use crate::game::{MatchSeed, Side};

/// Error raised when an interaction with the result store fails.
#[derive(thiserror::Error, Debug)]
#[error("result store interaction failed : {0}")]
pub struct PersistError(#[from] tokio_postgres::Error);

/// Check whether the given participant id exists in the users database.
pub async fn participant_exists(
    db_client: &tokio_postgres::Client,
    participant_id: i64,
) -> Result<bool, PersistError> {
    let row = db_client
        .query_opt(
            "select 1 from player_account where id = $1",
            &[&participant_id],
        )
        .await?;
    Ok(row.is_some())
}

/// Try to write the match outcome to the database. Errors here are database errors - this is hard.
pub async fn report_match_result(
    db_client: &tokio_postgres::Client,
    seed: &MatchSeed,
    winner: Side,
    scores: [u32; 2],
    finished_at: SystemTime,
) -> Result<(), PersistError> {
    let winner_id = match winner {
        Side::Left => seed.player1_id,
        Side::Right => seed.player2_id,
    };
    let parameters: [&(dyn ToSql + Sync); 5] = [
        &seed.external_id,
        &winner_id,
        &i16::try_from(scores[0]).expect("Score is beyond an i16."),
        &i16::try_from(scores[1]).expect("Score is beyond an i16."),
        &finished_at,
    ];
    db_client
        .execute(
            "insert \
             into match_result(external_id, winner_id, score_player1, score_player2, finished_at) \
             values($1, $2, $3, $4, $5);",
            &parameters,
        )
        .await?;
    Ok(())
}
