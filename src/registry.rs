//! Server-wide registry of running matches.
//!
//! Each match lives in its own task, reachable through an [`Arc<MatchHandle>`]. The registry maps
//! internal match ids to handles, answers the lookups the session layer needs, and periodically
//! sweeps finished matches out of the map through [`run_sweeper`].

use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use rand::distributions::{Alphanumeric, DistString};
use tokio::sync::{mpsc, oneshot};
use tokio::time::interval;

use crate::game::{self, JoinRequest, JoinedPlayer, MatchError, MatchSeed};
use crate::protocol::constants::REGISTRY_SWEEP_INTERVAL;
use crate::protocol::ServerEvent;

/// Server-internal identifier of one match, distinct from the external id clients request by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MatchId(String);

impl Display for MatchId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Shared surface of one match task : who plays in it, how to join it, and where it stands in its
/// lifespan.
pub struct MatchHandle {
    id: MatchId,
    external_id: String,
    player1_id: i64,
    player2_id: i64,
    join_tx: mpsc::Sender<JoinRequest>,
    started: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    connections: Mutex<Vec<String>>,
}

impl MatchHandle {
    /// Ask the match task to seat `participant_id` in its lobby. The match task answers with the
    /// assigned side and the move queue, or the reason it refused.
    pub async fn join(
        &self,
        participant_id: i64,
        connection_id: &str,
        outbound: mpsc::Sender<ServerEvent>,
    ) -> Result<JoinedPlayer, MatchError> {
        if self.is_finished() {
            return Err(MatchError::Closed);
        }
        if self.started.load(Ordering::Acquire) {
            return Err(MatchError::LobbyFull);
        }
        let (reply_tx, reply_rx) = oneshot::channel();
        let request = JoinRequest {
            participant_id,
            outbound,
            reply: reply_tx,
        };
        if self.join_tx.send(request).await.is_err() {
            // The lobby receiver is dropped once the match starts or dies.
            return Err(if self.started.load(Ordering::Acquire) {
                MatchError::LobbyFull
            } else {
                MatchError::Closed
            });
        }
        let joined = reply_rx.await.map_err(|_| MatchError::Closed)??;
        // The lock cannot panic as nothing in the guard's scope can panic.
        self.connections
            .lock()
            .unwrap()
            .push(String::from(connection_id));
        Ok(joined)
    }

    pub fn id(&self) -> &MatchId {
        &self.id
    }

    pub fn external_id(&self) -> &str {
        &self.external_id
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    pub fn has_participant(&self, participant_id: i64) -> bool {
        self.player1_id == participant_id || self.player2_id == participant_id
    }

    /// Forget a session's connection id once its pump has returned, so connection lookups stop
    /// reporting this match for a socket that no longer exists.
    pub fn leave(&self, connection_id: &str) {
        // The lock cannot panic as nothing in the guard's scope can panic.
        self.connections
            .lock()
            .unwrap()
            .retain(|c| c != connection_id);
    }

    pub fn has_connection(&self, connection_id: &str) -> bool {
        // The lock cannot panic as nothing in the guard's scope can panic.
        self.connections
            .lock()
            .unwrap()
            .iter()
            .any(|c| c == connection_id)
    }
}

/// The map of live matches. Lookups are linear scans : the match count stays small enough that a
/// secondary index per key would only add bookkeeping.
pub struct MatchRegistry {
    matches: Mutex<HashMap<MatchId, Arc<MatchHandle>>>,
}

impl MatchRegistry {
    pub fn new() -> MatchRegistry {
        MatchRegistry {
            matches: Mutex::new(HashMap::new()),
        }
    }

    /// Return the match registered under the seed's external id, creating and spawning it if no
    /// connection asked for it yet. Lookup and creation happen under one lock so two racing
    /// sessions agree on a single match.
    pub fn find_or_create(
        &self,
        seed: MatchSeed,
        db_client: Arc<tokio_postgres::Client>,
    ) -> Arc<MatchHandle> {
        // The lock cannot panic as nothing in the guard's scope can panic.
        let mut matches = self.matches.lock().unwrap();
        if let Some(handle) = matches
            .values()
            .find(|h| h.external_id == seed.external_id)
        {
            return Arc::clone(handle);
        }

        let mut id = MatchId(Alphanumeric.sample_string(&mut rand::thread_rng(), 8));
        while matches.contains_key(&id) {
            id = MatchId(Alphanumeric.sample_string(&mut rand::thread_rng(), 8));
        }

        let (join_tx, join_rx) = mpsc::channel(4);
        let started = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));
        let handle = Arc::new(MatchHandle {
            id: id.clone(),
            external_id: seed.external_id.clone(),
            player1_id: seed.player1_id,
            player2_id: seed.player2_id,
            join_tx,
            started: Arc::clone(&started),
            finished: Arc::clone(&finished),
            connections: Mutex::new(Vec::new()),
        });
        log::info!("Match {id} created for external id {}.", seed.external_id);
        tokio::spawn(game::run_match(seed, join_rx, started, finished, db_client));
        matches.insert(id, Arc::clone(&handle));
        handle
    }

    pub fn find_by_match_id(&self, id: &MatchId) -> Option<Arc<MatchHandle>> {
        // The lock cannot panic as nothing in the guard's scope can panic.
        self.matches.lock().unwrap().get(id).map(Arc::clone)
    }

    /// Session-facing lookup : finished matches awaiting the sweep are invisible, so a player
    /// whose match just ended is immediately free to enter a new one.
    pub fn find_by_participant(&self, participant_id: i64) -> Option<Arc<MatchHandle>> {
        // The lock cannot panic as nothing in the guard's scope can panic.
        self.matches
            .lock()
            .unwrap()
            .values()
            .find(|h| !h.is_finished() && h.has_participant(participant_id))
            .map(Arc::clone)
    }

    /// Session-facing lookup, with the same finished-match filter as [`Self::find_by_participant`].
    pub fn find_by_connection(&self, connection_id: &str) -> Option<Arc<MatchHandle>> {
        // The lock cannot panic as nothing in the guard's scope can panic.
        self.matches
            .lock()
            .unwrap()
            .values()
            .find(|h| !h.is_finished() && h.has_connection(connection_id))
            .map(Arc::clone)
    }

    /// Drop every finished match from the map and return how many were removed.
    pub fn sweep(&self) -> usize {
        // The lock cannot panic as nothing in the guard's scope can panic.
        let mut matches = self.matches.lock().unwrap();
        let before = matches.len();
        matches.retain(|_, handle| !handle.is_finished());
        before - matches.len()
    }
}

/// Periodically remove finished matches from the registry. Runs until the owning task set is shut
/// down.
pub async fn run_sweeper(registry: Arc<MatchRegistry>) {
    let mut ticker = interval(REGISTRY_SWEEP_INTERVAL);
    loop {
        ticker.tick().await;
        let removed = registry.sweep();
        if removed != 0 {
            log::debug!("Swept {removed} finished match(es) from the registry.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Side;

    fn test_handle(
        external_id: &str,
        players: [i64; 2],
        finished: bool,
    ) -> (Arc<MatchHandle>, mpsc::Receiver<JoinRequest>) {
        let (join_tx, join_rx) = mpsc::channel(4);
        let handle = Arc::new(MatchHandle {
            id: MatchId(String::from(external_id)),
            external_id: String::from(external_id),
            player1_id: players[0],
            player2_id: players[1],
            join_tx,
            started: Arc::new(AtomicBool::new(false)),
            finished: Arc::new(AtomicBool::new(finished)),
            connections: Mutex::new(Vec::new()),
        });
        (handle, join_rx)
    }

    fn registry_of(handles: &[&Arc<MatchHandle>]) -> MatchRegistry {
        let registry = MatchRegistry::new();
        {
            let mut matches = registry.matches.lock().unwrap();
            for handle in handles {
                matches.insert((*handle).id.clone(), Arc::clone(handle));
            }
        }
        registry
    }

    #[test]
    fn lookups_find_the_right_match() {
        let (h1, _rx1) = test_handle("alpha", [1, 2], false);
        let (h2, _rx2) = test_handle("beta", [3, 4], false);
        let registry = registry_of(&[&h1, &h2]);

        assert!(Arc::ptr_eq(&registry.find_by_participant(3).unwrap(), &h2));
        assert!(Arc::ptr_eq(&registry.find_by_match_id(h1.id()).unwrap(), &h1));
        assert!(Arc::ptr_eq(
            &registry.find_by_participant(1).unwrap(),
            &registry.find_by_participant(2).unwrap()
        ));
        assert!(registry.find_by_participant(5).is_none());

        h1.connections.lock().unwrap().push(String::from("conn-a"));
        assert!(Arc::ptr_eq(&registry.find_by_connection("conn-a").unwrap(), &h1));
        assert!(registry.find_by_connection("conn-b").is_none());
    }

    #[test]
    fn sweep_removes_only_finished_matches() {
        let (live, _rx1) = test_handle("alpha", [1, 2], false);
        let (done, _rx2) = test_handle("beta", [3, 4], true);
        let registry = registry_of(&[&live, &done]);

        assert_eq!(registry.sweep(), 1);
        assert!(registry.find_by_match_id(live.id()).is_some());
        assert!(registry.find_by_match_id(done.id()).is_none());
        assert_eq!(registry.sweep(), 0);
    }

    #[test]
    fn finished_matches_are_invisible_to_session_lookups() {
        let (done, _rx) = test_handle("beta", [3, 4], true);
        done.connections.lock().unwrap().push(String::from("conn-a"));
        let registry = registry_of(&[&done]);

        // Still registered until the sweep, but no longer anyone's current match.
        assert!(registry.find_by_match_id(done.id()).is_some());
        assert!(registry.find_by_participant(3).is_none());
        assert!(registry.find_by_connection("conn-a").is_none());
    }

    #[tokio::test]
    async fn join_relays_the_lobby_answer_and_records_the_connection() {
        let (handle, mut join_rx) = test_handle("alpha", [1, 2], false);
        let lobby = tokio::spawn(async move {
            let request = join_rx.recv().await.unwrap();
            assert_eq!(request.participant_id, 1);
            let (input_tx, input_rx) = mpsc::channel(8);
            request
                .reply
                .send(Ok(JoinedPlayer {
                    side: Side::Left,
                    input: input_tx,
                }))
                .unwrap();
            input_rx
        });

        let (outbound_tx, _outbound_rx) = mpsc::channel(8);
        let joined = handle.join(1, "conn-a", outbound_tx).await.unwrap();
        assert_eq!(joined.side, Side::Left);
        assert!(handle.has_connection("conn-a"));
        lobby.await.unwrap();

        handle.leave("conn-a");
        assert!(!handle.has_connection("conn-a"));
    }

    #[tokio::test]
    async fn join_refuses_started_and_finished_matches() {
        let (handle, _join_rx) = test_handle("alpha", [1, 2], false);
        handle.started.store(true, Ordering::Release);
        let (outbound_tx, _outbound_rx) = mpsc::channel(8);
        match handle.join(1, "conn-a", outbound_tx).await {
            Err(MatchError::LobbyFull) => {}
            other => panic!("expected a full lobby, got {other:?}"),
        }

        let (handle, _join_rx) = test_handle("beta", [3, 4], true);
        let (outbound_tx, _outbound_rx) = mpsc::channel(8);
        match handle.join(1, "conn-a", outbound_tx).await {
            Err(MatchError::Closed) => {}
            other => panic!("expected a closed match, got {other:?}"),
        }
    }
}
