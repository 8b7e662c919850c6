use std::time::SystemTime;

use crate::game::Side;

/// Terminal outcome of a match.
#[derive(Debug, Clone)]
pub enum MatchOutcome {
    /// One side reached the round target score.
    Completed {
        winner: Side,
        scores: [u32; 2],
        finished_at: SystemTime,
    },

    /// The two-player quota was not reached within the lobby timeout. The match never ran and
    /// there is nothing to report to the results store.
    TimedOut,
}
