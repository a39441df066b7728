//! Turning full belief-state snapshots into per-turn deltas.
//!
//! The corpus annotates each turn with the complete belief state as of that
//! turn. What a tracker has to predict is only what changed, so the
//! accumulator walks a dialogue's snapshots in order and keeps a running
//! union of everything seen so far:
//!
//! ```text
//! delta(t)       = { s:v ∈ snapshot(t) | accumulated(t-1)[s] != v }
//! accumulated(t) = accumulated(t-1) ∪ snapshot(t)      (snapshot wins)
//! ```
//!
//! A slot that vanishes from a later snapshot stays in the accumulated state;
//! only an explicit new value replaces it. A missing snapshot is treated as an
//! empty one.

use crate::belief::BeliefState;
use crate::corpus::Dialogue;

#[derive(Debug, Clone, Default)]
pub struct BeliefStateAccumulator {
    accumulated: BeliefState,
}

/// The delta produced for one turn and the accumulated state after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnState {
    pub delta: BeliefState,
    pub accumulated: BeliefState,
}

impl BeliefStateAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold the next snapshot in and return the turn's delta.
    pub fn observe(&mut self, snapshot: Option<&BeliefState>) -> BeliefState {
        let Some(snapshot) = snapshot else {
            return BeliefState::new();
        };
        let delta = snapshot.changed_since(&self.accumulated);
        self.accumulated.merge_from(snapshot);
        delta
    }

    pub fn accumulated(&self) -> &BeliefState {
        &self.accumulated
    }

    pub fn reset(&mut self) {
        self.accumulated = BeliefState::new();
    }
}

/// Replay an ordered snapshot sequence.
pub fn accumulate<'a, I>(snapshots: I) -> Vec<TurnState>
where
    I: IntoIterator<Item = Option<&'a BeliefState>>,
{
    let mut accumulator = BeliefStateAccumulator::new();
    snapshots
        .into_iter()
        .map(|snapshot| {
            let delta = accumulator.observe(snapshot);
            TurnState {
                delta,
                accumulated: accumulator.accumulated().clone(),
            }
        })
        .collect()
}

/// Recompute every turn's `belief_state_delta` from its `belief_state`.
pub fn annotate_deltas(dialogue: &mut Dialogue) {
    let mut accumulator = BeliefStateAccumulator::new();
    for turn in &mut dialogue.turns {
        turn.belief_state_delta = accumulator.observe(Some(&turn.belief_state));
    }
}
