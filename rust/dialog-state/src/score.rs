//! Confidence scores for extracted slot values.
//!
//! A pattern match scores the rule's confidence: its support over all literal
//! mentions of the slot in training. A fallback-cue match scores the cue's
//! share of those mentions, scaled down by the configured fallback weight, so
//! a weak cue rarely outranks a full pattern when an exclusion pair forces a
//! choice between two slots.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// A confidence score in the range [0.0, 1.0].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Confidence(pub f64);

impl Confidence {
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            return Confidence(0.0);
        }
        Confidence(value.clamp(0.0, 1.0))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Total order over scores, highest first.
    pub fn rank(&self, other: &Confidence) -> Ordering {
        other.0.total_cmp(&self.0)
    }
}

/// Where a candidate value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
    /// A full context pattern.
    Pattern,
    /// A single-token fallback cue.
    Fallback,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn confidence_is_clamped() {
        assert_eq!(Confidence::new(1.7), Confidence(1.0));
        assert_eq!(Confidence::new(-0.2), Confidence(0.0));
        assert_eq!(Confidence::new(f64::NAN), Confidence(0.0));
    }

    #[test]
    fn rank_puts_higher_scores_first() {
        let mut scores = vec![Confidence(0.6), Confidence(0.9), Confidence(0.75)];
        scores.sort_by(Confidence::rank);
        assert_eq!(scores, vec![Confidence(0.9), Confidence(0.75), Confidence(0.6)]);
    }
}
