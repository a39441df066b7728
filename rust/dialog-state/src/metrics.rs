//! Streaming dialogue-state-tracking metrics.
//!
//! [`DstMetrics::update`] is called once per evaluated turn with the
//! predicted and ground-truth states. All counters are plain sums, so two
//! aggregators fed disjoint turns can be [merged](DstMetrics::merge).
//!
//! - **Joint goal accuracy**: turns whose predicted state equals the ground
//!   truth exactly, extra keys included.
//! - **Slot accuracy**: over the union of slots on both sides, the share
//!   where presence and value agree.
//! - **Precision / recall / F1**: a predicted slot with the right value is a
//!   true positive; a predicted slot that is absent or different in the
//!   ground truth is a false positive; a ground-truth slot the prediction
//!   lacks is a false negative.
//!
//! Every ratio is exactly `0.0` when its denominator is zero.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::belief::BeliefState;
use crate::slot::SlotId;

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DstMetrics {
    total_turns: usize,
    correct_joint_goals: usize,
    correct_slots: usize,
    total_slots: usize,
    slot_correct: BTreeMap<SlotId, usize>,
    slot_total: BTreeMap<SlotId, usize>,
    true_positives: usize,
    false_positives: usize,
    false_negatives: usize,
}

impl DstMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn update(&mut self, predicted: &BeliefState, ground_truth: &BeliefState) {
        self.total_turns += 1;
        if predicted == ground_truth {
            self.correct_joint_goals += 1;
        }

        let slots: BTreeSet<&SlotId> = predicted.slots().chain(ground_truth.slots()).collect();
        for slot in slots {
            *self.slot_total.entry(slot.clone()).or_default() += 1;
            self.total_slots += 1;
            if predicted.get(slot) == ground_truth.get(slot) {
                *self.slot_correct.entry(slot.clone()).or_default() += 1;
                self.correct_slots += 1;
            }
        }

        for (slot, value) in predicted {
            match ground_truth.get(slot) {
                Some(truth) if truth == value => self.true_positives += 1,
                _ => self.false_positives += 1,
            }
        }
        self.false_negatives += ground_truth
            .slots()
            .filter(|slot| !predicted.contains(slot))
            .count();
    }

    pub fn merge(&mut self, other: &DstMetrics) {
        self.total_turns += other.total_turns;
        self.correct_joint_goals += other.correct_joint_goals;
        self.correct_slots += other.correct_slots;
        self.total_slots += other.total_slots;
        for (slot, count) in &other.slot_correct {
            *self.slot_correct.entry(slot.clone()).or_default() += count;
        }
        for (slot, count) in &other.slot_total {
            *self.slot_total.entry(slot.clone()).or_default() += count;
        }
        self.true_positives += other.true_positives;
        self.false_positives += other.false_positives;
        self.false_negatives += other.false_negatives;
    }

    pub fn total_turns(&self) -> usize {
        self.total_turns
    }

    /// Turns predicted exactly right.
    pub fn perfect_turns(&self) -> usize {
        self.correct_joint_goals
    }

    pub fn true_positives(&self) -> usize {
        self.true_positives
    }

    pub fn false_positives(&self) -> usize {
        self.false_positives
    }

    pub fn false_negatives(&self) -> usize {
        self.false_negatives
    }

    /// `(correct, total)` comparisons recorded for one slot.
    pub fn slot_counts(&self, slot: &SlotId) -> (usize, usize) {
        (
            self.slot_correct.get(slot).copied().unwrap_or(0),
            self.slot_total.get(slot).copied().unwrap_or(0),
        )
    }

    pub fn joint_goal_accuracy(&self) -> f64 {
        ratio(self.correct_joint_goals, self.total_turns)
    }

    pub fn slot_accuracy(&self) -> f64 {
        ratio(self.correct_slots, self.total_slots)
    }

    pub fn precision(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_positives)
    }

    pub fn recall(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_negatives)
    }

    pub fn f1_score(&self) -> f64 {
        let precision = self.precision();
        let recall = self.recall();
        if precision + recall == 0.0 {
            0.0
        } else if precision == recall {
            precision
        } else {
            2.0 * precision * recall / (precision + recall)
        }
    }

    pub fn per_slot_accuracy(&self) -> BTreeMap<SlotId, f64> {
        self.slot_total
            .iter()
            .map(|(slot, total)| {
                let correct = self.slot_correct.get(slot).copied().unwrap_or(0);
                (slot.clone(), ratio(correct, *total))
            })
            .collect()
    }

    /// The `k` lowest-accuracy slots, ties broken by slot name.
    pub fn worst_slots(&self, k: usize) -> Vec<SlotAccuracy> {
        let mut rows: Vec<SlotAccuracy> = self
            .slot_total
            .iter()
            .map(|(slot, total)| {
                let correct = self.slot_correct.get(slot).copied().unwrap_or(0);
                SlotAccuracy {
                    slot: slot.clone(),
                    correct,
                    total: *total,
                    accuracy: ratio(correct, *total),
                }
            })
            .collect();
        rows.sort_by(|a, b| a.accuracy.total_cmp(&b.accuracy).then_with(|| a.slot.cmp(&b.slot)));
        rows.truncate(k);
        rows
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_turns: self.total_turns,
            joint_goal_accuracy: self.joint_goal_accuracy(),
            slot_accuracy: self.slot_accuracy(),
            precision: self.precision(),
            recall: self.recall(),
            f1_score: self.f1_score(),
            perfect_turns: self.perfect_turns(),
            perfect_turn_ratio: ratio(self.perfect_turns(), self.total_turns),
            per_slot_accuracy: self.per_slot_accuracy(),
        }
    }
}

/// One row of the worst-slot report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotAccuracy {
    pub slot: SlotId,
    pub correct: usize,
    pub total: usize,
    pub accuracy: f64,
}

/// The persisted metrics document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub total_turns: usize,
    pub joint_goal_accuracy: f64,
    pub slot_accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub perfect_turns: usize,
    pub perfect_turn_ratio: f64,
    pub per_slot_accuracy: BTreeMap<SlotId, f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DialogStateError;
    use pretty_assertions::assert_eq;
    use testresult::TestResult;

    fn state(pairs: &[(&str, &str)]) -> Result<BeliefState, DialogStateError> {
        BeliefState::from_pairs(pairs.iter().copied())
    }

    #[test]
    fn exact_match_is_a_joint_goal() -> TestResult {
        let mut metrics = DstMetrics::new();
        let truth = state(&[("hotel-name", "a and b guest house")])?;
        metrics.update(&truth.clone(), &truth);

        assert_eq!(metrics.joint_goal_accuracy(), 1.0);
        assert_eq!(metrics.true_positives(), 1);
        assert_eq!(metrics.slot_accuracy(), 1.0);
        assert_eq!(metrics.f1_score(), 1.0);
        Ok(())
    }

    #[test]
    fn spurious_slot_is_a_false_positive() -> TestResult {
        let mut metrics = DstMetrics::new();
        metrics.update(&state(&[("hotel-area", "east")])?, &BeliefState::new());

        assert_eq!(metrics.false_positives(), 1);
        assert_eq!(metrics.joint_goal_accuracy(), 0.0);
        assert_eq!(metrics.slot_counts(&SlotId::parse("hotel-area")?), (0, 1));
        assert_eq!(metrics.precision(), 0.0);
        assert_eq!(metrics.recall(), 0.0);
        Ok(())
    }

    #[test]
    fn missed_slot_is_a_false_negative() -> TestResult {
        let mut metrics = DstMetrics::new();
        metrics.update(&BeliefState::new(), &state(&[("train-day", "monday")])?);

        assert_eq!(metrics.false_negatives(), 1);
        assert_eq!(metrics.joint_goal_accuracy(), 0.0);
        Ok(())
    }

    #[test]
    fn wrong_value_counts_only_as_false_positive() -> TestResult {
        let mut metrics = DstMetrics::new();
        metrics.update(&state(&[("hotel-area", "east")])?, &state(&[("hotel-area", "west")])?);

        assert_eq!(metrics.false_positives(), 1);
        assert_eq!(metrics.false_negatives(), 0);
        assert_eq!(metrics.slot_accuracy(), 0.0);
        Ok(())
    }

    #[test]
    fn empty_aggregator_reports_zeros() {
        let summary = DstMetrics::new().summary();
        assert_eq!(summary.total_turns, 0);
        assert_eq!(summary.joint_goal_accuracy, 0.0);
        assert_eq!(summary.slot_accuracy, 0.0);
        assert_eq!(summary.f1_score, 0.0);
        assert_eq!(summary.perfect_turn_ratio, 0.0);
        assert!(summary.per_slot_accuracy.is_empty());
    }

    #[test]
    fn two_empty_states_agree() {
        let mut metrics = DstMetrics::new();
        metrics.update(&BeliefState::new(), &BeliefState::new());
        assert_eq!(metrics.joint_goal_accuracy(), 1.0);
        assert_eq!(metrics.slot_accuracy(), 0.0);
    }

    #[test]
    fn f1_equals_precision_when_recall_matches() -> TestResult {
        let mut metrics = DstMetrics::new();
        for _ in 0..3 {
            metrics.update(&state(&[("hotel-area", "east")])?, &state(&[("hotel-area", "east")])?);
        }
        for _ in 0..7 {
            metrics.update(&state(&[("hotel-stars", "4")])?, &state(&[("hotel-parking", "yes")])?);
        }
        assert_eq!(metrics.precision(), metrics.recall());
        assert_eq!(metrics.f1_score(), metrics.precision());
        Ok(())
    }

    #[test]
    fn worst_slots_sort_ascending_with_name_tiebreak() -> TestResult {
        let mut metrics = DstMetrics::new();
        metrics.update(&state(&[("hotel-area", "east")])?, &state(&[("hotel-area", "east")])?);
        metrics.update(&state(&[("train-day", "monday")])?, &state(&[("train-day", "friday")])?);
        metrics.update(&BeliefState::new(), &state(&[("hotel-stars", "4")])?);

        let worst: Vec<(String, f64)> = metrics
            .worst_slots(2)
            .into_iter()
            .map(|row| (row.slot.to_string(), row.accuracy))
            .collect();
        assert_eq!(worst, vec![("hotel-stars".into(), 0.0), ("train-day".into(), 0.0)]);
        Ok(())
    }

    #[test]
    fn merge_equals_sequential_updates() -> TestResult {
        let turns = [
            (state(&[("hotel-area", "east")])?, state(&[("hotel-area", "east")])?),
            (state(&[("hotel-area", "west")])?, state(&[("hotel-area", "east")])?),
            (BeliefState::new(), state(&[("train-day", "monday")])?),
        ];
        let mut whole = DstMetrics::new();
        let mut left = DstMetrics::new();
        let mut right = DstMetrics::new();
        for (index, (predicted, truth)) in turns.iter().enumerate() {
            whole.update(predicted, truth);
            if index == 0 {
                left.update(predicted, truth);
            } else {
                right.update(predicted, truth);
            }
        }
        left.merge(&right);
        assert_eq!(left, whole);
        Ok(())
    }

    #[test]
    fn ratios_stay_in_unit_interval() -> TestResult {
        let mut metrics = DstMetrics::new();
        let predicted = state(&[("hotel-area", "east"), ("hotel-stars", "4")])?;
        metrics.update(&predicted, &state(&[("hotel-area", "east")])?);
        let missed = state(&[("train-day", "monday"), ("train-arriveby", "10:00")])?;
        metrics.update(&BeliefState::new(), &missed);
        let summary = metrics.summary();
        for value in [
            summary.joint_goal_accuracy,
            summary.slot_accuracy,
            summary.precision,
            summary.recall,
            summary.f1_score,
        ] {
            assert!((0.0..=1.0).contains(&value));
        }
        Ok(())
    }
}
