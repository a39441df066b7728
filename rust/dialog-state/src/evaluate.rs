//! Drive [`DstMetrics`] over predicted and ground-truth dialogues.

use std::collections::BTreeMap;

use crate::corpus::{Dialogue, StateField, Turn};
use crate::metrics::{DstMetrics, MetricsSummary};
use crate::predict::Prediction;

/// Feeds turn pairs into a [`DstMetrics`] aggregator.
///
/// Dialogues are joined by id and their turns compared positionally; only
/// turns the ground truth marks as user turns are scored. The compared
/// state is `belief_state_delta` unless [`with_field`](Self::with_field)
/// says otherwise.
#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    metrics: DstMetrics,
    field: StateField,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, field: StateField) -> Self {
        self.field = field;
        self
    }

    pub fn metrics(&self) -> &DstMetrics {
        &self.metrics
    }

    pub fn into_metrics(self) -> DstMetrics {
        self.metrics
    }

    /// Score one dialogue's turns, up to the shorter of the two lists.
    pub fn evaluate_dialogue(&mut self, predicted: &[Turn], ground_truth: &[Turn]) {
        for (predicted, truth) in predicted.iter().zip(ground_truth) {
            if truth.is_user() {
                self.metrics
                    .update(predicted.state(self.field), truth.state(self.field));
            }
        }
    }

    /// Reset, then score every predicted dialogue that has ground truth.
    pub fn evaluate_dataset(
        &mut self,
        predicted: &[Dialogue],
        ground_truth: &[Dialogue],
    ) -> MetricsSummary {
        self.metrics.reset();
        let truth: BTreeMap<&str, &Dialogue> = ground_truth
            .iter()
            .map(|dialogue| (dialogue.dialogue_id.as_str(), dialogue))
            .collect();

        let mut matched = 0;
        for dialogue in predicted {
            let Some(truth) = truth.get(dialogue.dialogue_id.as_str()) else {
                tracing::debug!(
                    dialogue_id = %dialogue.dialogue_id,
                    "no ground truth for dialogue"
                );
                continue;
            };
            if dialogue.turns.len() != truth.turns.len() {
                tracing::debug!(
                    dialogue_id = %dialogue.dialogue_id,
                    predicted = dialogue.turns.len(),
                    ground_truth = truth.turns.len(),
                    "turn counts differ, comparing positionally"
                );
            }
            self.evaluate_dialogue(&dialogue.turns, &truth.turns);
            matched += 1;
        }

        let summary = self.metrics.summary();
        tracing::info!(
            dialogues = matched,
            turns = summary.total_turns,
            joint_goal_accuracy = summary.joint_goal_accuracy,
            f1_score = summary.f1_score,
            "evaluated predictions"
        );
        summary
    }

    /// Reset, then score per-turn predictions directly.
    pub fn evaluate_predictions(&mut self, predictions: &[Prediction]) -> MetricsSummary {
        self.metrics.reset();
        for prediction in predictions {
            self.metrics.update(&prediction.predicted, &prediction.ground_truth);
        }
        self.metrics.summary()
    }
}
