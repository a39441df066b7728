//! Prediction diffs for offline review.
//!
//! [`PredictionDiffRecorder`] joins predicted dialogues with their ground
//! truth by `dialogue_id` and compares turns positionally, up to the shorter
//! of the two turn lists. Dialogues whose turn counts diverge are still
//! compared that way; the document records both counts so inspection tooling
//! can spot them.
//!
//! Each compared turn carries its per-slot errors:
//!
//! | kind             | predicted | ground truth |
//! |------------------|-----------|--------------|
//! | `missing`        | absent    | present      |
//! | `false_positive` | present   | absent       |
//! | `incorrect`      | present   | present, different value |
//!
//! The diff document is for humans and inspection tools. Metrics come from
//! the [`Evaluator`](crate::evaluate::Evaluator).

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::belief::BeliefState;
use crate::corpus::{Dialogue, StateField};
use crate::error::DialogStateError;
use crate::slot::{Domain, SlotId, Value};

const TOP_ERROR_SLOTS: usize = 20;
const TOP_CONFUSIONS: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Missing,
    FalsePositive,
    Incorrect,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotError {
    pub slot: SlotId,
    pub predicted: Option<Value>,
    pub ground_truth: Option<Value>,
    pub error_type: ErrorKind,
}

/// Every slot on which the two states disagree, in slot order.
pub fn diff_states(predicted: &BeliefState, ground_truth: &BeliefState) -> Vec<SlotError> {
    let slots: BTreeSet<&SlotId> = predicted.slots().chain(ground_truth.slots()).collect();

    slots
        .into_iter()
        .filter_map(|slot| {
            let error_type = match (predicted.get(slot), ground_truth.get(slot)) {
                (None, Some(_)) => ErrorKind::Missing,
                (Some(_), None) => ErrorKind::FalsePositive,
                (Some(p), Some(g)) if p != g => ErrorKind::Incorrect,
                _ => return None,
            };
            Some(SlotError {
                slot: slot.clone(),
                predicted: predicted.get(slot).cloned(),
                ground_truth: ground_truth.get(slot).cloned(),
                error_type,
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnDiff {
    pub turn_id: usize,
    pub utterance: String,
    pub predicted_state: BeliefState,
    pub ground_truth_state: BeliefState,
    pub is_correct: bool,
    pub errors: Vec<SlotError>,
    pub num_errors: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueDiff {
    pub dialogue_id: String,
    pub domains: BTreeSet<Domain>,
    pub predicted_turns: usize,
    pub ground_truth_turns: usize,
    pub turns: Vec<TurnDiff>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffDocument {
    pub metadata: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    pub total_dialogues: usize,
    pub predictions: Vec<DialogueDiff>,
}

impl DiffDocument {
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), DialogStateError> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|error| DialogStateError::io(path, error))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer
            .flush()
            .map_err(|error| DialogStateError::io(path, error))?;
        tracing::info!(
            path = %path.display(),
            dialogues = self.total_dialogues,
            "saved prediction diff"
        );
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, DialogStateError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|error| DialogStateError::io(path, error))?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    pub fn turns(&self) -> impl Iterator<Item = &TurnDiff> {
        self.predictions.iter().flat_map(|dialogue| dialogue.turns.iter())
    }

    /// Aggregate the recorded errors.
    pub fn error_analysis(&self) -> ErrorAnalysis {
        let mut analysis = ErrorAnalysis::default();
        let mut slot_errors: BTreeMap<&SlotId, usize> = BTreeMap::new();
        let mut confusions: BTreeMap<(&SlotId, &str, &str), usize> = BTreeMap::new();

        for turn in self.turns() {
            let compared = turn
                .predicted_state
                .slots()
                .chain(turn.ground_truth_state.slots())
                .collect::<BTreeSet<_>>()
                .len();
            analysis.total_errors += turn.errors.len();
            analysis.total_correct += compared.saturating_sub(turn.errors.len());

            for error in &turn.errors {
                *analysis.error_types.entry(error.error_type).or_default() += 1;
                *slot_errors.entry(&error.slot).or_default() += 1;
                if let (Some(predicted), Some(truth)) = (&error.predicted, &error.ground_truth) {
                    *confusions
                        .entry((&error.slot, predicted.as_str(), truth.as_str()))
                        .or_default() += 1;
                }
            }
        }

        let compared = analysis.total_correct + analysis.total_errors;
        analysis.accuracy = if compared == 0 {
            0.0
        } else {
            analysis.total_correct as f64 / compared as f64
        };

        let mut slot_errors: Vec<SlotErrorCount> = slot_errors
            .into_iter()
            .map(|(slot, count)| SlotErrorCount {
                slot: slot.clone(),
                count,
            })
            .collect();
        // stable sort keeps slot order among equal counts
        slot_errors.sort_by(|a, b| b.count.cmp(&a.count));
        slot_errors.truncate(TOP_ERROR_SLOTS);
        analysis.top_error_slots = slot_errors;

        let mut confusions: Vec<Confusion> = confusions
            .into_iter()
            .map(|((slot, predicted, ground_truth), count)| Confusion {
                slot: slot.clone(),
                predicted: predicted.to_string(),
                ground_truth: ground_truth.to_string(),
                count,
            })
            .collect();
        confusions.sort_by(|a, b| b.count.cmp(&a.count));
        confusions.truncate(TOP_CONFUSIONS);
        analysis.top_value_errors = confusions;

        analysis
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotErrorCount {
    pub slot: SlotId,
    pub count: usize,
}

/// A wrong value predicted in place of the right one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confusion {
    pub slot: SlotId,
    pub predicted: String,
    pub ground_truth: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorAnalysis {
    /// Slot comparisons on which prediction and ground truth agree.
    pub total_correct: usize,
    pub total_errors: usize,
    pub accuracy: f64,
    pub error_types: BTreeMap<ErrorKind, usize>,
    pub top_error_slots: Vec<SlotErrorCount>,
    pub top_value_errors: Vec<Confusion>,
}

/// Builds [`DiffDocument`]s with fixed run metadata.
#[derive(Debug, Clone, Default)]
pub struct PredictionDiffRecorder {
    metadata: serde_json::Value,
    field: StateField,
}

impl PredictionDiffRecorder {
    pub fn new(metadata: serde_json::Value) -> Self {
        PredictionDiffRecorder {
            metadata,
            field: StateField::default(),
        }
    }

    /// Compare `belief_state` instead of `belief_state_delta`, or back.
    pub fn with_field(mut self, field: StateField) -> Self {
        self.field = field;
        self
    }

    pub fn record(&self, predicted: &[Dialogue], ground_truth: &[Dialogue]) -> DiffDocument {
        self.record_at(predicted, ground_truth, Utc::now())
    }

    pub fn record_at(
        &self,
        predicted: &[Dialogue],
        ground_truth: &[Dialogue],
        timestamp: DateTime<Utc>,
    ) -> DiffDocument {
        let truth: BTreeMap<&str, &Dialogue> = ground_truth
            .iter()
            .map(|dialogue| (dialogue.dialogue_id.as_str(), dialogue))
            .collect();

        let predictions: Vec<DialogueDiff> = predicted
            .iter()
            .filter_map(|dialogue| match truth.get(dialogue.dialogue_id.as_str()) {
                Some(truth) => Some(self.diff_dialogue(dialogue, truth)),
                None => {
                    tracing::debug!(
                        dialogue_id = %dialogue.dialogue_id,
                        "no ground truth for dialogue"
                    );
                    None
                }
            })
            .collect();

        DiffDocument {
            metadata: self.metadata.clone(),
            timestamp,
            total_dialogues: predictions.len(),
            predictions,
        }
    }

    fn diff_dialogue(&self, predicted: &Dialogue, truth: &Dialogue) -> DialogueDiff {
        if predicted.turns.len() != truth.turns.len() {
            tracing::debug!(
                dialogue_id = %predicted.dialogue_id,
                predicted = predicted.turns.len(),
                ground_truth = truth.turns.len(),
                "turn counts differ, comparing positionally"
            );
        }

        let turns = predicted
            .turns
            .iter()
            .zip(&truth.turns)
            .filter(|(_, truth_turn)| truth_turn.is_user())
            .map(|(predicted_turn, truth_turn)| {
                let predicted_state = predicted_turn.state(self.field).clone();
                let ground_truth_state = truth_turn.state(self.field).clone();
                let errors = diff_states(&predicted_state, &ground_truth_state);
                TurnDiff {
                    turn_id: truth_turn.turn_id,
                    utterance: truth_turn.utterance.clone(),
                    is_correct: errors.is_empty(),
                    num_errors: errors.len(),
                    predicted_state,
                    ground_truth_state,
                    errors,
                }
            })
            .collect();

        DialogueDiff {
            dialogue_id: predicted.dialogue_id.clone(),
            domains: truth.domains.clone(),
            predicted_turns: predicted.turns.len(),
            ground_truth_turns: truth.turns.len(),
            turns,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::Turn;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use testresult::TestResult;

    fn state(pairs: &[(&str, &str)]) -> Result<BeliefState, DialogStateError> {
        BeliefState::from_pairs(pairs.iter().copied())
    }

    #[test]
    fn diff_classifies_each_disagreement() -> TestResult {
        let predicted = state(&[
            ("hotel-area", "east"),
            ("hotel-stars", "4"),
            ("hotel-name", "acorn"),
        ])?;
        let truth = state(&[
            ("hotel-area", "west"),
            ("hotel-name", "acorn"),
            ("hotel-parking", "yes"),
        ])?;

        let kinds: Vec<(String, ErrorKind)> = diff_states(&predicted, &truth)
            .into_iter()
            .map(|error| (error.slot.to_string(), error.error_type))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("hotel-area".to_string(), ErrorKind::Incorrect),
                ("hotel-parking".to_string(), ErrorKind::Missing),
                ("hotel-stars".to_string(), ErrorKind::FalsePositive),
            ]
        );
        Ok(())
    }

    #[test]
    fn error_kind_serializes_snake_case() -> TestResult {
        assert_eq!(serde_json::to_string(&ErrorKind::FalsePositive)?, "\"false_positive\"");
        Ok(())
    }

    fn dialogue(id: &str, deltas: &[&[(&str, &str)]]) -> Result<Dialogue, DialogStateError> {
        let mut dialogue = Dialogue::new(id).with_domain(Domain::Hotel);
        for (turn_id, delta) in deltas.iter().enumerate() {
            let turn = Turn::user(turn_id, format!("turn {turn_id}")).with_delta(state(delta)?);
            dialogue = dialogue.with_turn(turn);
        }
        Ok(dialogue)
    }

    #[test]
    fn record_joins_by_id_and_compares_positionally() -> TestResult {
        let predicted = vec![
            dialogue("b", &[&[("hotel-area", "east")]])?,
            dialogue("a", &[&[("hotel-area", "east")], &[], &[("hotel-stars", "4")]])?,
            dialogue("orphan", &[&[]])?,
        ];
        let truth = vec![
            dialogue("a", &[&[("hotel-area", "east")], &[("hotel-stars", "4")]])?,
            dialogue("b", &[&[("hotel-area", "west")]])?,
        ];
        let timestamp = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();

        let document = PredictionDiffRecorder::new(serde_json::json!({ "model": "rules" }))
            .record_at(&predicted, &truth, timestamp);

        assert_eq!(document.total_dialogues, 2);
        assert_eq!(document.predictions[0].dialogue_id, "b");
        let a = &document.predictions[1];
        assert_eq!((a.predicted_turns, a.ground_truth_turns), (3, 2));
        assert_eq!(a.turns.len(), 2);
        assert!(a.turns[0].is_correct);
        assert_eq!(a.turns[1].errors[0].error_type, ErrorKind::Missing);

        let json = serde_json::to_value(&document)?;
        assert_eq!(json["timestamp"], "2026-01-02T03:04:05Z");
        assert_eq!(json["metadata"]["model"], "rules");
        Ok(())
    }

    #[test]
    fn error_analysis_counts_kinds_slots_and_confusions() -> TestResult {
        let predicted = vec![
            dialogue("a", &[&[("hotel-area", "east")], &[("hotel-name", "acorn")]])?,
            dialogue("b", &[&[("hotel-area", "east"), ("hotel-stars", "4")]])?,
        ];
        let truth = vec![
            dialogue("a", &[&[("hotel-area", "west")], &[("hotel-name", "acorn")]])?,
            dialogue("b", &[&[("hotel-area", "west")]])?,
        ];
        let analysis = PredictionDiffRecorder::default()
            .record(&predicted, &truth)
            .error_analysis();

        assert_eq!(analysis.total_correct, 1);
        assert_eq!(analysis.total_errors, 3);
        assert_eq!(analysis.accuracy, 0.25);
        assert_eq!(analysis.error_types.get(&ErrorKind::Incorrect), Some(&2));
        assert_eq!(analysis.error_types.get(&ErrorKind::FalsePositive), Some(&1));
        assert_eq!(analysis.top_error_slots[0].slot.as_str(), "hotel-area");
        assert_eq!(analysis.top_error_slots[0].count, 2);
        assert_eq!(
            analysis.top_value_errors,
            vec![Confusion {
                slot: SlotId::parse("hotel-area")?,
                predicted: "east".into(),
                ground_truth: "west".into(),
                count: 2,
            }]
        );
        Ok(())
    }

    #[test]
    fn document_survives_save_and_load() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("predictions.json");
        let truth = vec![dialogue("a", &[&[("hotel-area", "west")]])?];
        let document = PredictionDiffRecorder::default().record(&truth, &truth);
        document.save(&path)?;
        assert_eq!(DiffDocument::load(&path)?, document);
        Ok(())
    }
}
