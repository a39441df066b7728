//! The predictor pipeline: from an utterance to a predicted delta.
//!
//! Prediction is a cascade of stages over a read-only [`Ruleset`]:
//!
//! ```text
//! Utterance (+ history) → Domain gate (keywords)
//!   → Pattern match per slot (rules in precedence order)
//!     → Fallback cues (when no pattern matched)
//!       → Normalize + ontology check
//!         → Rank (confidence desc, slot asc) → Exclusion filter → delta
//! ```
//!
//! 1. **Domain gate.** A slot is only considered when its domain has at
//!    least one indicative keyword in the utterance or in the last
//!    `history_window` utterances.
//! 2. **Pattern match.** A slot's rules are tried best first; the first one
//!    that extracts a plausible span wins and scores the rule's confidence.
//! 3. **Fallback.** With no pattern match, the single-token cue table may
//!    still locate a value. Its score is the cue's share of mentions scaled
//!    by `fallback_weight`.
//! 4. **Normalization.** The span is lowercased and trimmed; enumerated
//!    slots reject values outside the ontology.
//! 5. **Exclusion filter.** For every learned exclusion pair present among
//!    the candidates, the lower-ranked member is dropped.
//!
//! An utterance that nothing matches yields an empty delta, never an error.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::Range;

use serde::Serialize;

use crate::accumulate::BeliefStateAccumulator;
use crate::belief::BeliefState;
use crate::config::PredictorConfig;
use crate::corpus::{Dialogue, Turn};
use crate::diff::{SlotError, diff_states};
use crate::input::Utterance;
use crate::ontology::Ontology;
use crate::report::BatchReport;
use crate::ruleset::{ContextPattern, Ruleset};
use crate::score::{Confidence, MatchSource};
use crate::slot::{SlotId, Value};
use crate::span::{match_cues, match_pattern};
use crate::token::{Token, token_values, tokenize};

/// A candidate value for one slot, before the exclusion filter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub slot: SlotId,
    pub value: Value,
    pub confidence: Confidence,
    pub source: MatchSource,
    /// The rule that matched, for pattern candidates.
    pub pattern: Option<ContextPattern>,
    /// Token positions of the value in the utterance.
    pub token_range: Range<usize>,
}

impl Candidate {
    /// Confidence desc, then slot asc.
    pub fn rank(&self, other: &Candidate) -> std::cmp::Ordering {
        self.confidence
            .rank(&other.confidence)
            .then_with(|| self.slot.cmp(&other.slot))
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={} ({:.2}", self.slot, self.value, self.confidence.value())?;
        match &self.pattern {
            Some(pattern) => write!(f, ", `{pattern}`)"),
            None => write!(f, ", fallback)"),
        }
    }
}

/// One predicted user turn paired with its ground truth.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub dialogue_id: String,
    pub turn_id: usize,
    pub predicted: BeliefState,
    pub ground_truth: BeliefState,
    pub errors: Vec<SlotError>,
}

/// The output of a prediction pass over a split.
#[derive(Debug, Clone, Default)]
pub struct Inference {
    /// Predicted dialogues: each turn carries the predicted delta and the
    /// accumulated predicted state.
    pub dialogues: Vec<Dialogue>,
    pub predictions: Vec<Prediction>,
    pub report: BatchReport,
}

/// Applies a learned [`Ruleset`] to utterances.
#[derive(Debug, Clone)]
pub struct RuleBasedPredictor {
    ruleset: Ruleset,
    config: PredictorConfig,
    ontology: Option<Ontology>,
    slots: Vec<SlotId>,
    domain_keywords: Vec<(String, BTreeSet<String>)>,
}

impl RuleBasedPredictor {
    pub fn new(ruleset: Ruleset, config: PredictorConfig) -> Self {
        let slots = ruleset.slots().into_iter().cloned().collect();
        let domain_keywords = ruleset.domain_keywords().into_iter().collect();
        RuleBasedPredictor {
            ruleset,
            config,
            ontology: None,
            slots,
            domain_keywords,
        }
    }

    /// Validate extracted values against an ontology.
    pub fn with_ontology(mut self, ontology: Ontology) -> Self {
        self.ontology = Some(ontology);
        self
    }

    pub fn ruleset(&self) -> &Ruleset {
        &self.ruleset
    }

    pub fn config(&self) -> &PredictorConfig {
        &self.config
    }

    /// Domains with an indicative keyword in the utterance or its recent
    /// history.
    pub fn open_domains(&self, utterance: &Utterance) -> BTreeSet<&str> {
        let words: BTreeSet<String> = utterance
            .gate_texts(self.config.history_window)
            .flat_map(token_values)
            .collect();

        self.domain_keywords
            .iter()
            .filter(|(_, keywords)| keywords.iter().any(|keyword| words.contains(keyword)))
            .map(|(domain, _)| domain.as_str())
            .collect()
    }

    /// Every slot value the rules extract, ranked, before the exclusion
    /// filter.
    pub fn candidates(&self, utterance: &Utterance) -> Vec<Candidate> {
        let open = self.open_domains(utterance);
        if open.is_empty() {
            return Vec::new();
        }

        let tokens = tokenize(&utterance.text);
        let mut candidates: Vec<Candidate> = self
            .slots
            .iter()
            .filter(|slot| open.contains(slot.domain()))
            .filter_map(|slot| self.extract(slot, &tokens))
            .collect();
        candidates.sort_by(Candidate::rank);
        candidates
    }

    fn extract(&self, slot: &SlotId, tokens: &[Token]) -> Option<Candidate> {
        let max_tokens = self.config.max_value_tokens;

        for rule in self.ruleset.rules_for(slot) {
            let Some(span) = match_pattern(tokens, &rule.pattern, max_tokens) else {
                continue;
            };
            if let Some(value) = self.accept(slot, &span.text) {
                return Some(Candidate {
                    slot: slot.clone(),
                    value,
                    confidence: Confidence::new(rule.confidence),
                    source: MatchSource::Pattern,
                    pattern: Some(rule.pattern.clone()),
                    token_range: span.token_range,
                });
            }
        }

        let cues = self.ruleset.cues_for(slot)?;
        let found = match_cues(tokens, cues, max_tokens, &self.config.stop_words)?;
        let value = self.accept(slot, &found.span.text)?;
        Some(Candidate {
            slot: slot.clone(),
            value,
            confidence: Confidence::new(self.config.fallback_weight * cues.weight(found.count)),
            source: MatchSource::Fallback,
            pattern: None,
            token_range: found.span.token_range,
        })
    }

    fn accept(&self, slot: &SlotId, text: &str) -> Option<Value> {
        let value = Value::parse(&text.trim().to_lowercase())?;
        match &self.ontology {
            Some(ontology) if !ontology.permits(slot, value.as_str()) => {
                tracing::trace!(%slot, value = value.as_str(), "value outside ontology");
                None
            }
            Some(ontology) => Some(ontology.classify(slot, value)),
            None => Some(value),
        }
    }

    /// Drop the lower-ranked member of every exclusive pair. `candidates`
    /// must already be ranked.
    pub fn apply_exclusions(&self, candidates: Vec<Candidate>) -> Vec<Candidate> {
        let mut dropped = vec![false; candidates.len()];
        for (i, kept) in candidates.iter().enumerate() {
            for (j, other) in candidates.iter().enumerate().skip(i + 1) {
                if self.ruleset.is_exclusive(&kept.slot, &other.slot) {
                    tracing::debug!(kept = %kept.slot, dropped = %other.slot, "exclusive slots");
                    dropped[j] = true;
                }
            }
        }

        candidates
            .into_iter()
            .zip(dropped)
            .filter_map(|(candidate, dropped)| (!dropped).then_some(candidate))
            .collect()
    }

    /// The slot values this utterance sets.
    pub fn predict(&self, utterance: &Utterance) -> BeliefState {
        self.apply_exclusions(self.candidates(utterance))
            .into_iter()
            .map(|candidate| (candidate.slot, candidate.value))
            .collect()
    }

    /// Predict every user turn of a dialogue. Earlier user utterances feed
    /// the domain gate, and values already in the predicted state are not
    /// repeated in a turn's delta.
    pub fn predict_dialogue(&self, dialogue: &Dialogue) -> Dialogue {
        let mut accumulator = BeliefStateAccumulator::new();
        let mut history: Vec<String> = Vec::new();

        let turns = dialogue
            .turns
            .iter()
            .map(|turn| {
                let delta = if turn.is_user() {
                    let utterance = Utterance::new(turn.utterance.as_str())
                        .with_history(history.iter().cloned());
                    history.push(turn.utterance.clone());
                    accumulator.observe(Some(&self.predict(&utterance)))
                } else {
                    BeliefState::new()
                };
                Turn {
                    turn_id: turn.turn_id,
                    speaker: turn.speaker,
                    utterance: turn.utterance.clone(),
                    belief_state: accumulator.accumulated().clone(),
                    belief_state_delta: delta,
                    system_response: turn.system_response.clone(),
                }
            })
            .collect();

        Dialogue {
            dialogue_id: dialogue.dialogue_id.clone(),
            domains: dialogue.domains.clone(),
            turns,
        }
    }

    /// Predict a whole split. Invalid dialogues are reported and skipped.
    pub fn predict_corpus(&self, dialogues: &[Dialogue]) -> Inference {
        let mut inference = Inference::default();

        for dialogue in dialogues {
            if let Err(error) = dialogue.validate() {
                inference.report.skip(&dialogue.dialogue_id, error);
                continue;
            }

            let predicted = self.predict_dialogue(dialogue);
            for (predicted_turn, truth) in predicted.turns.iter().zip(&dialogue.turns) {
                if !truth.is_user() {
                    continue;
                }
                inference.predictions.push(Prediction {
                    dialogue_id: dialogue.dialogue_id.clone(),
                    turn_id: truth.turn_id,
                    errors: diff_states(
                        &predicted_turn.belief_state_delta,
                        &truth.belief_state_delta,
                    ),
                    predicted: predicted_turn.belief_state_delta.clone(),
                    ground_truth: truth.belief_state_delta.clone(),
                });
            }
            inference.dialogues.push(predicted);
            inference.report.processed += 1;
        }

        let predicted_slots: usize = inference.predictions.iter().map(|p| p.predicted.len()).sum();
        tracing::info!(
            dialogues = inference.report.processed,
            skipped = inference.report.skipped.len(),
            turns = inference.predictions.len(),
            predicted_slots,
            "predicted split"
        );
        inference
    }
}
