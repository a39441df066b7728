//! # Dialog State: rule-based dialogue state tracking
//!
//! Tracks the user's goal across a task-oriented dialogue as a set of
//! `domain-slot → value` facts (`hotel-area → east`, `train-day → monday`),
//! using rules mined from a labeled corpus instead of a trained model.
//!
//! ## Core Ideas
//!
//! - **Deltas, not snapshots**: each turn is scored on what it changed. The
//!   [`BeliefStateAccumulator`] derives deltas from the corpus's cumulative
//!   snapshots and folds predicted deltas back into a running state.
//! - **Learning is counting**: [`RuleLearner`] makes one pass over the
//!   training turns, incrementing counters in a mergeable [`LearnerState`],
//!   and turns them into a read-only [`Ruleset`].
//! - **Prediction is a cascade**: [`RuleBasedPredictor`] gates slots by
//!   domain keywords, matches context patterns, falls back to single-token
//!   cues and finally drops mutually exclusive slots.
//! - **Deterministic everywhere**: every "most common" or "first match"
//!   choice has an explicit tie-break, and every table is ordered.
//!
//! ## Architecture
//!
//! ```text
//! Corpus → Accumulator → labeled turns → RuleLearner → Ruleset
//!   → RuleBasedPredictor (per user turn) → predicted deltas
//!     → Evaluator (DstMetrics) → metrics summary
//!     → PredictionDiffRecorder → diff document → error analysis
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! let corpus = Corpus::load("data/processed")?;
//! let learned = RuleLearner::new(LearnerConfig::default()).learn(&corpus.train);
//! let predictor = RuleBasedPredictor::new(learned.ruleset, PredictorConfig::default());
//! let inference = predictor.predict_corpus(&corpus.test);
//! let summary = Evaluator::new().evaluate_dataset(&inference.dialogues, &corpus.test);
//! ```

pub mod accumulate;
pub mod belief;
pub mod config;
pub mod corpus;
pub mod diff;
pub mod error;
pub mod evaluate;
pub mod input;
pub mod learn;
pub mod metrics;
pub mod ontology;
pub mod predict;
pub mod report;
pub mod ruleset;
pub mod score;
pub mod slot;
pub mod span;
pub mod stats;
pub mod token;

pub use accumulate::{BeliefStateAccumulator, TurnState, accumulate, annotate_deltas};
pub use belief::BeliefState;
pub use config::{Config, LearnerConfig, PredictorConfig};
pub use corpus::{
    Corpus, Dialogue, Speaker, Split, StateField, Turn, load_dialogues, read_dialogues,
};
pub use diff::{
    DiffDocument, ErrorAnalysis, ErrorKind, PredictionDiffRecorder, SlotError, diff_states,
};
pub use error::DialogStateError;
pub use evaluate::Evaluator;
pub use input::Utterance;
pub use learn::{Learned, LearnerState, RuleLearner};
pub use metrics::{DstMetrics, MetricsSummary, SlotAccuracy};
pub use ontology::Ontology;
pub use predict::{Candidate, Inference, Prediction, RuleBasedPredictor};
pub use report::{BatchReport, SkippedDialogue};
pub use ruleset::{ContextPattern, CueTable, ExclusionPair, Rule, Ruleset};
pub use score::{Confidence, MatchSource};
pub use slot::{Domain, SlotId, Value, ValueKind};
pub use stats::{CorpusStats, corpus_stats};
