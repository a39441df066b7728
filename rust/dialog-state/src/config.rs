//! Tunables for rule learning and prediction.
//!
//! Both configs deserialize with `#[serde(default)]`, so a JSON file only has
//! to name the fields it overrides:
//!
//! ```json
//! { "learner": { "min_support": 2 }, "predictor": { "history_window": 0 } }
//! ```
//!
//! A top-level `stop_words` list replaces the stop words of both sides.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::DialogStateError;
use crate::token::DEFAULT_STOP_WORDS;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnerConfig {
    /// Tokens kept on each side of a literal value match.
    pub context_window: usize,
    /// Patterns need at least this many context tokens in total.
    pub min_pattern_context: usize,
    /// Patterns seen fewer times than this are discarded.
    pub min_support: usize,
    /// Keep at most this many patterns per slot, best first.
    pub max_rules_per_slot: Option<usize>,
    /// Content words must be at least this many characters long.
    pub min_keyword_len: usize,
    /// A word must co-occur with a slot at least this often to score.
    pub min_keyword_count: usize,
    /// Words scoring strictly above this are kept as indicative.
    pub keyword_score_threshold: f64,
    /// A pair is exclusive below this fraction of its expected co-occurrence.
    pub exclusion_ratio: f64,
    /// Both slots must occur in strictly more dialogues than this.
    pub exclusion_min_dialogues: usize,
    pub stop_words: BTreeSet<String>,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        LearnerConfig {
            context_window: 3,
            min_pattern_context: 1,
            min_support: 1,
            max_rules_per_slot: None,
            min_keyword_len: 3,
            min_keyword_count: 1,
            keyword_score_threshold: 1.5,
            exclusion_ratio: 0.1,
            exclusion_min_dialogues: 100,
            stop_words: default_stop_words(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    /// Previous utterances that may open the domain gate.
    pub history_window: usize,
    /// Longest value span, in tokens, a pattern or cue may extract.
    pub max_value_tokens: usize,
    /// Multiplier applied to fallback-cue confidences.
    pub fallback_weight: f64,
    /// A fallback span made only of these words is not a value.
    pub stop_words: BTreeSet<String>,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        PredictorConfig {
            history_window: 2,
            max_value_tokens: 6,
            fallback_weight: 0.5,
            stop_words: default_stop_words(),
        }
    }
}

fn default_stop_words() -> BTreeSet<String> {
    DEFAULT_STOP_WORDS.iter().map(|word| word.to_string()).collect()
}

/// Combined configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub learner: LearnerConfig,
    pub predictor: PredictorConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_words: Option<BTreeSet<String>>,
}

impl Config {
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, DialogStateError> {
        let mut config: Config = serde_json::from_reader(reader)?;
        if let Some(stop_words) = config.stop_words.take() {
            config.learner.stop_words = stop_words.clone();
            config.predictor.stop_words = stop_words;
        }
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, DialogStateError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|error| DialogStateError::io(path, error))?;
        Self::from_reader(BufReader::new(file))
    }
}
