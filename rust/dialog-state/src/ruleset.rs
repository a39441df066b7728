//! The learned ruleset: everything the predictor knows.
//!
//! A [`Ruleset`] bundles four tables mined from training turns:
//!
//! - **Context patterns** per slot: the tokens seen around literal mentions of
//!   the slot's values, e.g. `in the <VALUE> part of`, with a support count
//!   and a confidence.
//! - **Fallback cues** per slot: the single tokens seen immediately before and
//!   after a value, used when no full pattern matches.
//! - **Keyword scores** per slot: content words that are over-represented in
//!   turns where the slot is set. The predictor uses them as a domain gate.
//! - **Exclusion pairs**: slots that almost never appear in the same dialogue.
//!
//! The ruleset is built once and only read afterwards. Every table is
//! ordered, so the serialized document is reproducible for a given corpus.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::DialogStateError;
use crate::slot::SlotId;

/// Stand-in for the value inside a rendered pattern.
pub const VALUE_PLACEHOLDER: &str = "<VALUE>";

/// Tokens before and after a value mention.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContextPattern {
    pub before: Vec<String>,
    pub after: Vec<String>,
}

impl ContextPattern {
    pub fn new(before: Vec<String>, after: Vec<String>) -> Self {
        ContextPattern { before, after }
    }

    /// Number of context tokens; more tokens means a more specific pattern.
    pub fn specificity(&self) -> usize {
        self.before.len() + self.after.len()
    }
}

impl fmt::Display for ContextPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = self
            .before
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(VALUE_PLACEHOLDER))
            .chain(self.after.iter().map(String::as_str))
            .collect();
        f.write_str(&parts.join(" "))
    }
}

/// A context pattern learned for one slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub slot: SlotId,
    pub pattern: ContextPattern,
    /// How many training mentions produced this exact pattern.
    pub support: usize,
    /// `support` over all literal mentions of the slot, in `[0, 1]`.
    pub confidence: f64,
}

impl Rule {
    /// Preference order: support desc, specificity desc, slot asc, pattern asc.
    pub fn precedence(&self, other: &Rule) -> Ordering {
        other
            .support
            .cmp(&self.support)
            .then_with(|| other.pattern.specificity().cmp(&self.pattern.specificity()))
            .then_with(|| self.slot.cmp(&other.slot))
            .then_with(|| self.pattern.cmp(&other.pattern))
    }
}

/// Single-token neighbours of a slot's values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CueTable {
    pub before: BTreeMap<String, usize>,
    pub after: BTreeMap<String, usize>,
    /// Literal mentions the counts were taken from.
    pub mentions: usize,
}

impl CueTable {
    /// Before-cues, most frequent first, ties by word.
    pub fn ranked_before(&self) -> Vec<(&str, usize)> {
        rank_counts(&self.before)
    }

    pub fn ranked_after(&self) -> Vec<(&str, usize)> {
        rank_counts(&self.after)
    }

    /// Share of mentions a cue was seen with.
    pub fn weight(&self, count: usize) -> f64 {
        if self.mentions == 0 {
            0.0
        } else {
            count as f64 / self.mentions as f64
        }
    }

    pub fn is_empty(&self) -> bool {
        self.before.is_empty() && self.after.is_empty()
    }
}

fn rank_counts(counts: &BTreeMap<String, usize>) -> Vec<(&str, usize)> {
    let mut ranked: Vec<(&str, usize)> = counts
        .iter()
        .map(|(word, count)| (word.as_str(), *count))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked
}

/// Two slots that rarely share a dialogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExclusionPair {
    /// The lexicographically smaller slot.
    pub first: SlotId,
    pub second: SlotId,
    /// Dialogues in which both slots appear.
    pub co_occurrences: usize,
    /// Co-occurrences expected if the slots were independent.
    pub expected: f64,
}

impl ExclusionPair {
    pub fn involves(&self, a: &SlotId, b: &SlotId) -> bool {
        (&self.first == a && &self.second == b) || (&self.first == b && &self.second == a)
    }
}

/// Corpus figures recorded while learning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LearningSummary {
    pub dialogues: usize,
    pub turns: usize,
    /// Delta values found verbatim in their utterance.
    pub literal_mentions: usize,
    /// Delta values that were not, and so produced no pattern.
    pub non_literal_mentions: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ruleset {
    /// Per-slot patterns, each list in precedence order.
    pub rules: BTreeMap<SlotId, Vec<Rule>>,
    pub fallback: BTreeMap<SlotId, CueTable>,
    /// Per-slot indicative words and their informativeness scores.
    pub keywords: BTreeMap<SlotId, BTreeMap<String, f64>>,
    pub exclusions: Vec<ExclusionPair>,
    pub summary: LearningSummary,
}

impl Ruleset {
    pub fn rules_for(&self, slot: &SlotId) -> &[Rule] {
        self.rules.get(slot).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn cues_for(&self, slot: &SlotId) -> Option<&CueTable> {
        self.fallback.get(slot)
    }

    /// Every slot the ruleset can extract a value for.
    pub fn slots(&self) -> BTreeSet<&SlotId> {
        self.rules
            .iter()
            .filter(|(_, rules)| !rules.is_empty())
            .map(|(slot, _)| slot)
            .chain(
                self.fallback
                    .iter()
                    .filter(|(_, cues)| !cues.is_empty())
                    .map(|(slot, _)| slot),
            )
            .collect()
    }

    /// Indicative words grouped by the domain of their slot.
    pub fn domain_keywords(&self) -> BTreeMap<String, BTreeSet<String>> {
        let mut domains: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (slot, words) in &self.keywords {
            domains
                .entry(slot.domain().to_string())
                .or_default()
                .extend(words.keys().cloned());
        }
        domains
    }

    pub fn is_exclusive(&self, a: &SlotId, b: &SlotId) -> bool {
        self.exclusions.iter().any(|pair| pair.involves(a, b))
    }

    pub fn rule_count(&self) -> usize {
        self.rules.values().map(Vec::len).sum()
    }

    pub fn to_writer<W: Write>(&self, writer: W) -> Result<(), DialogStateError> {
        Ok(serde_json::to_writer_pretty(writer, self)?)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, DialogStateError> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), DialogStateError> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|error| DialogStateError::io(path, error))?;
        let mut writer = BufWriter::new(file);
        self.to_writer(&mut writer)?;
        writer
            .flush()
            .map_err(|error| DialogStateError::io(path, error))?;
        tracing::info!(path = %path.display(), rules = self.rule_count(), "saved ruleset");
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, DialogStateError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|error| DialogStateError::io(path, error))?;
        Self::from_reader(BufReader::new(file))
    }
}
