//! Mining a [`Ruleset`] from labeled training dialogues.
//!
//! Learning is a single pass over the training turns that only increments
//! counters, followed by a `finish` step that turns the counters into rules.
//! The counters live in an explicit [`LearnerState`]; two states built over
//! disjoint sets of dialogues can be [merged](LearnerState::merge) by plain
//! addition, which gives the same ruleset as one pass over the union.
//!
//! Four rule families come out of the pass:
//!
//! 1. **Context patterns.** For every `(slot, value)` in a turn's delta whose
//!    tokens occur as a contiguous run of the utterance's tokens, the first
//!    occurrence is cut out and up to `context_window` tokens on either side
//!    are kept: `"i want to stay in the east please"` with `hotel-area=east`
//!    yields `stay in the <VALUE> please`. Values that do not occur verbatim
//!    (normalized upstream, inferred from context) are skipped, and so are
//!    values found only inside a larger token (`4` in `4-star`), since the
//!    predictor could never extract them from that context.
//! 2. **Fallback cues.** The single tokens immediately before and after each
//!    verbatim mention.
//! 3. **Keyword scores.** For each content word `w` and slot `s`,
//!    `P(w | s is set) / P(w)` over user turns, kept when above threshold.
//! 4. **Exclusion pairs.** Slot pairs that share a dialogue far less often
//!    than independence would predict.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::LearnerConfig;
use crate::corpus::{Dialogue, Turn};
use crate::report::BatchReport;
use crate::ruleset::{ContextPattern, CueTable, ExclusionPair, LearningSummary, Rule, Ruleset};
use crate::slot::SlotId;
use crate::token::{content_words, token_values};

/// Raw counters accumulated while scanning training dialogues.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LearnerState {
    dialogues: usize,
    turns: usize,
    literal_mentions: usize,
    non_literal_mentions: usize,
    pattern_support: BTreeMap<SlotId, BTreeMap<ContextPattern, usize>>,
    cues: BTreeMap<SlotId, CueTable>,
    /// User turns containing each content word.
    word_turns: BTreeMap<String, usize>,
    /// User turns in which each slot is set.
    slot_turns: BTreeMap<SlotId, usize>,
    slot_word_turns: BTreeMap<SlotId, BTreeMap<String, usize>>,
    /// Dialogues in which each slot is ever set.
    slot_dialogues: BTreeMap<SlotId, usize>,
    /// Dialogues in which both slots of an ordered pair are ever set.
    pair_dialogues: BTreeMap<(SlotId, SlotId), usize>,
}

impl LearnerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dialogues(&self) -> usize {
        self.dialogues
    }

    pub fn observe_dialogue(&mut self, dialogue: &Dialogue, config: &LearnerConfig) {
        self.dialogues += 1;
        let mut seen: BTreeSet<SlotId> = BTreeSet::new();

        for turn in dialogue.user_turns() {
            self.observe_turn(turn, config);
            seen.extend(turn.belief_state.slots().cloned());
            seen.extend(turn.belief_state_delta.slots().cloned());
        }

        let seen: Vec<SlotId> = seen.into_iter().collect();
        for (index, slot) in seen.iter().enumerate() {
            *self.slot_dialogues.entry(slot.clone()).or_default() += 1;
            for other in &seen[index + 1..] {
                *self
                    .pair_dialogues
                    .entry((slot.clone(), other.clone()))
                    .or_default() += 1;
            }
        }
    }

    fn observe_turn(&mut self, turn: &Turn, config: &LearnerConfig) {
        self.turns += 1;
        let utterance = turn.utterance.to_lowercase();
        let tokens = token_values(&utterance);

        for (slot, value) in &turn.belief_state_delta {
            self.mine_mention(slot, &token_values(value.as_str()), &tokens, config);
        }

        let words = content_words(&utterance, config.min_keyword_len, &config.stop_words);
        for word in &words {
            *self.word_turns.entry(word.clone()).or_default() += 1;
        }

        let slots: BTreeSet<&SlotId> = turn
            .belief_state
            .slots()
            .chain(turn.belief_state_delta.slots())
            .collect();
        for slot in slots {
            *self.slot_turns.entry(slot.clone()).or_default() += 1;
            let counts = self.slot_word_turns.entry(slot.clone()).or_default();
            for word in &words {
                *counts.entry(word.clone()).or_default() += 1;
            }
        }
    }

    fn mine_mention(
        &mut self,
        slot: &SlotId,
        value: &[String],
        tokens: &[String],
        config: &LearnerConfig,
    ) {
        let Some(start) = find_run(tokens, value) else {
            self.non_literal_mentions += 1;
            return;
        };
        self.literal_mentions += 1;

        let before = &tokens[..start];
        let after = &tokens[start + value.len()..];

        let cues = self.cues.entry(slot.clone()).or_default();
        cues.mentions += 1;
        if let Some(word) = before.last() {
            *cues.before.entry(word.clone()).or_default() += 1;
        }
        if let Some(word) = after.first() {
            *cues.after.entry(word.clone()).or_default() += 1;
        }

        let skip = before.len().saturating_sub(config.context_window);
        let pattern = ContextPattern::new(
            before[skip..].to_vec(),
            after.iter().take(config.context_window).cloned().collect(),
        );
        if pattern.specificity() < config.min_pattern_context {
            return;
        }
        *self
            .pattern_support
            .entry(slot.clone())
            .or_default()
            .entry(pattern)
            .or_default() += 1;
    }

    /// Fold another state in. Counter addition is associative and
    /// commutative, so shards may be merged in any order.
    pub fn merge(&mut self, other: LearnerState) {
        self.dialogues += other.dialogues;
        self.turns += other.turns;
        self.literal_mentions += other.literal_mentions;
        self.non_literal_mentions += other.non_literal_mentions;

        for (slot, patterns) in other.pattern_support {
            add_counts(self.pattern_support.entry(slot).or_default(), patterns);
        }
        for (slot, cues) in other.cues {
            let mine = self.cues.entry(slot).or_default();
            mine.mentions += cues.mentions;
            add_counts(&mut mine.before, cues.before);
            add_counts(&mut mine.after, cues.after);
        }
        add_counts(&mut self.word_turns, other.word_turns);
        add_counts(&mut self.slot_turns, other.slot_turns);
        for (slot, words) in other.slot_word_turns {
            add_counts(self.slot_word_turns.entry(slot).or_default(), words);
        }
        add_counts(&mut self.slot_dialogues, other.slot_dialogues);
        add_counts(&mut self.pair_dialogues, other.pair_dialogues);
    }

    /// Turn the counters into a ruleset.
    pub fn finish(self, config: &LearnerConfig) -> Ruleset {
        let rules = self.build_rules(config);
        let keywords = self.build_keywords(config);
        let exclusions = self.build_exclusions(config);

        Ruleset {
            rules,
            fallback: self.cues,
            keywords,
            exclusions,
            summary: LearningSummary {
                dialogues: self.dialogues,
                turns: self.turns,
                literal_mentions: self.literal_mentions,
                non_literal_mentions: self.non_literal_mentions,
            },
        }
    }

    fn build_rules(&self, config: &LearnerConfig) -> BTreeMap<SlotId, Vec<Rule>> {
        let mut rules = BTreeMap::new();

        for (slot, patterns) in &self.pattern_support {
            let mentions = self.cues.get(slot).map_or(0, |cues| cues.mentions);
            let mut slot_rules: Vec<Rule> = patterns
                .iter()
                .filter(|(_, support)| **support >= config.min_support)
                .map(|(pattern, support)| Rule {
                    slot: slot.clone(),
                    pattern: pattern.clone(),
                    support: *support,
                    confidence: ratio(*support, mentions),
                })
                .collect();
            slot_rules.sort_by(Rule::precedence);
            if let Some(cap) = config.max_rules_per_slot {
                slot_rules.truncate(cap);
            }
            if !slot_rules.is_empty() {
                rules.insert(slot.clone(), slot_rules);
            }
        }

        rules
    }

    fn build_keywords(&self, config: &LearnerConfig) -> BTreeMap<SlotId, BTreeMap<String, f64>> {
        let mut keywords = BTreeMap::new();

        for (slot, words) in &self.slot_word_turns {
            let slot_turns = self.slot_turns.get(slot).copied().unwrap_or(0);
            let scored: BTreeMap<String, f64> = words
                .iter()
                .filter(|(_, count)| **count >= config.min_keyword_count)
                .filter_map(|(word, count)| {
                    let given_slot = ratio(*count, slot_turns);
                    let word_turns = self.word_turns.get(word).copied().unwrap_or(0);
                    let overall = ratio(word_turns, self.turns);
                    (overall > 0.0).then(|| (word.clone(), given_slot / overall))
                })
                .filter(|(_, score)| *score > config.keyword_score_threshold)
                .collect();
            if !scored.is_empty() {
                keywords.insert(slot.clone(), scored);
            }
        }

        keywords
    }

    fn build_exclusions(&self, config: &LearnerConfig) -> Vec<ExclusionPair> {
        let frequent: Vec<(&SlotId, usize)> = self
            .slot_dialogues
            .iter()
            .filter(|(_, count)| **count > config.exclusion_min_dialogues)
            .map(|(slot, count)| (slot, *count))
            .collect();

        let mut exclusions = Vec::new();
        for (index, (first, first_count)) in frequent.iter().enumerate() {
            for (second, second_count) in &frequent[index + 1..] {
                let expected =
                    (*first_count as f64) * (*second_count as f64) / self.dialogues as f64;
                let co_occurrences = self
                    .pair_dialogues
                    .get(&((*first).clone(), (*second).clone()))
                    .copied()
                    .unwrap_or(0);
                if (co_occurrences as f64) < expected * config.exclusion_ratio {
                    exclusions.push(ExclusionPair {
                        first: (*first).clone(),
                        second: (*second).clone(),
                        co_occurrences,
                        expected,
                    });
                }
            }
        }

        exclusions
    }
}

/// First position where `run` occurs as whole tokens.
fn find_run(tokens: &[String], run: &[String]) -> Option<usize> {
    if run.is_empty() || run.len() > tokens.len() {
        return None;
    }
    tokens.windows(run.len()).position(|window| window == run)
}

fn add_counts<K: Ord>(into: &mut BTreeMap<K, usize>, from: BTreeMap<K, usize>) {
    for (key, count) in from {
        *into.entry(key).or_default() += count;
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// The output of a learning pass.
#[derive(Debug, Clone)]
pub struct Learned {
    pub ruleset: Ruleset,
    pub report: BatchReport,
}

/// Drives a [`LearnerState`] over a training split.
#[derive(Debug, Clone, Default)]
pub struct RuleLearner {
    config: LearnerConfig,
}

impl RuleLearner {
    pub fn new(config: LearnerConfig) -> Self {
        RuleLearner { config }
    }

    pub fn config(&self) -> &LearnerConfig {
        &self.config
    }

    /// Observe every valid dialogue and build the ruleset. Invalid dialogues
    /// are reported and skipped.
    pub fn learn(&self, dialogues: &[Dialogue]) -> Learned {
        let mut state = LearnerState::new();
        let mut report = BatchReport::default();

        for dialogue in dialogues {
            match dialogue.validate() {
                Ok(()) => {
                    state.observe_dialogue(dialogue, &self.config);
                    report.processed += 1;
                }
                Err(error) => report.skip(&dialogue.dialogue_id, error),
            }
        }

        let ruleset = state.finish(&self.config);
        tracing::info!(
            dialogues = report.processed,
            skipped = report.skipped.len(),
            rules = ruleset.rule_count(),
            keyword_slots = ruleset.keywords.len(),
            exclusions = ruleset.exclusions.len(),
            literal_mentions = ruleset.summary.literal_mentions,
            non_literal_mentions = ruleset.summary.non_literal_mentions,
            "learned ruleset"
        );

        Learned { ruleset, report }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::belief::BeliefState;
    use crate::corpus::Turn;
    use crate::error::DialogStateError;
    use crate::ruleset::ContextPattern;
    use crate::span::match_pattern;
    use crate::token::tokenize;
    use pretty_assertions::assert_eq;
    use testresult::TestResult;

    fn slot(name: &str) -> SlotId {
        SlotId::parse(name).expect("test slot ids are well formed")
    }

    fn turn(
        turn_id: usize,
        utterance: &str,
        delta: &[(&str, &str)],
    ) -> Result<Turn, DialogStateError> {
        let delta = BeliefState::from_pairs(delta.iter().copied())?;
        Ok(Turn::user(turn_id, utterance)
            .with_belief_state(delta.clone())
            .with_delta(delta))
    }

    fn dialogue(id: &str, turns: Vec<Turn>) -> Dialogue {
        turns
            .into_iter()
            .fold(Dialogue::new(id), |dialogue, turn| dialogue.with_turn(turn))
    }

    fn words(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    #[test]
    fn mines_context_window_around_literal_value() -> TestResult {
        let config = LearnerConfig::default();
        let mut state = LearnerState::new();
        let utterance = "I want to stay in the East part of town please";
        state.observe_dialogue(
            &dialogue("a", vec![turn(0, utterance, &[("hotel-area", "east")])?]),
            &config,
        );
        let ruleset = state.finish(&config);

        let rules = ruleset.rules_for(&slot("hotel-area"));
        assert_eq!(rules.len(), 1);
        assert_eq!(
            rules[0].pattern,
            ContextPattern::new(words(&["stay", "in", "the"]), words(&["part", "of", "town"]))
        );
        assert_eq!(rules[0].support, 1);
        assert_eq!(rules[0].confidence, 1.0);

        let cues = ruleset.cues_for(&slot("hotel-area")).expect("cues recorded");
        assert_eq!(cues.before.get("the"), Some(&1));
        assert_eq!(cues.after.get("part"), Some(&1));
        Ok(())
    }

    #[test]
    fn non_literal_values_produce_no_pattern() -> TestResult {
        let config = LearnerConfig::default();
        let mut state = LearnerState::new();
        state.observe_dialogue(
            &dialogue(
                "a",
                vec![turn(0, "somewhere cheap", &[("hotel-pricerange", "inexpensive")])?],
            ),
            &config,
        );
        let ruleset = state.finish(&config);
        assert!(ruleset.rules.is_empty());
        assert!(ruleset.fallback.is_empty());
        assert_eq!(ruleset.summary.non_literal_mentions, 1);
        Ok(())
    }

    #[test]
    fn values_inside_a_larger_token_are_not_literal() -> TestResult {
        let config = LearnerConfig::default();
        let mut state = LearnerState::new();
        state.observe_dialogue(
            &dialogue("a", vec![turn(0, "I want a 4-star hotel", &[("hotel-stars", "4")])?]),
            &config,
        );
        let ruleset = state.finish(&config);
        assert!(ruleset.rules_for(&slot("hotel-stars")).is_empty());
        assert!(ruleset.cues_for(&slot("hotel-stars")).is_none());
        assert_eq!(ruleset.summary.non_literal_mentions, 1);
        Ok(())
    }

    #[test]
    fn learned_patterns_match_their_training_sentences() -> TestResult {
        let config = LearnerConfig::default();
        let sentences = [
            "I want a 4-star hotel",
            "I want a 4 star hotel",
            "a hotel with 4 stars, please",
        ];
        let mut state = LearnerState::new();
        for (index, sentence) in sentences.iter().enumerate() {
            state.observe_dialogue(
                &dialogue(&index.to_string(), vec![turn(0, sentence, &[("hotel-stars", "4")])?]),
                &config,
            );
        }
        let ruleset = state.finish(&config);

        let rules = ruleset.rules_for(&slot("hotel-stars"));
        assert_eq!(rules.len(), 2);
        for rule in rules {
            let matched = sentences
                .iter()
                .filter_map(|sentence| match_pattern(&tokenize(sentence), &rule.pattern, 6))
                .map(|span| span.text)
                .collect::<Vec<_>>();
            assert_eq!(matched, vec!["4".to_string()], "rule `{}`", rule.pattern);
        }
        Ok(())
    }

    #[test]
    fn support_counts_repeated_patterns_and_sets_confidence() -> TestResult {
        let config = LearnerConfig::default();
        let mut state = LearnerState::new();
        for (id, area) in [("a", "east"), ("b", "west"), ("c", "north")] {
            let utterance = format!("a hotel in the {area}");
            state.observe_dialogue(
                &dialogue(id, vec![turn(0, &utterance, &[("hotel-area", area)])?]),
                &config,
            );
        }
        state.observe_dialogue(
            &dialogue("d", vec![turn(0, "the south side", &[("hotel-area", "south")])?]),
            &config,
        );
        let ruleset = state.finish(&config);

        let rules = ruleset.rules_for(&slot("hotel-area"));
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].pattern.to_string(), "hotel in the <VALUE>");
        assert_eq!(rules[0].support, 3);
        assert_eq!(rules[0].confidence, 0.75);
        assert_eq!(rules[1].pattern.to_string(), "the <VALUE> side");
        Ok(())
    }

    #[test]
    fn min_support_and_cap_prune_rules() -> TestResult {
        let config = LearnerConfig {
            min_support: 2,
            ..LearnerConfig::default()
        };
        let mut state = LearnerState::new();
        state.observe_dialogue(
            &dialogue(
                "a",
                vec![
                    turn(0, "in the east", &[("hotel-area", "east")])?,
                    turn(1, "in the west", &[("hotel-area", "west")])?,
                    turn(2, "the north side", &[("hotel-area", "north")])?,
                ],
            ),
            &config,
        );
        let ruleset = state.finish(&config);
        assert_eq!(ruleset.rules_for(&slot("hotel-area")).len(), 1);
        Ok(())
    }

    #[test]
    fn keywords_are_over_represented_words() -> TestResult {
        let config = LearnerConfig::default();
        let mut state = LearnerState::new();
        state.observe_dialogue(
            &dialogue(
                "a",
                vec![
                    turn(0, "book a train ticket on monday", &[("train-day", "monday")])?,
                    turn(1, "hello there friend", &[])?,
                    turn(2, "goodbye friend", &[])?,
                    turn(3, "a train again", &[("train-day", "monday")])?,
                ],
            ),
            &config,
        );
        let ruleset = state.finish(&config);
        let keywords = ruleset.keywords.get(&slot("train-day")).expect("train keywords");

        // "train": in both train-day turns and in 2 of 4 turns overall.
        assert_eq!(keywords.get("train"), Some(&2.0));
        assert!(keywords.contains_key("monday"));
        assert!(!keywords.contains_key("friend"));
        assert!(ruleset.domain_keywords()["train"].contains("ticket"));
        Ok(())
    }

    fn exclusion_corpus() -> Result<Vec<Dialogue>, DialogStateError> {
        let mut dialogues = Vec::new();
        for index in 0..120 {
            dialogues.push(dialogue(
                &format!("hotel{index}"),
                vec![turn(0, "a hotel in the east", &[("hotel-area", "east")])?],
            ));
            dialogues.push(dialogue(
                &format!("train{index}"),
                vec![turn(0, "a train on monday", &[("train-day", "monday")])?],
            ));
        }
        dialogues.push(dialogue(
            "both",
            vec![turn(0, "east and monday", &[("hotel-area", "east"), ("train-day", "monday")])?],
        ));
        Ok(dialogues)
    }

    #[test]
    fn rarely_co_occurring_frequent_slots_are_exclusive() -> TestResult {
        let learned = RuleLearner::default().learn(&exclusion_corpus()?);
        let exclusions = &learned.ruleset.exclusions;

        assert_eq!(exclusions.len(), 1);
        assert_eq!(exclusions[0].first, slot("hotel-area"));
        assert_eq!(exclusions[0].second, slot("train-day"));
        assert_eq!(exclusions[0].co_occurrences, 1);
        Ok(())
    }

    #[test]
    fn rare_slots_are_never_exclusive() -> TestResult {
        let mut dialogues = exclusion_corpus()?;
        dialogues.truncate(100);
        let learned = RuleLearner::default().learn(&dialogues);
        assert!(learned.ruleset.exclusions.is_empty());
        Ok(())
    }

    #[test]
    fn merged_shards_match_a_single_pass() -> TestResult {
        let config = LearnerConfig::default();
        let dialogues = exclusion_corpus()?;
        let (left, right) = dialogues.split_at(97);

        let mut whole = LearnerState::new();
        for dialogue in &dialogues {
            whole.observe_dialogue(dialogue, &config);
        }

        let mut first = LearnerState::new();
        left.iter().for_each(|dialogue| first.observe_dialogue(dialogue, &config));
        let mut second = LearnerState::new();
        right.iter().for_each(|dialogue| second.observe_dialogue(dialogue, &config));
        second.merge(first);

        assert_eq!(second, whole);
        assert_eq!(second.finish(&config), whole.finish(&config));
        Ok(())
    }

    #[test]
    fn invalid_dialogues_are_skipped_not_fatal() -> TestResult {
        let dialogues = vec![
            dialogue("", vec![turn(0, "in the east", &[("hotel-area", "east")])?]),
            dialogue("ok", vec![turn(0, "in the west", &[("hotel-area", "west")])?]),
        ];
        let learned = RuleLearner::default().learn(&dialogues);
        assert_eq!(learned.report.processed, 1);
        assert_eq!(learned.report.skipped.len(), 1);
        assert_eq!(learned.ruleset.summary.dialogues, 1);
        Ok(())
    }
}
