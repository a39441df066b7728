//! Descriptive statistics over a split.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::corpus::Dialogue;
use crate::slot::{Domain, SlotId};

const MOST_COMMON_SLOTS: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LengthStats {
    pub min: usize,
    pub max: usize,
    pub mean: f64,
    pub total: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainStats {
    pub single_domain: usize,
    pub multi_domain: usize,
    pub domain_counts: BTreeMap<Domain, usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlotStats {
    pub total_turns: usize,
    pub turns_with_slots: usize,
    pub turns_without_slots: usize,
    pub slot_coverage: f64,
    /// Slots by the number of turns whose belief state holds them, most
    /// frequent first, ties by slot.
    pub most_common_slots: Vec<(SlotId, usize)>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorpusStats {
    pub dialogues: usize,
    pub length: LengthStats,
    pub domains: DomainStats,
    pub slots: SlotStats,
}

/// Turns per dialogue.
pub fn dialogue_lengths(dialogues: &[Dialogue]) -> LengthStats {
    let lengths: Vec<usize> = dialogues.iter().map(|dialogue| dialogue.turns.len()).collect();
    let total: usize = lengths.iter().sum();
    LengthStats {
        min: lengths.iter().copied().min().unwrap_or(0),
        max: lengths.iter().copied().max().unwrap_or(0),
        mean: if lengths.is_empty() {
            0.0
        } else {
            total as f64 / lengths.len() as f64
        },
        total,
    }
}

pub fn domain_distribution(dialogues: &[Dialogue]) -> DomainStats {
    let mut stats = DomainStats::default();
    for dialogue in dialogues {
        match dialogue.domains.len() {
            0 => {}
            1 => stats.single_domain += 1,
            _ => stats.multi_domain += 1,
        }
        for domain in &dialogue.domains {
            *stats.domain_counts.entry(*domain).or_default() += 1;
        }
    }
    stats
}

pub fn slot_distribution(dialogues: &[Dialogue]) -> SlotStats {
    let mut counts: BTreeMap<&SlotId, usize> = BTreeMap::new();
    let mut stats = SlotStats::default();

    for turn in dialogues.iter().flat_map(|dialogue| dialogue.turns.iter()) {
        stats.total_turns += 1;
        if turn.belief_state.is_empty() {
            continue;
        }
        stats.turns_with_slots += 1;
        for slot in turn.belief_state.slots() {
            *counts.entry(slot).or_default() += 1;
        }
    }

    stats.turns_without_slots = stats.total_turns - stats.turns_with_slots;
    stats.slot_coverage = if stats.total_turns == 0 {
        0.0
    } else {
        stats.turns_with_slots as f64 / stats.total_turns as f64
    };

    let mut ranked: Vec<(SlotId, usize)> = counts
        .into_iter()
        .map(|(slot, count)| (slot.clone(), count))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(MOST_COMMON_SLOTS);
    stats.most_common_slots = ranked;
    stats
}

pub fn corpus_stats(dialogues: &[Dialogue]) -> CorpusStats {
    CorpusStats {
        dialogues: dialogues.len(),
        length: dialogue_lengths(dialogues),
        domains: domain_distribution(dialogues),
        slots: slot_distribution(dialogues),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::belief::BeliefState;
    use crate::corpus::Turn;
    use pretty_assertions::assert_eq;
    use testresult::TestResult;

    fn sample() -> Result<Vec<Dialogue>, crate::error::DialogStateError> {
        let hotel = BeliefState::from_pairs([("hotel-area", "east")])?;
        let both = BeliefState::from_pairs([("hotel-area", "east"), ("train-day", "monday")])?;
        Ok(vec![
            Dialogue::new("a")
                .with_domain(Domain::Hotel)
                .with_turn(Turn::user(0, "hi"))
                .with_turn(Turn::user(1, "east").with_belief_state(hotel)),
            Dialogue::new("b")
                .with_domain(Domain::Hotel)
                .with_domain(Domain::Train)
                .with_turn(Turn::user(0, "both").with_belief_state(both)),
            Dialogue::new("c"),
        ])
    }

    #[test]
    fn lengths_cover_empty_dialogues() -> TestResult {
        let length = dialogue_lengths(&sample()?);
        assert_eq!(length, LengthStats { min: 0, max: 2, mean: 1.0, total: 3 });
        assert_eq!(dialogue_lengths(&[]), LengthStats::default());
        Ok(())
    }

    #[test]
    fn domains_split_single_and_multi() -> TestResult {
        let domains = domain_distribution(&sample()?);
        assert_eq!(domains.single_domain, 1);
        assert_eq!(domains.multi_domain, 1);
        assert_eq!(domains.domain_counts.get(&Domain::Hotel), Some(&2));
        Ok(())
    }

    #[test]
    fn slots_rank_by_turn_count() -> TestResult {
        let slots = slot_distribution(&sample()?);
        assert_eq!(slots.total_turns, 3);
        assert_eq!(slots.turns_with_slots, 2);
        assert_eq!(slots.turns_without_slots, 1);
        assert_eq!(
            slots.most_common_slots,
            vec![(SlotId::parse("hotel-area")?, 2), (SlotId::parse("train-day")?, 1)]
        );
        Ok(())
    }
}
