//! The dialogue corpus: dialogues, turns and split loading.
//!
//! The corpus is produced by an external preprocessing step and consumed
//! read-only. A processed split is a JSON array of dialogues:
//!
//! ```json
//! [{
//!   "dialogue_id": "MUL0001.json",
//!   "domains": ["hotel", "train"],
//!   "turns": [{
//!     "turn_id": 0,
//!     "speaker": "user",
//!     "utterance": "i need a cheap hotel in the east",
//!     "belief_state": { "hotel-pricerange": "cheap", "hotel-area": "east" },
//!     "belief_state_delta": { "hotel-pricerange": "cheap", "hotel-area": "east" },
//!     "system_response": "how many nights?"
//!   }]
//! }]
//! ```
//!
//! Turn fields that are missing, `null` or of the wrong type degrade to empty
//! values, and any speaker other than `"user"` is a system turn. Loading a
//! split that is missing or not valid JSON is fatal.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::accumulate::annotate_deltas;
use crate::belief::BeliefState;
use crate::error::DialogStateError;
use crate::ontology::Ontology;
use crate::slot::Domain;

/// Who produced a turn's utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    #[default]
    User,
    System,
}

impl<'de> Deserialize<'de> for Speaker {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
        Ok(match raw.as_ref().map(|value| value.as_str()) {
            None | Some(Some("user")) => Speaker::User,
            Some(Some("system")) => Speaker::System,
            Some(other) => {
                tracing::debug!(speaker = ?other, "unknown speaker, treating turn as system");
                Speaker::System
            }
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    #[serde(default, deserialize_with = "lenient")]
    pub turn_id: usize,
    #[serde(default)]
    pub speaker: Speaker,
    #[serde(default, deserialize_with = "lenient")]
    pub utterance: String,
    #[serde(default)]
    pub belief_state: BeliefState,
    #[serde(default)]
    pub belief_state_delta: BeliefState,
    #[serde(default, deserialize_with = "lenient")]
    pub system_response: String,
}

impl Turn {
    pub fn user(turn_id: usize, utterance: impl Into<String>) -> Self {
        Turn {
            turn_id,
            speaker: Speaker::User,
            utterance: utterance.into(),
            ..Turn::default()
        }
    }

    pub fn with_belief_state(mut self, belief_state: BeliefState) -> Self {
        self.belief_state = belief_state;
        self
    }

    pub fn with_delta(mut self, delta: BeliefState) -> Self {
        self.belief_state_delta = delta;
        self
    }

    pub fn is_user(&self) -> bool {
        self.speaker == Speaker::User
    }

    pub fn state(&self, field: StateField) -> &BeliefState {
        match field {
            StateField::Delta => &self.belief_state_delta,
            StateField::Accumulated => &self.belief_state,
        }
    }
}

/// Which of a turn's two states a comparison reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateField {
    /// `belief_state_delta`: what changed this turn.
    #[default]
    Delta,
    /// `belief_state`: everything established so far.
    Accumulated,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dialogue {
    #[serde(default, deserialize_with = "lenient")]
    pub dialogue_id: String,
    #[serde(default, deserialize_with = "known_domains")]
    pub domains: BTreeSet<Domain>,
    #[serde(default, deserialize_with = "lenient")]
    pub turns: Vec<Turn>,
}

impl Dialogue {
    pub fn new(dialogue_id: impl Into<String>) -> Self {
        Dialogue {
            dialogue_id: dialogue_id.into(),
            ..Dialogue::default()
        }
    }

    pub fn with_domain(mut self, domain: Domain) -> Self {
        self.domains.insert(domain);
        self
    }

    pub fn with_turn(mut self, turn: Turn) -> Self {
        self.turns.push(turn);
        self
    }

    /// Structural checks the batch drivers run before touching a dialogue.
    /// A failing dialogue is reported and skipped, never fatal.
    pub fn validate(&self) -> Result<(), DialogStateError> {
        let invalid = |reason: String| DialogStateError::InvalidDialogue {
            dialogue_id: self.dialogue_id.clone(),
            reason,
        };

        if self.dialogue_id.trim().is_empty() {
            return Err(invalid("empty dialogue id".into()));
        }

        for pair in self.turns.windows(2) {
            if pair[1].turn_id <= pair[0].turn_id {
                return Err(invalid(format!(
                    "turn id {} follows turn id {}",
                    pair[1].turn_id, pair[0].turn_id
                )));
            }
        }

        Ok(())
    }

    pub fn user_turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter().filter(|turn| turn.is_user())
    }
}

/// Read a split (a JSON array of dialogues).
pub fn read_dialogues<R: Read>(reader: R) -> Result<Vec<Dialogue>, DialogStateError> {
    Ok(serde_json::from_reader(reader)?)
}

pub fn load_dialogues(path: impl AsRef<Path>) -> Result<Vec<Dialogue>, DialogStateError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|error| DialogStateError::io(path, error))?;
    let dialogues = read_dialogues(BufReader::new(file))?;
    tracing::info!(path = %path.display(), dialogues = dialogues.len(), "loaded split");
    Ok(dialogues)
}

/// The named splits of a processed corpus directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Val,
    Test,
}

impl Split {
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Train => "train.json",
            Self::Val => "val.json",
            Self::Test => "test.json",
        }
    }
}

/// A fully loaded processed corpus.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    pub train: Vec<Dialogue>,
    pub val: Vec<Dialogue>,
    pub test: Vec<Dialogue>,
    pub ontology: Option<Ontology>,
}

impl Corpus {
    /// Load `train.json`, `val.json`, `test.json` and, when present,
    /// `ontology.json` from `dir`. Any split failing to load aborts.
    ///
    /// Every turn's delta is recomputed from the belief-state snapshots, so
    /// a corpus that only carries snapshots is ready for learning and
    /// evaluation.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, DialogStateError> {
        let dir = dir.as_ref();
        let ontology_path: PathBuf = dir.join("ontology.json");
        let ontology = if ontology_path.exists() {
            Some(Ontology::load(&ontology_path)?)
        } else {
            tracing::info!(dir = %dir.display(), "no ontology found, values are not validated");
            None
        };

        let mut corpus = Corpus {
            train: load_dialogues(dir.join(Split::Train.file_name()))?,
            val: load_dialogues(dir.join(Split::Val.file_name()))?,
            test: load_dialogues(dir.join(Split::Test.file_name()))?,
            ontology,
        };
        corpus
            .train
            .iter_mut()
            .chain(&mut corpus.val)
            .chain(&mut corpus.test)
            .for_each(annotate_deltas);
        Ok(corpus)
    }

    pub fn split(&self, split: Split) -> &[Dialogue] {
        match split {
            Split::Train => &self.train,
            Split::Val => &self.val,
            Split::Test => &self.test,
        }
    }

    /// Find a dialogue by id, in one split or across all of them.
    pub fn dialogue(&self, dialogue_id: &str, split: Option<Split>) -> Option<&Dialogue> {
        let splits = match split {
            Some(split) => vec![split],
            None => vec![Split::Train, Split::Val, Split::Test],
        };
        splits.into_iter().find_map(|split| {
            self.split(split)
                .iter()
                .find(|dialogue| dialogue.dialogue_id == dialogue_id)
        })
    }

    pub fn dialogues_in_domain(&self, domain: Domain, split: Split) -> Vec<&Dialogue> {
        self.split(split)
            .iter()
            .filter(|dialogue| dialogue.domains.contains(&domain))
            .collect()
    }
}

/// `null` or a value of the wrong shape reads as the default.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    if raw.is_null() {
        return Ok(T::default());
    }
    Ok(serde_json::from_value(raw).unwrap_or_else(|error| {
        tracing::debug!(%error, "malformed field, using default");
        T::default()
    }))
}

fn known_domains<'de, D>(deserializer: D) -> Result<BTreeSet<Domain>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<String>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .iter()
        .filter_map(|name| name.parse().ok())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use testresult::TestResult;

    #[test]
    fn missing_and_null_fields_degrade_to_empty() -> TestResult {
        let dialogues = read_dialogues(
            r#"[{
                "dialogue_id": "SNG01",
                "domains": ["hotel", "hospital"],
                "turns": [
                    { "turn_id": 0, "utterance": null, "belief_state": null },
                    { "turn_id": 1, "speaker": "system" }
                ]
            }]"#
            .as_bytes(),
        )?;

        let dialogue = &dialogues[0];
        assert_eq!(dialogue.domains, BTreeSet::from([Domain::Hotel]));
        assert_eq!(dialogue.turns[0].utterance, "");
        assert!(dialogue.turns[0].belief_state.is_empty());
        assert!(dialogue.turns[0].is_user());
        assert!(!dialogue.turns[1].is_user());
        assert_eq!(dialogue.user_turns().count(), 1);
        Ok(())
    }

    #[test]
    fn malformed_turn_fields_do_not_lose_the_split() -> TestResult {
        let dialogues = read_dialogues(
            r#"[
                {
                    "dialogue_id": "MUL0003",
                    "turns": [
                        { "turn_id": 0, "speaker": "wizard", "utterance": "hello" },
                        { "turn_id": "one", "utterance": 42, "system_response": ["x"],
                          "belief_state": "hotel-area=east" }
                    ]
                },
                { "dialogue_id": "MUL0004", "turns": [{ "turn_id": 0, "utterance": "hi" }] }
            ]"#
            .as_bytes(),
        )?;

        assert_eq!(dialogues.len(), 2);
        let turns = &dialogues[0].turns;
        assert_eq!(turns[0].speaker, Speaker::System);
        assert_eq!(turns[0].utterance, "hello");
        assert_eq!(turns[1].turn_id, 0);
        assert_eq!(turns[1].utterance, "");
        assert_eq!(turns[1].system_response, "");
        assert!(turns[1].belief_state.is_empty());
        assert_eq!(dialogues[1].turns[0].utterance, "hi");
        Ok(())
    }

    #[test]
    fn loading_derives_deltas_from_snapshots() -> TestResult {
        let dir = tempfile::tempdir()?;
        let split = r#"[{
            "dialogue_id": "SNG02",
            "turns": [
                { "turn_id": 0, "utterance": "a hotel in the east",
                  "belief_state": { "hotel-area": "east" } },
                { "turn_id": 1, "utterance": "with 4 stars",
                  "belief_state": { "hotel-area": "east", "hotel-stars": "4" } }
            ]
        }]"#;
        for split_name in ["train.json", "val.json", "test.json"] {
            std::fs::write(dir.path().join(split_name), split)?;
        }

        let corpus = Corpus::load(dir.path())?;
        assert!(corpus.ontology.is_none());
        for dialogues in [&corpus.train, &corpus.val, &corpus.test] {
            let turns = &dialogues[0].turns;
            assert_eq!(
                turns[0].belief_state_delta,
                BeliefState::from_pairs([("hotel-area", "east")])?
            );
            assert_eq!(
                turns[1].belief_state_delta,
                BeliefState::from_pairs([("hotel-stars", "4")])?
            );
        }
        Ok(())
    }

    #[test]
    fn corrupt_split_is_an_error() {
        assert!(matches!(
            read_dialogues("[{".as_bytes()),
            Err(DialogStateError::Json(_))
        ));
    }

    #[test]
    fn missing_split_is_an_error() {
        assert!(matches!(
            Corpus::load("/definitely/not/a/corpus"),
            Err(DialogStateError::Io { .. })
        ));
    }

    #[test]
    fn validation_rejects_out_of_order_turns() {
        let dialogue = Dialogue::new("MUL0002")
            .with_turn(Turn::user(1, "hello"))
            .with_turn(Turn::user(1, "again"));
        assert!(matches!(
            dialogue.validate(),
            Err(DialogStateError::InvalidDialogue { .. })
        ));
        assert!(Dialogue::new(" ").validate().is_err());
        assert!(Dialogue::new("ok").validate().is_ok());
    }

    #[test]
    fn lookup_by_id_and_domain() {
        let corpus = Corpus {
            train: vec![Dialogue::new("a").with_domain(Domain::Taxi)],
            test: vec![Dialogue::new("b").with_domain(Domain::Hotel)],
            ..Corpus::default()
        };
        assert!(corpus.dialogue("b", None).is_some());
        assert!(corpus.dialogue("b", Some(Split::Train)).is_none());
        assert_eq!(corpus.dialogues_in_domain(Domain::Taxi, Split::Train).len(), 1);
    }
}
