//! Slot identifiers, domains and slot values.
//!
//! A slot is addressed by its canonical `domain-slot` string (for example
//! `hotel-area` or `train-leaveat`). The canonical form is lowercase and is
//! the single source of truth for equality, hashing and ordering, so two
//! [`SlotId`]s compare equal exactly when their serialized forms do.
//!
//! Values are kept verbatim apart from placeholder filtering: the corpus
//! marks unset slots with `""`, `"none"` or `"not mentioned"`, and those are
//! never materialized as facts (see [`Value::parse`]).

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::DialogStateError;

/// Values the corpus uses to say "this slot is not set".
pub const PLACEHOLDER_VALUES: [&str; 3] = ["", "none", "not mentioned"];

/// A canonical `(domain, slot-name)` pair, stored as `"domain-slot"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SlotId(String);

impl SlotId {
    /// Build a slot id from its two parts.
    pub fn new(domain: &str, name: &str) -> Result<Self, DialogStateError> {
        Self::parse(&format!("{domain}-{name}"))
    }

    /// Parse a `domain-slot` key. The domain is everything before the first
    /// `-`; both parts must be non-empty.
    pub fn parse(raw: &str) -> Result<Self, DialogStateError> {
        let canonical = raw.trim().to_lowercase();
        match canonical.split_once('-') {
            Some((domain, name)) if !domain.is_empty() && !name.trim().is_empty() => {
                Ok(SlotId(canonical))
            }
            _ => Err(DialogStateError::InvalidSlot(raw.to_string())),
        }
    }

    pub fn domain(&self) -> &str {
        self.0.split_once('-').map_or(self.0.as_str(), |(domain, _)| domain)
    }

    pub fn name(&self) -> &str {
        self.0.split_once('-').map_or("", |(_, name)| name)
    }

    /// The domain of this slot, if it is one of the tracked [`Domain`]s.
    pub fn known_domain(&self) -> Option<Domain> {
        self.domain().parse().ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SlotId {
    type Err = DialogStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SlotId::parse(s)
    }
}

impl TryFrom<String> for SlotId {
    type Error = DialogStateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        SlotId::parse(&value)
    }
}

impl From<SlotId> for String {
    fn from(value: SlotId) -> Self {
        value.0
    }
}

/// The task domains a dialogue may cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Hotel,
    Restaurant,
    Train,
    Attraction,
    Taxi,
}

impl Domain {
    pub const ALL: [Domain; 5] = [
        Domain::Hotel,
        Domain::Restaurant,
        Domain::Train,
        Domain::Attraction,
        Domain::Taxi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hotel => "hotel",
            Self::Restaurant => "restaurant",
            Self::Train => "train",
            Self::Attraction => "attraction",
            Self::Taxi => "taxi",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Domain::ALL
            .into_iter()
            .find(|domain| domain.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| s.to_string())
    }
}

/// Where a value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueKind {
    /// Free-form text, e.g. a restaurant name.
    #[default]
    FreeText,
    /// One of the values the ontology enumerates for the slot.
    Categorical,
}

/// A slot value.
///
/// Equality, ordering and hashing consider the text only; the kind is
/// annotation derived from the ontology and is not serialized.
#[derive(Debug, Clone)]
pub struct Value {
    text: String,
    kind: ValueKind,
}

impl Value {
    /// Materialize a raw corpus value, or `None` when it is a placeholder.
    pub fn parse(raw: &str) -> Option<Self> {
        if is_placeholder(raw) {
            None
        } else {
            Some(Value::free_text(raw))
        }
    }

    pub fn free_text(text: impl Into<String>) -> Self {
        Value {
            text: text.into(),
            kind: ValueKind::FreeText,
        }
    }

    pub fn categorical(text: impl Into<String>) -> Self {
        Value {
            text: text.into(),
            kind: ValueKind::Categorical,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn with_kind(mut self, kind: ValueKind) -> Self {
        self.kind = kind;
        self
    }
}

/// True for the values the corpus uses to mean "unset".
pub fn is_placeholder(raw: &str) -> bool {
    let normalized = raw.trim().to_lowercase();
    PLACEHOLDER_VALUES.contains(&normalized.as_str())
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        self.text.cmp(&other.text)
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.text.hash(state);
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Value::free_text)
    }
}
