//! Belief states: ordered mappings from [`SlotId`] to [`Value`].
//!
//! The same type carries both full per-turn snapshots and per-turn deltas;
//! a delta is simply the subset of a snapshot that changed. The backing map
//! is a `BTreeMap`, so iteration (and therefore every serialized artifact)
//! is ordered by canonical slot name.
//!
//! Deserialization is deliberately forgiving: `null` becomes an empty state,
//! and entries whose key is not a valid slot, whose value is not a string, or
//! whose value is a placeholder are dropped rather than failing the corpus.

use std::collections::BTreeMap;
use std::collections::btree_map;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::DialogStateError;
use crate::slot::{SlotId, Value};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BeliefState(BTreeMap<SlotId, Value>);

impl BeliefState {
    pub fn new() -> Self {
        BeliefState(BTreeMap::new())
    }

    /// Build a state from string pairs. Placeholder values are dropped;
    /// malformed slot keys are an error.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, DialogStateError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut state = BeliefState::new();
        for (slot, value) in pairs {
            let slot = SlotId::parse(slot.as_ref())?;
            if let Some(value) = Value::parse(value.as_ref()) {
                state.insert(slot, value);
            }
        }
        Ok(state)
    }

    pub fn get(&self, slot: &SlotId) -> Option<&Value> {
        self.0.get(slot)
    }

    pub fn contains(&self, slot: &SlotId) -> bool {
        self.0.contains_key(slot)
    }

    pub fn insert(&mut self, slot: SlotId, value: Value) -> Option<Value> {
        self.0.insert(slot, value)
    }

    pub fn remove(&mut self, slot: &SlotId) -> Option<Value> {
        self.0.remove(slot)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, SlotId, Value> {
        self.0.iter()
    }

    pub fn slots(&self) -> btree_map::Keys<'_, SlotId, Value> {
        self.0.keys()
    }

    /// The entries of `self` that are absent from `base` or carry a
    /// different value there.
    pub fn changed_since(&self, base: &BeliefState) -> BeliefState {
        self.iter()
            .filter(|(slot, value)| base.get(slot) != Some(*value))
            .map(|(slot, value)| (slot.clone(), value.clone()))
            .collect()
    }

    /// Right-biased union: values from `other` win on conflict.
    pub fn merge_from(&mut self, other: &BeliefState) {
        for (slot, value) in other {
            self.0.insert(slot.clone(), value.clone());
        }
    }
}

impl FromIterator<(SlotId, Value)> for BeliefState {
    fn from_iter<T: IntoIterator<Item = (SlotId, Value)>>(iter: T) -> Self {
        BeliefState(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a BeliefState {
    type Item = (&'a SlotId, &'a Value);
    type IntoIter = btree_map::Iter<'a, SlotId, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for BeliefState {
    type Item = (SlotId, Value);
    type IntoIter = btree_map::IntoIter<SlotId, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'de> Deserialize<'de> for BeliefState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::Object(entries) => entries,
            serde_json::Value::Null => serde_json::Map::new(),
            other => {
                tracing::debug!(state = %other, "belief state is not an object");
                serde_json::Map::new()
            }
        };
        let mut state = BeliefState::new();

        for (key, value) in raw {
            let slot = match SlotId::parse(&key) {
                Ok(slot) => slot,
                Err(error) => {
                    tracing::debug!(%error, "dropping belief-state entry");
                    continue;
                }
            };
            let Some(text) = value.as_str() else {
                tracing::debug!(slot = %slot, "dropping non-string belief-state value");
                continue;
            };
            if let Some(value) = Value::parse(text) {
                state.insert(slot, value);
            }
        }

        Ok(state)
    }
}
