//! The slot ontology: allowed values per slot.
//!
//! The ontology document maps each domain to two slot groups, `semi`
//! (informable constraints such as `area` or `pricerange`) and `book`
//! (booking details such as `day` or `people`):
//!
//! ```json
//! { "hotel": { "semi": { "area": ["east", "west"] }, "book": { "day": ["monday"] } } }
//! ```
//!
//! It is only ever read: the predictor uses it to reject extracted spans that
//! are not a legal value of an enumerated slot, and values that match an
//! enumeration are tagged [`ValueKind::Categorical`].

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::DialogStateError;
use crate::slot::{SlotId, Value, ValueKind};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainOntology {
    #[serde(default)]
    pub semi: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub book: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ontology(BTreeMap<String, DomainOntology>);

impl Ontology {
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, DialogStateError> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, DialogStateError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|error| DialogStateError::io(path, error))?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn insert_domain(&mut self, domain: impl Into<String>, ontology: DomainOntology) {
        self.0.insert(domain.into(), ontology);
    }

    /// The enumerated values for a slot; `semi` takes precedence over `book`.
    pub fn allowed_values(&self, slot: &SlotId) -> Option<&[String]> {
        let domain = self.0.get(slot.domain())?;
        domain
            .semi
            .get(slot.name())
            .or_else(|| domain.book.get(slot.name()))
            .map(Vec::as_slice)
            .filter(|values| !values.is_empty())
    }

    pub fn is_enumerated(&self, slot: &SlotId) -> bool {
        self.allowed_values(slot).is_some()
    }

    /// Whether `text` is acceptable for `slot`. Slots the ontology does not
    /// enumerate accept any text.
    pub fn permits(&self, slot: &SlotId, text: &str) -> bool {
        match self.allowed_values(slot) {
            Some(values) => values.iter().any(|allowed| allowed.eq_ignore_ascii_case(text)),
            None => true,
        }
    }

    /// Tag a value as categorical when it is one of the slot's enumerated values.
    pub fn classify(&self, slot: &SlotId, value: Value) -> Value {
        let categorical = self
            .allowed_values(slot)
            .is_some_and(|values| values.iter().any(|allowed| allowed == value.as_str()));
        if categorical {
            value.with_kind(ValueKind::Categorical)
        } else {
            value
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use testresult::TestResult;

    fn ontology() -> Result<Ontology, serde_json::Error> {
        serde_json::from_str(
            r#"{
                "hotel": {
                    "semi": { "area": ["east", "west", "centre"] },
                    "book": { "day": ["monday", "tuesday"], "area": ["nowhere"] }
                },
                "taxi": { "semi": { "destination": [] } }
            }"#,
        )
    }

    #[test]
    fn semi_values_take_precedence_over_book() -> TestResult {
        let ontology = ontology()?;
        let area = SlotId::parse("hotel-area")?;
        assert_eq!(
            ontology.allowed_values(&area).map(<[String]>::len),
            Some(3)
        );
        assert!(ontology.permits(&SlotId::parse("hotel-day")?, "Monday"));
        Ok(())
    }

    #[test]
    fn slots_without_enumeration_accept_anything() -> TestResult {
        let ontology = ontology()?;
        assert!(!ontology.is_enumerated(&SlotId::parse("taxi-destination")?));
        assert!(ontology.permits(&SlotId::parse("taxi-destination")?, "the station"));
        assert!(ontology.permits(&SlotId::parse("train-day")?, "someday"));
        assert!(!ontology.permits(&SlotId::parse("hotel-area")?, "north pole"));
        Ok(())
    }

    #[test]
    fn classify_tags_enumerated_values() -> TestResult {
        let ontology = ontology()?;
        let area = SlotId::parse("hotel-area")?;
        assert_eq!(
            ontology.classify(&area, Value::free_text("east")).kind(),
            ValueKind::Categorical
        );
        assert_eq!(
            ontology.classify(&area, Value::free_text("far east")).kind(),
            ValueKind::FreeText
        );
        Ok(())
    }
}
