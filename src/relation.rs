//! Learned facts: a compound, a value and its units.

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::corpus::TaggedSpan;
use crate::error::{ConfigError, RelexResult, SeedError};
use crate::phrase::PhraseId;
use crate::text::{ends_with_word_char, starts_with_word_char};

/// Identity of a relation: the trimmed `(compound, value, units)` triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationKey {
    pub compound: String,
    pub value: String,
    pub units: String,
}

impl RelationKey {
    pub fn new(compound: &str, value: &str, units: &str) -> Self {
        Self {
            compound: compound.trim().to_string(),
            value: value.trim().to_string(),
            units: units.trim().to_string(),
        }
    }

    /// Validate a raw seed tuple.
    pub fn from_seed(index: usize, fields: &[String]) -> Result<Self, SeedError> {
        let [compound, value, units] = fields else {
            return Err(SeedError::Arity {
                index,
                found: fields.len(),
            });
        };
        let key = Self::new(compound, value, units);
        for (field, text) in [
            ("compound", &key.compound),
            ("value", &key.value),
            ("units", &key.units),
        ] {
            if text.is_empty() {
                return Err(SeedError::EmptyField { index, field });
            }
        }
        Ok(key)
    }

    /// All three fields are non-empty.
    pub fn is_complete(&self) -> bool {
        !self.compound.is_empty() && !self.value.is_empty() && !self.units.is_empty()
    }
}

impl fmt::Display for RelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.compound, self.value, self.units)
    }
}

/// A fact with its supporting phrases and relocation regexes.
#[derive(Debug, Clone)]
pub struct Relation {
    key: RelationKey,
    confidence: f64,
    phrases: Vec<PhraseId>,
    found: bool,
    compound_regex: Regex,
    value_regex: Regex,
}

impl Relation {
    pub fn new(key: RelationKey, confidence: f64) -> RelexResult<Self> {
        let compound_regex = locator("compound locator", &compound_source(&key.compound))?;
        let value_regex = locator("value locator", &value_source(&key.value))?;
        Ok(Self {
            key,
            confidence: confidence.clamp(0.0, 1.0),
            phrases: Vec::new(),
            found: false,
            compound_regex,
            value_regex,
        })
    }

    pub(crate) fn restore(
        key: RelationKey,
        confidence: f64,
        found: bool,
        phrases: Vec<PhraseId>,
    ) -> RelexResult<Self> {
        let mut relation = Self::new(key, confidence)?;
        relation.found = found;
        relation.phrases = phrases;
        Ok(relation)
    }

    pub fn key(&self) -> &RelationKey {
        &self.key
    }

    pub fn compound(&self) -> &str {
        &self.key.compound
    }

    pub fn value(&self) -> &str {
        &self.key.value
    }

    pub fn units(&self) -> &str {
        &self.key.units
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn phrases(&self) -> &[PhraseId] {
        &self.phrases
    }

    /// Whether the relation has been seen in any processed text.
    pub fn is_found(&self) -> bool {
        self.found
    }

    pub(crate) fn mark_found(&mut self) {
        self.found = true;
    }

    pub(crate) fn add_phrase(&mut self, id: PhraseId) {
        if !self.phrases.contains(&id) {
            self.phrases.push(id);
        }
    }

    pub fn compound_regex(&self) -> &str {
        self.compound_regex.as_str()
    }

    pub fn value_regex(&self) -> &str {
        self.value_regex.as_str()
    }

    /// Occurrences of the compound in `text`.
    pub fn locate_compound(&self, text: &str) -> Vec<TaggedSpan> {
        self.compound_regex
            .find_iter(text)
            .map(|m| TaggedSpan::new(m.start(), m.end(), 0))
            .collect()
    }

    /// Occurrences of the value in `text`, delimited by whitespace or the
    /// string edges.
    pub fn locate_value(&self, text: &str) -> Vec<TaggedSpan> {
        self.value_regex
            .captures_iter(text)
            .filter_map(|caps| caps.name("value"))
            .map(|m| TaggedSpan::new(m.start(), m.end(), 0))
            .collect()
    }
}

fn compound_source(compound: &str) -> String {
    let lead = if starts_with_word_char(compound) { r"\b" } else { "" };
    let trail = if ends_with_word_char(compound) { r"\b" } else { "" };
    format!("{lead}{}{trail}", regex::escape(compound))
}

fn value_source(value: &str) -> String {
    format!(r"(?:^|\s)(?P<value>{})(?:\s|$)", regex::escape(value))
}

fn locator(role: &str, source: &str) -> RelexResult<Regex> {
    Regex::new(source).map_err(|e| {
        ConfigError::InvalidRegex {
            role: role.to_string(),
            message: e.to_string(),
        }
        .into()
    })
}

/// One extracted fact as handed to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationRecord {
    pub property: String,
    pub names: Vec<String>,
    pub value: String,
    pub units: String,
    pub confidence: f64,
}

impl RelationRecord {
    pub fn from_relation(property: &str, relation: &Relation) -> Self {
        Self {
            property: property.to_string(),
            names: vec![relation.compound().to_string()],
            value: relation.value().to_string(),
            units: relation.units().to_string(),
            confidence: relation.confidence(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn seeds_are_trimmed() {
        let key = RelationKey::from_seed(0, &seed(&[" CoS2 ", "116", " K"])).unwrap();
        assert_eq!(key, RelationKey::new("CoS2", "116", "K"));
        assert!(key.is_complete());
    }

    #[test]
    fn seed_arity_is_checked() {
        let err = RelationKey::from_seed(3, &seed(&["CoS2", "116"])).unwrap_err();
        assert!(matches!(err, SeedError::Arity { index: 3, found: 2 }));
    }

    #[test]
    fn seed_fields_must_be_non_empty() {
        let err = RelationKey::from_seed(0, &seed(&["CoS2", "  ", "K"])).unwrap_err();
        assert!(matches!(err, SeedError::EmptyField { field: "value", .. }));
    }

    #[test]
    fn compound_locator_respects_word_boundaries() {
        let rel = Relation::new(RelationKey::new("CoS2", "116", "K"), 1.0).unwrap();
        let text = "CoS2 and NiCoS2 and CoS2.";
        let spans = rel.locate_compound(text);
        assert_eq!(spans.len(), 2);
        assert_eq!((spans[0].start, spans[0].end), (0, 4));
        assert_eq!(spans[1].start, 20);
    }

    #[test]
    fn compound_locator_with_trailing_bracket() {
        let rel = Relation::new(RelationKey::new("Fe(II)", "5", "K"), 1.0).unwrap();
        assert_eq!(rel.compound_regex(), r"\bFe\(II\)");
        assert_eq!(rel.locate_compound("doped Fe(II) salts").len(), 1);
    }

    #[test]
    fn value_locator_needs_whitespace_delimiters() {
        let rel = Relation::new(RelationKey::new("CoS2", "116", "K"), 1.0).unwrap();
        let spans = rel.locate_value("of 116 K but not 1116 K or 116K");
        assert_eq!(spans.len(), 1);
        assert_eq!((spans[0].start, spans[0].end), (3, 6));
        assert_eq!(rel.locate_value("116").len(), 1);
    }

    #[test]
    fn phrases_are_deduplicated() {
        let mut rel = Relation::new(RelationKey::new("CoS2", "116", "K"), 0.5).unwrap();
        rel.add_phrase(PhraseId::new(0));
        rel.add_phrase(PhraseId::new(0));
        rel.add_phrase(PhraseId::new(2));
        assert_eq!(rel.phrases(), &[PhraseId::new(0), PhraseId::new(2)]);
        assert!(!rel.is_found());
        rel.mark_found();
        assert!(rel.is_found());
    }

    #[test]
    fn record_from_relation() {
        let rel = Relation::new(RelationKey::new("Fe3O4", "858", "K"), 0.9).unwrap();
        let record = RelationRecord::from_relation("curie_temperatures", &rel);
        assert_eq!(record.names, vec!["Fe3O4"]);
        assert_eq!(record.confidence, 0.9);
    }
}
