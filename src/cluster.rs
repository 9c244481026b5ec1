//! Clusters of phrases that share an entity ordering.
//!
//! Each cluster keeps one token dictionary per slot. Phrase slots are
//! vectorised against those dictionaries on demand; nothing is cached, so
//! vectors always reflect the current membership.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::config::EntityRegexes;
use crate::error::{ClusterError, PatternError};
use crate::pattern::{Evidence, Pattern};
use crate::phrase::{Element, Entity, Order, Phrase, PhraseId};
use crate::similarity::{SimilarityWeights, SlotVector, weighted_similarity};

/// Unique, monotonically assigned cluster label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterLabel(u32);

impl ClusterLabel {
    pub fn new(label: u32) -> Self {
        Self(label)
    }

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for ClusterLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenWeight {
    pub count: u32,
    pub weight: f64,
}

/// Token frequencies at one slot, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenDictionary {
    tokens: IndexMap<String, TokenWeight>,
    total: u32,
}

impl TokenDictionary {
    fn add_tokens(&mut self, tokens: &[String]) {
        for token in tokens {
            self.tokens
                .entry(token.clone())
                .or_insert(TokenWeight {
                    count: 0,
                    weight: 0.0,
                })
                .count += 1;
            self.total += 1;
        }
    }

    fn recompute_weights(&mut self) {
        let total = f64::from(self.total.max(1));
        for entry in self.tokens.values_mut() {
            entry.weight = f64::from(entry.count) / total;
        }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn get(&self, token: &str) -> Option<&TokenWeight> {
        self.tokens.get(token)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TokenWeight)> {
        self.tokens.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Unit-length vector of learned weights for the tokens of `element`.
    ///
    /// Unknown tokens are dropped. A slot with no known tokens gives the
    /// zero vector of the dictionary's dimensionality.
    pub fn vectorise(&self, element: &Element) -> SlotVector {
        let mut values = vec![0.0; self.tokens.len()];
        for token in &element.tokens {
            if let Some((index, _, entry)) = self.tokens.get_full(token.as_str()) {
                values[index] = entry.weight;
            }
        }
        let norm = values.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for v in &mut values {
                *v /= norm;
            }
        }
        SlotVector {
            values,
            empty: element.is_empty(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Cluster {
    label: ClusterLabel,
    order: Order,
    minimum_match_score: f64,
    phrases: Vec<PhraseId>,
    entities: Vec<Entity>,
    dictionaries: Vec<TokenDictionary>,
    pattern: Option<Pattern>,
}

impl Cluster {
    pub fn new(label: ClusterLabel, order: Order, minimum_match_score: f64) -> Self {
        Self {
            label,
            order,
            minimum_match_score,
            phrases: Vec::new(),
            entities: Vec::new(),
            dictionaries: Vec::new(),
            pattern: None,
        }
    }

    pub fn label(&self) -> ClusterLabel {
        self.label
    }

    pub fn order(&self) -> &Order {
        &self.order
    }

    pub fn minimum_match_score(&self) -> f64 {
        self.minimum_match_score
    }

    pub fn phrase_ids(&self) -> &[PhraseId] {
        &self.phrases
    }

    pub fn len(&self) -> usize {
        self.phrases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }

    pub fn contains(&self, id: PhraseId) -> bool {
        self.phrases.contains(&id)
    }

    /// Entities of the most recently added phrase.
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn dictionaries(&self) -> &[TokenDictionary] {
        &self.dictionaries
    }

    pub fn pattern(&self) -> Option<&Pattern> {
        self.pattern.as_ref()
    }

    /// Admit a phrase and refresh every slot weight.
    pub fn add(&mut self, id: PhraseId, phrase: &Phrase) -> Result<(), ClusterError> {
        if phrase.order() != &self.order {
            return Err(ClusterError::OrderMismatch {
                label: self.label.get(),
                expected: self.order.to_string(),
                actual: phrase.order().to_string(),
            });
        }
        self.phrases.push(id);
        self.entities = phrase.entities().to_vec();

        let elements = phrase.elements();
        if self.dictionaries.len() < elements.len() {
            self.dictionaries
                .resize_with(elements.len(), TokenDictionary::default);
        }
        for (dictionary, element) in self.dictionaries.iter_mut().zip(elements) {
            dictionary.add_tokens(&element.tokens);
        }
        for dictionary in &mut self.dictionaries {
            dictionary.recompute_weights();
        }
        Ok(())
    }

    /// Vectorise token slots against this cluster's dictionaries.
    pub fn vectorise(&self, elements: &[Element]) -> Vec<SlotVector> {
        self.dictionaries
            .iter()
            .zip(elements)
            .map(|(dictionary, element)| dictionary.vectorise(element))
            .collect()
    }

    /// Similarity of a phrase to the current pattern.
    ///
    /// `None` when the orderings differ or no pattern exists yet.
    pub fn similarity(&self, phrase: &Phrase, weights: &SimilarityWeights) -> Option<f64> {
        let pattern = self.pattern.as_ref()?;
        if phrase.order() != &self.order {
            return None;
        }
        let candidate = self.vectorise(phrase.elements());
        let centroid = self.vectorise(pattern.elements());
        Some(weighted_similarity(&candidate, &centroid, weights))
    }

    /// Derive a fresh pattern from the members.
    ///
    /// `members` must be the phrases of [`Cluster::phrase_ids`], in order.
    /// Per slot the representative is the member nearest to the modal
    /// vector. When a previous pattern exists and the new estimate has
    /// support, the confidences are blended by `learning_rate`.
    pub fn update_pattern(
        &mut self,
        members: &[&Phrase],
        evidence: &Evidence<'_>,
        regexes: &EntityRegexes,
        learning_rate: f64,
    ) -> Result<(), PatternError> {
        if members.is_empty() {
            self.pattern = None;
            return Ok(());
        }
        let vectors: Vec<Vec<SlotVector>> = members
            .iter()
            .map(|phrase| self.vectorise(phrase.elements()))
            .collect();

        let mut representative = Vec::with_capacity(self.dictionaries.len());
        for slot in 0..self.dictionaries.len() {
            let column: Vec<&SlotVector> = vectors.iter().map(|v| &v[slot]).collect();
            let modal = column[modal_index(&column)];
            let medoid = nearest_index(&column, modal);
            representative.push(members[medoid].elements()[slot].clone());
        }

        let mut pattern = Pattern::compile(
            self.label,
            self.order.clone(),
            self.entities.clone(),
            representative,
            regexes,
        )?;
        let estimate = pattern.estimate_confidence(evidence);
        if let Some(previous) = &self.pattern {
            if estimate.is_supported() {
                pattern.blend(previous.confidence(), learning_rate);
            }
        }
        tracing::debug!(
            cluster = self.label.get(),
            members = members.len(),
            confidence = pattern.confidence(),
            "pattern refreshed"
        );
        self.pattern = Some(pattern);
        Ok(())
    }

    pub(crate) fn restore_pattern(&mut self, pattern: Pattern) {
        self.pattern = Some(pattern);
    }
}

/// Index of the most frequent vector; ties go to the first occurrence.
fn modal_index(column: &[&SlotVector]) -> usize {
    let mut best = 0;
    let mut best_count = 0;
    for (i, candidate) in column.iter().enumerate() {
        let count = column.iter().filter(|v| v.values == candidate.values).count();
        if count > best_count {
            best = i;
            best_count = count;
        }
    }
    best
}

/// Index of the vector nearest to `target`; ties go to the first.
fn nearest_index(column: &[&SlotVector], target: &SlotVector) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (i, candidate) in column.iter().enumerate() {
        let distance = candidate.euclidean(target);
        if distance < best_distance {
            best = i;
            best_distance = distance;
        }
    }
    best
}
