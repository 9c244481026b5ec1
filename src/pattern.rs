//! Cluster centroid patterns and their compiled matchers.

use std::fmt::Write as _;

use indexmap::IndexSet;
use regex::{Regex, RegexBuilder};

use crate::cluster::ClusterLabel;
use crate::config::EntityRegexes;
use crate::error::PatternError;
use crate::phrase::{Element, Entity, EntityKind, Order, pair_triples, render};
use crate::relation::RelationKey;
use crate::text::starts_with_word_char;

/// Placeholder for compound names inside a pattern.
pub const COMPOUND_WILDCARD: &str = r"[A-Za-z0-9\(\[][A-Za-z0-9\(\)\[\]\-\+\.,/·]*";

/// What a new pattern is scored against: the known relations and the
/// sentences that produced phrases so far.
pub struct Evidence<'a> {
    known: &'a dyn Fn(&RelationKey) -> bool,
    sentences: &'a IndexSet<String>,
}

impl<'a> Evidence<'a> {
    pub fn new(known: &'a dyn Fn(&RelationKey) -> bool, sentences: &'a IndexSet<String>) -> Self {
        Self { known, sentences }
    }

    fn is_known(&self, key: &RelationKey) -> bool {
        (self.known)(key)
    }
}

/// Raw counts behind a confidence estimate.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ConfidenceEstimate {
    pub correct: f64,
    pub total: f64,
}

impl ConfidenceEstimate {
    /// At least one triple was reconstructed.
    pub fn is_supported(&self) -> bool {
        self.total > 0.0
    }

    pub fn confidence(&self) -> f64 {
        if self.total > 0.0 {
            (self.correct / self.total).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone)]
pub struct Pattern {
    cluster_label: ClusterLabel,
    order: Order,
    entities: Vec<Entity>,
    elements: Vec<Element>,
    matcher: Regex,
    group_names: Vec<String>,
    confidence: f64,
}

impl Pattern {
    /// Compile a pattern from representative slots. Confidence starts at 0.
    pub fn compile(
        cluster_label: ClusterLabel,
        order: Order,
        entities: Vec<Entity>,
        elements: Vec<Element>,
        regexes: &EntityRegexes,
    ) -> Result<Self, PatternError> {
        let source = matcher_source(&order, &elements, regexes);
        let matcher = RegexBuilder::new(&source)
            .case_insensitive(true)
            .build()
            .map_err(|e| PatternError::Compile {
                label: cluster_label.get(),
                message: e.to_string(),
            })?;
        let group_names = (0..order.len()).map(|i| format!("e{i}")).collect();
        Ok(Self {
            cluster_label,
            order,
            entities,
            elements,
            matcher,
            group_names,
            confidence: 0.0,
        })
    }

    /// Recompile a stored pattern, keeping its confidence as persisted.
    pub fn restore(
        cluster_label: ClusterLabel,
        order: Order,
        entities: Vec<Entity>,
        elements: Vec<Element>,
        confidence: f64,
        regexes: &EntityRegexes,
    ) -> Result<Self, PatternError> {
        let mut pattern = Self::compile(cluster_label, order, entities, elements, regexes)?;
        pattern.confidence = confidence.clamp(0.0, 1.0);
        Ok(pattern)
    }

    pub fn cluster_label(&self) -> ClusterLabel {
        self.cluster_label
    }

    pub fn order(&self) -> &Order {
        &self.order
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Source text of the compiled matcher.
    pub fn matcher_source(&self) -> &str {
        self.matcher.as_str()
    }

    /// Triples per non-overlapping match in `text`.
    pub fn match_triples(&self, text: &str) -> Vec<Vec<RelationKey>> {
        self.matcher
            .captures_iter(text)
            .map(|caps| {
                let tagged: Vec<(EntityKind, u32, &str)> = self
                    .entities
                    .iter()
                    .zip(&self.group_names)
                    .filter_map(|(entity, name)| {
                        caps.name(name).map(|m| (entity.kind, entity.id, m.as_str()))
                    })
                    .collect();
                pair_triples(&tagged)
            })
            .collect()
    }

    /// All triples the pattern extracts from `text`.
    pub fn extract(&self, text: &str) -> Vec<RelationKey> {
        self.match_triples(text).into_iter().flatten().collect()
    }

    /// Score the pattern against the evidence and store the result.
    ///
    /// Every match that reconstructs at least one triple counts once towards
    /// the total; each known triple in it adds `1/k` to the correct count,
    /// where `k` is the number of triples the match produced.
    pub fn estimate_confidence(&mut self, evidence: &Evidence<'_>) -> ConfidenceEstimate {
        let mut estimate = ConfidenceEstimate::default();
        for sentence in evidence.sentences {
            for triples in self.match_triples(sentence) {
                let k = triples.len();
                if k == 0 {
                    continue;
                }
                estimate.total += 1.0;
                for triple in &triples {
                    if evidence.is_known(triple) {
                        estimate.correct += 1.0 / k as f64;
                    }
                }
            }
        }
        self.confidence = estimate.confidence();
        estimate
    }

    /// `lr * current + (1 - lr) * previous`.
    pub fn blend(&mut self, previous: f64, learning_rate: f64) {
        self.confidence =
            (learning_rate * self.confidence + (1.0 - learning_rate) * previous).clamp(0.0, 1.0);
    }

    /// Tagged rendering, e.g. `<CEM1> is ferromagnetic with a <SPECIFIER1> of <VALUE1> <UNIT1> .`
    pub fn as_string(&self) -> String {
        render(&self.elements, &self.entities, Entity::tag)
    }
}

fn join_escaped(element: &Element) -> String {
    element
        .tokens
        .iter()
        .map(|t| regex::escape(t))
        .collect::<Vec<_>>()
        .join(r"\s?")
}

fn entity_source(kind: EntityKind, regexes: &EntityRegexes) -> &str {
    match kind {
        EntityKind::Compound => COMPOUND_WILDCARD,
        EntityKind::Value => regexes.value.as_str(),
        EntityKind::Specifier => regexes.specifier.as_str(),
        EntityKind::Unit => regexes.unit.as_str(),
    }
}

/// Build the matcher source for a slot list.
///
/// The leading `\b` is omitted when the prefix starts with punctuation.
fn matcher_source(order: &Order, elements: &[Element], regexes: &EntityRegexes) -> String {
    let empty = Element::default();
    let slot = |i: usize| elements.get(i).unwrap_or(&empty);
    let n = order.len();

    let mut source = String::new();
    let prefix = slot(0);
    let leading_punctuation = prefix
        .tokens
        .first()
        .is_some_and(|t| !starts_with_word_char(t));
    if !leading_punctuation {
        source.push_str(r"\b");
    }
    source.push_str(&join_escaped(prefix));
    source.push_str(r"\s?");

    for (i, kind) in order.kinds().enumerate() {
        let _ = write!(source, "(?P<e{i}>(?:{}))", entity_source(kind, regexes));
        if i + 1 < n {
            source.push_str(r"\s?");
            source.push_str(&join_escaped(slot(i + 1)));
            source.push_str(r"\s?");
        }
    }

    source.push_str(r"\s?");
    source.push_str(&join_escaped(slot(n)));
    source
}
