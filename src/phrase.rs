//! One sentence occurrence of a candidate relation.
//!
//! A phrase is the ordered list of tagged entities plus the token context
//! around and between them. Slot 0 holds the prefix, slots `1..n-1` the
//! middles (one per gap between adjacent entities) and slot `n` the suffix.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cluster::ClusterLabel;
use crate::corpus::TaggedSpans;
use crate::relation::RelationKey;
use crate::text::{normalize, tokenize};

/// Entity type, with its single-digit ordering code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Compound,
    Value,
    Specifier,
    Unit,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Compound,
        EntityKind::Value,
        EntityKind::Specifier,
        EntityKind::Unit,
    ];

    pub fn code(self) -> char {
        match self {
            EntityKind::Compound => '0',
            EntityKind::Value => '1',
            EntityKind::Specifier => '2',
            EntityKind::Unit => '3',
        }
    }

    pub fn from_code(code: char) -> Option<Self> {
        match code {
            '0' => Some(EntityKind::Compound),
            '1' => Some(EntityKind::Value),
            '2' => Some(EntityKind::Specifier),
            '3' => Some(EntityKind::Unit),
            _ => None,
        }
    }

    /// Tag name used when rendering phrases and patterns.
    pub fn tag(self) -> &'static str {
        match self {
            EntityKind::Compound => "CEM",
            EntityKind::Value => "VALUE",
            EntityKind::Specifier => "SPECIFIER",
            EntityKind::Unit => "UNIT",
        }
    }
}

/// The entity-type sequence of a phrase, e.g. `"0213"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Order(String);

impl Order {
    pub fn from_kinds(kinds: impl IntoIterator<Item = EntityKind>) -> Self {
        Self(kinds.into_iter().map(EntityKind::code).collect())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Decode the kinds back out; unknown codes are skipped.
    pub fn kinds(&self) -> impl Iterator<Item = EntityKind> + '_ {
        self.0.chars().filter_map(EntityKind::from_code)
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub text: String,
    pub kind: EntityKind,
    pub id: u32,
    pub start: usize,
    pub end: usize,
}

impl Entity {
    /// Rendered tag, e.g. `<CEM1>`.
    pub fn tag(&self) -> String {
        format!("<{}{}>", self.kind.tag(), self.id)
    }
}

/// One token slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Element {
    pub tokens: Vec<String>,
}

impl Element {
    pub fn new(tokens: Vec<String>) -> Self {
        Self { tokens }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Index of a phrase in the learner's phrase arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhraseId(usize);

impl PhraseId {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for PhraseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How many tokens of context to keep before and after the entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextWindow {
    pub prefix: usize,
    pub suffix: usize,
}

impl Default for ContextWindow {
    fn default() -> Self {
        Self {
            prefix: 1,
            suffix: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phrase {
    entities: Vec<Entity>,
    order: Order,
    elements: Vec<Element>,
    full_sentence: String,
    #[serde(default)]
    cluster_assignments: BTreeSet<ClusterLabel>,
}

impl Phrase {
    /// Build a phrase from a sentence and its tagged spans.
    ///
    /// Spans that do not fall on char boundaries, or whose text is blank,
    /// are dropped. Returns `None` when nothing is left or when two spans
    /// overlap.
    pub fn from_spans(sentence: &str, spans: &TaggedSpans, window: ContextWindow) -> Option<Self> {
        let mut entities = Vec::with_capacity(spans.len());
        for kind in EntityKind::ALL {
            for span in spans.of(kind) {
                let Some(text) = sentence.get(span.start..span.end) else {
                    tracing::debug!(start = span.start, end = span.end, "dropping span off char boundary");
                    continue;
                };
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                entities.push(Entity {
                    text: text.to_string(),
                    kind,
                    id: span.id,
                    start: span.start,
                    end: span.end,
                });
            }
        }
        if entities.is_empty() {
            return None;
        }
        entities.sort_by_key(|e| e.start);
        if entities.windows(2).any(|w| w[1].start < w[0].end) {
            return None;
        }

        let first = &entities[0];
        let last = &entities[entities.len() - 1];

        let prefix = tokenize(&sentence[..first.start]);
        let prefix = prefix[prefix.len().saturating_sub(window.prefix)..].to_vec();

        let mut elements = Vec::with_capacity(entities.len() + 1);
        elements.push(Element::new(prefix));
        for pair in entities.windows(2) {
            elements.push(Element::new(tokenize(&sentence[pair[0].end..pair[1].start])));
        }
        let suffix = tokenize(&sentence[last.end..]);
        elements.push(Element::new(
            suffix.into_iter().take(window.suffix).collect(),
        ));

        let order = Order::from_kinds(entities.iter().map(|e| e.kind));
        let full_sentence = normalize(&render(&elements, &entities, |e| e.text.clone()));

        Some(Self {
            entities,
            order,
            elements,
            full_sentence,
            cluster_assignments: BTreeSet::new(),
        })
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn order(&self) -> &Order {
        &self.order
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn prefix(&self) -> &Element {
        &self.elements[0]
    }

    pub fn suffix(&self) -> &Element {
        &self.elements[self.elements.len() - 1]
    }

    /// Middle slots, one per gap between adjacent entities.
    pub fn middles(&self) -> &[Element] {
        &self.elements[1..self.elements.len() - 1]
    }

    pub fn full_sentence(&self) -> &str {
        &self.full_sentence
    }

    pub fn cluster_assignments(&self) -> &BTreeSet<ClusterLabel> {
        &self.cluster_assignments
    }

    pub fn is_clustered(&self) -> bool {
        !self.cluster_assignments.is_empty()
    }

    pub(crate) fn assign(&mut self, label: ClusterLabel) {
        self.cluster_assignments.insert(label);
    }

    pub(crate) fn unassign(&mut self, label: ClusterLabel) {
        self.cluster_assignments.remove(&label);
    }

    /// Copy entity kinds and ids from a pattern with the same ordering.
    pub(crate) fn relabel(&mut self, pattern_entities: &[Entity]) {
        for (entity, template) in self.entities.iter_mut().zip(pattern_entities) {
            entity.kind = template.kind;
            entity.id = template.id;
        }
        self.order = Order::from_kinds(self.entities.iter().map(|e| e.kind));
    }

    /// Triples expressed by this phrase under the id pairing rule.
    pub fn retrieve_relations(&self) -> Vec<RelationKey> {
        let tagged: Vec<(EntityKind, u32, &str)> = self
            .entities
            .iter()
            .map(|e| (e.kind, e.id, e.text.as_str()))
            .collect();
        pair_triples(&tagged)
    }

    /// Tagged rendering, e.g. `of <CEM1> has <SPECIFIER1> of <VALUE1> <UNIT1> .`
    pub fn as_string(&self) -> String {
        render(&self.elements, &self.entities, Entity::tag)
    }
}

impl fmt::Display for Phrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}

/// Pair compounds with values of the same id, then attach a unit: the only
/// unit if there is exactly one, otherwise every unit sharing the value's id.
pub(crate) fn pair_triples(tagged: &[(EntityKind, u32, &str)]) -> Vec<RelationKey> {
    let of = |kind: EntityKind| tagged.iter().filter(move |t| t.0 == kind);
    let units: Vec<_> = of(EntityKind::Unit).collect();

    let mut triples = Vec::new();
    for (_, compound_id, compound) in of(EntityKind::Compound) {
        for (_, value_id, value) in of(EntityKind::Value).filter(|v| v.1 == *compound_id) {
            if units.len() == 1 {
                triples.push(RelationKey::new(compound, value, units[0].2));
            } else {
                for (_, _, unit) in units.iter().filter(|u| u.1 == *value_id) {
                    triples.push(RelationKey::new(compound, value, unit));
                }
            }
        }
    }
    triples
}

/// Render slots and entities as one space-separated string. Empty middles
/// are skipped so no double spaces appear between entities.
pub(crate) fn render(
    elements: &[Element],
    entities: &[Entity],
    entity_text: impl Fn(&Entity) -> String,
) -> String {
    let mut out = String::new();
    let mut push = |piece: &str| {
        if !piece.is_empty() {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(piece);
        }
    };

    if let Some(prefix) = elements.first() {
        push(&prefix.tokens.join(" "));
    }
    for (i, entity) in entities.iter().enumerate() {
        push(&entity_text(entity));
        if i + 1 < entities.len() {
            if let Some(middle) = elements.get(i + 1) {
                push(&middle.tokens.join(" "));
            }
        }
    }
    if elements.len() > 1 {
        if let Some(suffix) = elements.last() {
            push(&suffix.tokens.join(" "));
        }
    }
    out
}
