//! Training phrase generation: find known relations in a sentence and turn
//! each group of co-occurring relations into one phrase.

use crate::corpus::{TaggedSpan, TaggedSpans};
use crate::error::RelexResult;
use crate::phrase::{EntityKind, Phrase};
use crate::text::{is_delimited_unit, normalize};

use super::Snowball;

/// The spans chosen for one relation in one sentence.
#[derive(Debug, Clone, Copy)]
struct Chosen {
    compound: TaggedSpan,
    value: TaggedSpan,
    specifier: TaggedSpan,
    unit: TaggedSpan,
}

/// Per-sentence id counters, one per entity kind.
#[derive(Debug, Clone, Copy)]
struct IdCounters {
    compound: u32,
    value: u32,
    specifier: u32,
    unit: u32,
}

impl Default for IdCounters {
    fn default() -> Self {
        Self {
            compound: 1,
            value: 1,
            specifier: 1,
            unit: 1,
        }
    }
}

/// Relations whose spans overlap in one sentence, rendered as one phrase.
#[derive(Debug, Default)]
struct MatchGroup {
    relations: Vec<usize>,
    spans: TaggedSpans,
}

impl MatchGroup {
    fn new(relation: usize, chosen: Chosen, ids: IdCounters) -> Self {
        let mut group = Self::default();
        group.relations.push(relation);
        group.push(EntityKind::Compound, chosen.compound, ids.compound);
        group.push(EntityKind::Value, chosen.value, ids.value);
        group.push(EntityKind::Specifier, chosen.specifier, ids.specifier);
        group.push(EntityKind::Unit, chosen.unit, ids.unit);
        group
    }

    fn push(&mut self, kind: EntityKind, span: TaggedSpan, id: u32) {
        self.spans.push(kind, span.with_id(id));
    }

    fn shares(&self, kind: EntityKind, span: &TaggedSpan) -> bool {
        self.spans.of(kind).iter().any(|s| s.coincides(span))
    }

    fn add_relation(&mut self, relation: usize) {
        if !self.relations.contains(&relation) {
            self.relations.push(relation);
        }
    }

    /// Fold a relation into this group according to which of its spans the
    /// group already holds. Spans not yet present are added with ids that
    /// tie them to the shared ones.
    fn extend(
        &mut self,
        relation: usize,
        chosen: Chosen,
        shared: (bool, bool, bool, bool),
        ids: &mut IdCounters,
    ) {
        use EntityKind::{Compound, Specifier, Unit, Value};

        let pushes: &[EntityKind] = match shared {
            (true, false, false, false) => &[Value, Specifier, Unit],
            (true, false, false, true) => &[Value, Specifier],
            (true, true, false, false) => &[Specifier, Unit],
            (true, true, false, true) => &[Specifier],
            (true, false, true, false) => &[Value, Unit],
            (true, false, true, true) => &[Value],
            (false, true, false, false) => &[Compound, Specifier, Unit],
            (false, true, false, true) => &[Compound, Specifier],
            (false, true, true, false) => &[Compound, Unit],
            (false, true, true, true) => &[Compound],
            (false, false, true, false) => {
                ids.compound += 1;
                ids.value += 1;
                ids.unit += 1;
                &[Compound, Value, Unit]
            }
            (false, false, true, true) => {
                ids.compound += 1;
                ids.value += 1;
                &[Compound, Value]
            }
            (false, false, false, true) => {
                ids.compound += 1;
                ids.value += 1;
                ids.specifier += 1;
                &[Compound, Value, Specifier]
            }
            _ => &[],
        };

        for kind in pushes {
            let (span, id) = match kind {
                Compound => (chosen.compound, ids.compound),
                Value => (chosen.value, ids.value),
                Specifier => (chosen.specifier, ids.specifier),
                Unit => (chosen.unit, ids.unit),
            };
            self.push(*kind, span, id);
        }
        self.add_relation(relation);
    }
}

/// Span in `candidates` nearest to `anchor`; ties go to the first.
fn nearest(candidates: &[TaggedSpan], anchor: &TaggedSpan) -> Option<TaggedSpan> {
    let mut best: Option<(usize, TaggedSpan)> = None;
    for span in candidates {
        let gap = span.gap(anchor);
        if best.is_none_or(|(d, _)| gap < d) {
            best = Some((gap, *span));
        }
    }
    best.map(|(_, span)| span)
}

/// Closest compound/value pair, then the specifier and unit nearest that value.
fn choose(
    compounds: &[TaggedSpan],
    values: &[TaggedSpan],
    specifiers: &[TaggedSpan],
    units: &[TaggedSpan],
) -> Option<Chosen> {
    let mut pair: Option<(usize, TaggedSpan, TaggedSpan)> = None;
    for compound in compounds {
        for value in values {
            let gap = compound.gap(value);
            if pair.is_none_or(|(d, _, _)| gap < d) {
                pair = Some((gap, *compound, *value));
            }
        }
    }
    let (_, compound, value) = pair?;
    Some(Chosen {
        compound,
        value,
        specifier: nearest(specifiers, &value)?,
        unit: nearest(units, &value)?,
    })
}

fn merge(groups: &mut Vec<MatchGroup>, ids: &mut IdCounters, relation: usize, chosen: Chosen) {
    if groups.is_empty() {
        groups.push(MatchGroup::new(relation, chosen, *ids));
        return;
    }
    let mut coincided = false;
    for group in groups.iter_mut() {
        let shared = (
            group.shares(EntityKind::Compound, &chosen.compound),
            group.shares(EntityKind::Value, &chosen.value),
            group.shares(EntityKind::Specifier, &chosen.specifier),
            group.shares(EntityKind::Unit, &chosen.unit),
        );
        if shared == (false, false, false, false) {
            continue;
        }
        coincided = true;
        group.extend(relation, chosen, shared, ids);
    }
    if !coincided {
        groups.push(MatchGroup::new(relation, chosen, IdCounters::default()));
    }
}

impl Snowball {
    /// Look for every known relation in one sentence and record a phrase per
    /// match group. Returns the number of phrases created.
    pub(crate) fn generate_phrases(&mut self, sentence: &str) -> RelexResult<usize> {
        let text = normalize(sentence);

        let specifiers: Vec<TaggedSpan> = self
            .regexes
            .specifier
            .find_iter(&text)
            .map(|m| TaggedSpan::new(m.start(), m.end(), 0))
            .collect();
        if specifiers.is_empty() {
            return Ok(0);
        }
        let units: Vec<TaggedSpan> = self
            .regexes
            .unit
            .find_iter(&text)
            .filter(|m| is_delimited_unit(&text, m.end()))
            .map(|m| TaggedSpan::new(m.start(), m.end(), 0))
            .collect();
        if units.is_empty() {
            return Ok(0);
        }

        let mut groups: Vec<MatchGroup> = Vec::new();
        let mut ids = IdCounters::default();
        for (index, relation) in self.relations.values_mut().enumerate() {
            let compounds = relation.locate_compound(&text);
            if compounds.is_empty() {
                continue;
            }
            let values = relation.locate_value(&text);
            let Some(chosen) = choose(&compounds, &values, &specifiers, &units) else {
                continue;
            };
            relation.mark_found();
            merge(&mut groups, &mut ids, index, chosen);
        }

        let window = self.config.window();
        let mut created = 0;
        for group in groups {
            let Some(phrase) = Phrase::from_spans(&text, &group.spans, window) else {
                tracing::debug!(sentence = %text, "match group produced no phrase");
                continue;
            };
            self.matched_sentences
                .insert(phrase.full_sentence().to_string());
            let id = self.push_phrase(phrase);
            for index in group.relations {
                if let Some((_, relation)) = self.relations.get_index_mut(index) {
                    relation.add_phrase(id);
                }
            }
            created += 1;
        }
        if created > 0 {
            tracing::debug!(phrases = created, "sentence matched known relations");
        }
        Ok(created)
    }
}
