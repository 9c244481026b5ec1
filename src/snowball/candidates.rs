//! Candidate phrase generation for extraction.

use crate::corpus::{EntityTagger, Sentence, TaggedSpan, TaggedSpans};
use crate::phrase::{EntityKind, Phrase};
use crate::text::normalize;

use super::Snowball;

/// Smallest combination that can hold one entity of each kind.
const MIN_COMBINATION: usize = 4;

/// All `k`-element index combinations of `0..n`, in lexicographic order.
#[derive(Debug, Clone)]
pub struct Combinations {
    n: usize,
    indices: Vec<usize>,
    started: bool,
    done: bool,
}

impl Combinations {
    pub fn new(n: usize, k: usize) -> Self {
        Self {
            n,
            indices: (0..k).collect(),
            started: false,
            done: k > n,
        }
    }
}

impl Iterator for Combinations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if !self.started {
            self.started = true;
            return Some(self.indices.clone());
        }
        let k = self.indices.len();
        let Some(i) = (0..k).rev().find(|&i| self.indices[i] != i + self.n - k) else {
            self.done = true;
            return None;
        };
        self.indices[i] += 1;
        for j in i + 1..k {
            self.indices[j] = self.indices[j - 1] + 1;
        }
        Some(self.indices.clone())
    }
}

/// Tagged spans flattened into one start-sorted list.
fn flatten(spans: &TaggedSpans) -> Vec<(EntityKind, TaggedSpan)> {
    let mut flat: Vec<(EntityKind, TaggedSpan)> = Vec::with_capacity(spans.len());
    for kind in [
        EntityKind::Compound,
        EntityKind::Specifier,
        EntityKind::Value,
        EntityKind::Unit,
    ] {
        for span in spans.of(kind) {
            if !flat.iter().any(|(k, s)| *k == kind && s.coincides(span)) {
                flat.push((kind, span.with_id(0)));
            }
        }
    }
    flat.sort_by_key(|(_, span)| span.start);

    // A unit before every value cannot belong to any of them.
    let first_value = flat.iter().position(|(kind, _)| *kind == EntityKind::Value);
    let mut index = 0;
    flat.retain(|(kind, _)| {
        let keep = *kind != EntityKind::Unit || first_value.is_some_and(|v| index > v);
        index += 1;
        keep
    });
    flat
}

impl Snowball {
    /// Every candidate phrase in `sentences`, across all sentences.
    pub(crate) fn generate_candidates(
        &self,
        sentences: &[Sentence],
        tagger: &dyn EntityTagger,
    ) -> Vec<Phrase> {
        let mut candidates = Vec::new();
        for sentence in sentences {
            candidates.extend(self.sentence_candidates(&sentence.text, tagger));
        }
        tracing::debug!(
            sentences = sentences.len(),
            candidates = candidates.len(),
            "generated candidate phrases"
        );
        candidates
    }

    fn sentence_candidates(&self, sentence: &str, tagger: &dyn EntityTagger) -> Vec<Phrase> {
        let text = normalize(sentence);
        let length = text.chars().count();
        if length > self.config.max_sentence_length {
            tracing::warn!(
                length,
                limit = self.config.max_sentence_length,
                "skipping over-long sentence"
            );
            return Vec::new();
        }

        let spans = tagger.tag(&text);
        if spans.compounds.is_empty() {
            return Vec::new();
        }
        let flat = flatten(&spans);
        if flat.len() > self.config.max_candidate_entities {
            tracing::warn!(
                entities = flat.len(),
                limit = self.config.max_candidate_entities,
                "skipping sentence with too many tagged entities"
            );
            return Vec::new();
        }

        let window = self.config.window();
        let mut candidates = Vec::new();
        for size in MIN_COMBINATION..=flat.len() {
            for combination in Combinations::new(flat.len(), size) {
                let mut chosen = TaggedSpans::default();
                for &i in &combination {
                    let (kind, span) = flat[i];
                    chosen.push(kind, span);
                }
                if !chosen.is_complete() {
                    continue;
                }
                if let Some(phrase) = Phrase::from_spans(&text, &chosen, window) {
                    candidates.push(phrase);
                }
            }
        }
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combinations_are_lexicographic() {
        let all: Vec<Vec<usize>> = Combinations::new(4, 2).collect();
        assert_eq!(
            all,
            vec![
                vec![0, 1],
                vec![0, 2],
                vec![0, 3],
                vec![1, 2],
                vec![1, 3],
                vec![2, 3],
            ]
        );
    }

    #[test]
    fn combinations_edge_sizes() {
        assert_eq!(Combinations::new(3, 3).count(), 1);
        assert_eq!(Combinations::new(2, 3).count(), 0);
        assert_eq!(Combinations::new(5, 4).count(), 5);
    }

    #[test]
    fn flatten_drops_leading_units_and_duplicates() {
        let spans = TaggedSpans {
            compounds: vec![TaggedSpan::new(5, 9, 3), TaggedSpan::new(5, 9, 4)],
            values: vec![TaggedSpan::new(20, 23, 0)],
            specifiers: vec![TaggedSpan::new(10, 19, 0)],
            units: vec![TaggedSpan::new(0, 1, 0), TaggedSpan::new(24, 25, 0)],
        };
        let flat = flatten(&spans);
        let kinds: Vec<EntityKind> = flat.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            kinds,
            vec![
                EntityKind::Compound,
                EntityKind::Specifier,
                EntityKind::Value,
                EntityKind::Unit
            ]
        );
        assert!(flat.iter().all(|(_, s)| s.id == 0));
    }

    #[test]
    fn flatten_without_values_drops_all_units() {
        let spans = TaggedSpans {
            compounds: vec![TaggedSpan::new(0, 4, 0)],
            units: vec![TaggedSpan::new(10, 11, 0)],
            ..TaggedSpans::default()
        };
        assert_eq!(flatten(&spans).len(), 1);
    }
}
