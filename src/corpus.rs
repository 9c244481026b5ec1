//! Corpus input types and the entity-tagging seam.
//!
//! Documents arrive already segmented into paragraphs and sentences. Entity
//! spans (compound, value, specifier, unit) come from an [`EntityTagger`];
//! [`RegexTagger`] is the built-in implementation driven by the configured
//! regular expressions.

use serde::{Deserialize, Serialize};

use crate::config::EntityRegexes;
use crate::phrase::EntityKind;
use crate::text::is_delimited_unit;

/// A tagged span of a sentence: byte offsets plus a caller-assigned id.
///
/// Spans sharing an id within one phrase belong to the same relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaggedSpan {
    pub start: usize,
    pub end: usize,
    pub id: u32,
}

impl TaggedSpan {
    pub fn new(start: usize, end: usize, id: u32) -> Self {
        Self { start, end, id }
    }

    /// Same span with a different id.
    pub fn with_id(self, id: u32) -> Self {
        Self { id, ..self }
    }

    /// Two spans coincide when they cover exactly the same offsets.
    pub fn coincides(&self, other: &TaggedSpan) -> bool {
        self.start == other.start && self.end == other.end
    }

    /// Number of bytes between the nearest edges of two spans (0 if they overlap).
    pub fn gap(&self, other: &TaggedSpan) -> usize {
        if self.end <= other.start {
            other.start - self.end
        } else if other.end <= self.start {
            self.start - other.end
        } else {
            0
        }
    }
}

/// The four span lists produced by a tagger for one sentence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedSpans {
    #[serde(default)]
    pub compounds: Vec<TaggedSpan>,
    #[serde(default)]
    pub values: Vec<TaggedSpan>,
    #[serde(default)]
    pub specifiers: Vec<TaggedSpan>,
    #[serde(default)]
    pub units: Vec<TaggedSpan>,
}

impl TaggedSpans {
    /// Spans of one kind.
    pub fn of(&self, kind: EntityKind) -> &[TaggedSpan] {
        match kind {
            EntityKind::Compound => &self.compounds,
            EntityKind::Value => &self.values,
            EntityKind::Specifier => &self.specifiers,
            EntityKind::Unit => &self.units,
        }
    }

    /// Append a span of the given kind.
    pub fn push(&mut self, kind: EntityKind, span: TaggedSpan) {
        match kind {
            EntityKind::Compound => self.compounds.push(span),
            EntityKind::Value => self.values.push(span),
            EntityKind::Specifier => self.specifiers.push(span),
            EntityKind::Unit => self.units.push(span),
        }
    }

    /// Total number of spans across all kinds.
    pub fn len(&self) -> usize {
        self.compounds.len() + self.values.len() + self.specifiers.len() + self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when every kind has at least one span.
    pub fn is_complete(&self) -> bool {
        EntityKind::ALL.iter().all(|kind| !self.of(*kind).is_empty())
    }
}

/// Source of entity spans for a normalized sentence.
///
/// Offsets in the returned spans index into the exact `sentence` passed in.
pub trait EntityTagger {
    fn tag(&self, sentence: &str) -> TaggedSpans;
}

/// Tags entities with the configured regular expressions.
///
/// All spans carry id 0; ids are assigned later from the winning pattern.
#[derive(Debug, Clone)]
pub struct RegexTagger {
    regexes: EntityRegexes,
}

impl RegexTagger {
    pub fn new(regexes: EntityRegexes) -> Self {
        Self { regexes }
    }
}

impl EntityTagger for RegexTagger {
    fn tag(&self, sentence: &str) -> TaggedSpans {
        let find = |re: &regex::Regex| -> Vec<TaggedSpan> {
            re.find_iter(sentence)
                .map(|m| TaggedSpan::new(m.start(), m.end(), 0))
                .collect()
        };
        TaggedSpans {
            compounds: find(&self.regexes.compound),
            values: find(&self.regexes.value),
            specifiers: find(&self.regexes.specifier),
            units: find(&self.regexes.unit)
                .into_iter()
                .filter(|span| is_delimited_unit(sentence, span.end))
                .collect(),
        }
    }
}

/// A sentence of a document, with its offsets in the document text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentence {
    pub text: String,
    #[serde(default)]
    pub start: usize,
    #[serde(default)]
    pub end: usize,
}

impl Sentence {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let end = text.len();
        Self {
            text,
            start: 0,
            end,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paragraph {
    pub sentences: Vec<Sentence>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub paragraphs: Vec<Paragraph>,
}

impl Document {
    /// Read a pre-segmented plain-text document: one sentence per line, blank
    /// lines separate paragraphs.
    pub fn from_plain_text(text: &str) -> Self {
        let mut paragraphs = Vec::new();
        let mut current = Paragraph::default();
        let mut offset = 0usize;

        for line in text.split_inclusive('\n') {
            let content = line.trim_end_matches(['\n', '\r']);
            let leading = content.len() - content.trim_start().len();
            let trimmed = content.trim();
            if trimmed.is_empty() {
                if !current.sentences.is_empty() {
                    paragraphs.push(std::mem::take(&mut current));
                }
            } else {
                let start = offset + leading;
                current.sentences.push(Sentence {
                    text: trimmed.to_string(),
                    start,
                    end: start + trimmed.len(),
                });
            }
            offset += line.len();
        }
        if !current.sentences.is_empty() {
            paragraphs.push(current);
        }

        Self { paragraphs }
    }

    /// All sentences in reading order.
    pub fn sentences(&self) -> impl Iterator<Item = &Sentence> {
        self.paragraphs.iter().flat_map(|p| p.sentences.iter())
    }
}
