//! Weighted per-slot similarity between a phrase and a pattern.
//!
//! Both sides are vectorised against the same cluster dictionaries, so each
//! slot pair has matching dimensionality. Slot 0 is the prefix, the last
//! slot is the suffix, everything between is a middle.

use serde::{Deserialize, Serialize};

/// How the middle weight is spread across multiple middle slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MiddleWeighting {
    /// Each middle gets `middle_weight / m`.
    #[default]
    Shared,
    /// Each middle gets the full `middle_weight`.
    Summed,
}

/// Slot weights used by [`weighted_similarity`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityWeights {
    pub prefix: f64,
    pub middle: f64,
    pub suffix: f64,
    pub middle_weighting: MiddleWeighting,
}

impl Default for SimilarityWeights {
    fn default() -> Self {
        Self {
            prefix: 0.1,
            middle: 0.8,
            suffix: 0.1,
            middle_weighting: MiddleWeighting::Shared,
        }
    }
}

/// A token slot vectorised against one cluster dictionary.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotVector {
    pub values: Vec<f64>,
    /// The slot had no tokens at all (distinct from "no known tokens").
    pub empty: bool,
}

impl SlotVector {
    pub fn norm(&self) -> f64 {
        self.values.iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    pub fn is_zero(&self) -> bool {
        self.values.iter().all(|v| *v == 0.0)
    }

    /// Euclidean distance; missing trailing dimensions count as 0.
    pub fn euclidean(&self, other: &SlotVector) -> f64 {
        let len = self.values.len().max(other.values.len());
        (0..len)
            .map(|i| {
                let a = self.values.get(i).copied().unwrap_or(0.0);
                let b = other.values.get(i).copied().unwrap_or(0.0);
                (a - b) * (a - b)
            })
            .sum::<f64>()
            .sqrt()
    }
}

/// Similarity of one slot pair.
///
/// Two empty slots are identical context and score 1. Otherwise the dot
/// product of the unit vectors, clamped to `[0, 1]`.
pub fn slot_similarity(a: &SlotVector, b: &SlotVector) -> f64 {
    if a.empty && b.empty {
        return 1.0;
    }
    let dot: f64 = a.values.iter().zip(&b.values).map(|(x, y)| x * y).sum();
    dot.clamp(0.0, 1.0)
}

/// Weighted similarity of two slot lists (prefix, middles, suffix).
///
/// Lists of different length cannot describe the same entity ordering and
/// score 0.
pub fn weighted_similarity(a: &[SlotVector], b: &[SlotVector], weights: &SimilarityWeights) -> f64 {
    if a.len() != b.len() || a.len() < 2 {
        return 0.0;
    }
    let last = a.len() - 1;
    let middles = last - 1;

    let mut score = weights.prefix * slot_similarity(&a[0], &b[0])
        + weights.suffix * slot_similarity(&a[last], &b[last]);

    if middles > 0 {
        let per_middle = match weights.middle_weighting {
            MiddleWeighting::Shared => weights.middle / middles as f64,
            MiddleWeighting::Summed => weights.middle,
        };
        for slot in 1..last {
            score += per_middle * slot_similarity(&a[slot], &b[slot]);
        }
    }
    score
}
