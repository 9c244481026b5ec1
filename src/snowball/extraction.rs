//! Candidate scoring and acceptance.

use crate::cluster::ClusterLabel;
use crate::config::AcceptanceStrategy;
use crate::error::RelexResult;
use crate::phrase::Phrase;
use crate::relation::{Relation, RelationRecord};

use super::Snowball;

/// A candidate with its noisy-OR confidence.
#[derive(Debug)]
struct Scored {
    phrase: Phrase,
    confidence: f64,
    /// Cluster whose pattern the candidate resembles most.
    winner: Option<ClusterLabel>,
    /// Clusters whose similarity cleared `t_sim`.
    matched: Vec<ClusterLabel>,
}

impl Snowball {
    /// Noisy-OR confidence of a candidate over every compatible pattern.
    fn score(&self, phrase: Phrase) -> Scored {
        let weights = self.config.weights();
        let mut miss = 1.0;
        let mut best_similarity = 0.0;
        let mut winner = None;
        let mut matched = Vec::new();

        for cluster in &self.clusters {
            let Some(similarity) = cluster.similarity(&phrase, &weights) else {
                continue;
            };
            let pattern_confidence = cluster.pattern().map_or(0.0, |p| p.confidence());
            if similarity >= self.config.t_sim {
                miss *= 1.0 - similarity * pattern_confidence;
                matched.push(cluster.label());
            }
            if similarity > best_similarity {
                best_similarity = similarity;
                winner = Some(cluster.label());
            }
        }

        Scored {
            phrase,
            confidence: (1.0 - miss).clamp(0.0, 1.0),
            winner,
            matched,
        }
    }

    /// Score candidates, accept per the configured strategy and fold the
    /// accepted ones back into relations and clusters.
    pub(crate) fn accept_candidates(
        &mut self,
        candidates: Vec<Phrase>,
    ) -> RelexResult<Vec<RelationRecord>> {
        let considered = candidates.len();
        let mut eligible: Vec<Scored> = candidates
            .into_iter()
            .map(|phrase| self.score(phrase))
            .filter(|s| s.winner.is_some() && s.confidence > 0.0 && s.confidence >= self.config.t_c)
            .collect();

        let accepted: Vec<Scored> = match self.config.acceptance {
            AcceptanceStrategy::Best => {
                let mut best: Option<usize> = None;
                for (i, scored) in eligible.iter().enumerate() {
                    if best.is_none_or(|b| scored.confidence > eligible[b].confidence) {
                        best = Some(i);
                    }
                }
                best.map(|i| eligible.swap_remove(i)).into_iter().collect()
            }
            AcceptanceStrategy::TopK { k } => {
                eligible.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
                eligible.truncate(k);
                eligible
            }
        };

        let mut records = Vec::new();
        for scored in accepted {
            records.extend(self.accept(scored)?);
        }
        tracing::info!(
            property = %self.config.property,
            candidates = considered,
            accepted = records.len(),
            "extraction complete"
        );
        Ok(records)
    }

    fn accept(&mut self, scored: Scored) -> RelexResult<Vec<RelationRecord>> {
        let Scored {
            mut phrase,
            confidence,
            winner,
            matched,
        } = scored;

        if let Some(pattern) = winner
            .and_then(|label| self.cluster(label))
            .and_then(|cluster| cluster.pattern())
        {
            let template = pattern.entities().to_vec();
            phrase.relabel(&template);
        }

        let triples = phrase.retrieve_relations();
        let sentence = phrase.full_sentence().to_string();
        let id = self.push_phrase(phrase);

        let mut records = Vec::new();
        for key in triples.into_iter().filter(|k| k.is_complete()) {
            if let Some(relation) = self.relations.get_mut(&key) {
                relation.mark_found();
                relation.add_phrase(id);
                tracing::info!(relation = %key, confidence = relation.confidence(), "merged with known relation");
                records.push(RelationRecord::from_relation(&self.config.property, relation));
            } else {
                let mut relation = Relation::new(key.clone(), confidence)?;
                relation.mark_found();
                relation.add_phrase(id);
                tracing::info!(relation = %key, confidence, "accepted new relation");
                records.push(RelationRecord::from_relation(&self.config.property, &relation));
                self.relations.insert(key, relation);
            }
            self.matched_sentences.insert(sentence.clone());
        }

        for label in matched {
            let Some(index) = self.cluster_index(label) else {
                continue;
            };
            self.clusters[index].add(id, &self.phrases[id.index()])?;
            self.phrases[id.index()].assign(label);
            self.refresh_pattern(index)?;
        }
        Ok(records)
    }
}
