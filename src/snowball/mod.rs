//! The bootstrapping learner.
//!
//! A [`Snowball`] owns every relation, phrase and cluster for one property.
//! Training turns seed relations into phrases and clusters them in a single
//! pass; extraction scores candidate phrases from new text against the
//! cluster patterns and folds accepted candidates back in.
//!
//! Results depend on input order: the same corpus fed in a different
//! sequence can produce different clusters.

mod candidates;
mod extraction;
mod training;

use indexmap::{IndexMap, IndexSet};

use crate::cluster::{Cluster, ClusterLabel};
use crate::config::{EntityRegexes, SnowballConfig};
use crate::corpus::{Document, EntityTagger, RegexTagger, Sentence};
use crate::error::{ClusterError, RelexResult};
use crate::pattern::Evidence;
use crate::phrase::{Phrase, PhraseId};
use crate::relation::{Relation, RelationKey, RelationRecord};

pub use candidates::Combinations;

/// Counts reported by one [`Snowball::train`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrainingSummary {
    /// Sentences read.
    pub sentences: usize,
    /// Sentences that produced at least one phrase.
    pub matched_sentences: usize,
    /// Phrases created.
    pub phrases: usize,
    /// Clusters created.
    pub clusters_created: usize,
    /// Clusters in the learner afterwards.
    pub clusters: usize,
}

/// Relation learner for one property.
pub struct Snowball {
    pub(crate) config: SnowballConfig,
    pub(crate) regexes: EntityRegexes,
    tagger: RegexTagger,
    pub(crate) seeds: Vec<RelationKey>,
    pub(crate) relations: IndexMap<RelationKey, Relation>,
    pub(crate) phrases: Vec<Phrase>,
    pub(crate) clusters: Vec<Cluster>,
    pub(crate) matched_sentences: IndexSet<String>,
    pub(crate) next_label: ClusterLabel,
}

impl Snowball {
    /// Create a learner and seed it with `config.seeds`.
    pub fn new(config: SnowballConfig) -> RelexResult<Self> {
        let seeds = config.seeds.clone();
        let mut snowball = Self::with_config(config)?;
        snowball.add_seeds(&seeds)?;
        Ok(snowball)
    }

    /// Validate the config and compile its regexes, without seeding.
    pub(crate) fn with_config(config: SnowballConfig) -> RelexResult<Self> {
        config.validate()?;
        let regexes = config.compile_regexes()?;
        tracing::info!(
            property = %config.property,
            t_sim = config.t_sim,
            t_c = config.t_c,
            "initializing snowball learner"
        );
        Ok(Self {
            tagger: RegexTagger::new(regexes.clone()),
            regexes,
            config,
            seeds: Vec::new(),
            relations: IndexMap::new(),
            phrases: Vec::new(),
            clusters: Vec::new(),
            matched_sentences: IndexSet::new(),
            next_label: ClusterLabel::new(0),
        })
    }

    /// Add seed relations with confidence 1.0.
    ///
    /// The whole batch is validated before anything is added. Seeds already
    /// known are skipped. Returns the number of new relations.
    pub fn add_seeds(&mut self, seeds: &[Vec<String>]) -> RelexResult<usize> {
        let keys = seeds
            .iter()
            .enumerate()
            .map(|(index, fields)| RelationKey::from_seed(index, fields))
            .collect::<Result<Vec<_>, _>>()?;

        let mut added = 0;
        for key in keys {
            if self.relations.contains_key(&key) {
                continue;
            }
            let relation = Relation::new(key.clone(), 1.0)?;
            self.seeds.push(key.clone());
            self.relations.insert(key, relation);
            added += 1;
        }
        tracing::info!(
            property = %self.config.property,
            added,
            relations = self.relations.len(),
            "seeded relations"
        );
        Ok(added)
    }

    /// Scan a corpus for known relations, then cluster the new phrases.
    pub fn train(&mut self, documents: &[Document]) -> RelexResult<TrainingSummary> {
        let phrases_before = self.phrases.len();
        let clusters_before = self.clusters.len();

        let mut summary = TrainingSummary::default();
        for sentence in documents.iter().flat_map(Document::sentences) {
            summary.sentences += 1;
            if self.generate_phrases(&sentence.text)? > 0 {
                summary.matched_sentences += 1;
            }
        }
        self.cluster_phrases()?;

        summary.phrases = self.phrases.len() - phrases_before;
        summary.clusters_created = self.clusters.len() - clusters_before;
        summary.clusters = self.clusters.len();
        tracing::info!(
            property = %self.config.property,
            sentences = summary.sentences,
            matched = summary.matched_sentences,
            phrases = summary.phrases,
            clusters = summary.clusters,
            "training pass complete"
        );
        Ok(summary)
    }

    /// Single-pass clustering of every phrase not yet in a cluster.
    ///
    /// Relations are visited in insertion order, then each relation's
    /// phrases in order. Returns the number of clusters created.
    pub fn cluster_phrases(&mut self) -> RelexResult<usize> {
        let before = self.clusters.len();
        let pending: IndexSet<PhraseId> = self
            .relations
            .values()
            .flat_map(|relation| relation.phrases().iter().copied())
            .filter(|id| !self.phrases[id.index()].is_clustered())
            .collect();
        for id in pending {
            self.classify(id)?;
        }
        Ok(self.clusters.len() - before)
    }

    /// Extract relations from sentences with the built-in regex tagger.
    pub fn extract(&mut self, sentences: &[Sentence]) -> RelexResult<Vec<RelationRecord>> {
        let candidates = self.generate_candidates(sentences, &self.tagger);
        self.accept_candidates(candidates)
    }

    /// Extract relations from sentences with a caller-supplied tagger.
    pub fn extract_with(
        &mut self,
        sentences: &[Sentence],
        tagger: &dyn EntityTagger,
    ) -> RelexResult<Vec<RelationRecord>> {
        let candidates = self.generate_candidates(sentences, tagger);
        self.accept_candidates(candidates)
    }

    /// Extract from every sentence of a document.
    pub fn extract_document(&mut self, document: &Document) -> RelexResult<Vec<RelationRecord>> {
        let sentences: Vec<Sentence> = document.sentences().cloned().collect();
        self.extract(&sentences)
    }

    /// Remove a cluster. Its phrases stay in the learner, unassigned from it.
    pub fn delete_cluster(&mut self, label: ClusterLabel) -> RelexResult<Cluster> {
        let index = self
            .cluster_index(label)
            .ok_or(ClusterError::NotFound { label: label.get() })?;
        let cluster = self.clusters.remove(index);
        for id in cluster.phrase_ids() {
            if let Some(phrase) = self.phrases.get_mut(id.index()) {
                phrase.unassign(label);
            }
        }
        tracing::info!(cluster = label.get(), phrases = cluster.len(), "deleted cluster");
        Ok(cluster)
    }

    pub fn config(&self) -> &SnowballConfig {
        &self.config
    }

    pub fn property(&self) -> &str {
        &self.config.property
    }

    pub fn regexes(&self) -> &EntityRegexes {
        &self.regexes
    }

    pub fn seeds(&self) -> &[RelationKey] {
        &self.seeds
    }

    /// Relations in insertion order.
    pub fn relations(&self) -> impl Iterator<Item = &Relation> {
        self.relations.values()
    }

    pub fn relation(&self, key: &RelationKey) -> Option<&Relation> {
        self.relations.get(key)
    }

    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }

    pub fn phrases(&self) -> &[Phrase] {
        &self.phrases
    }

    pub fn phrase(&self, id: PhraseId) -> Option<&Phrase> {
        self.phrases.get(id.index())
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn cluster(&self, label: ClusterLabel) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.label() == label)
    }

    /// Canonical sentences that produced phrases, in first-seen order.
    pub fn matched_sentences(&self) -> impl Iterator<Item = &str> {
        self.matched_sentences.iter().map(String::as_str)
    }

    fn cluster_index(&self, label: ClusterLabel) -> Option<usize> {
        self.clusters.iter().position(|c| c.label() == label)
    }

    pub(crate) fn push_phrase(&mut self, phrase: Phrase) -> PhraseId {
        let id = PhraseId::new(self.phrases.len());
        self.phrases.push(phrase);
        id
    }

    /// Put a phrase into every compatible cluster it is similar enough to,
    /// or into a new cluster when none accepts it.
    fn classify(&mut self, id: PhraseId) -> RelexResult<()> {
        let weights = self.config.weights();
        let mut joined = false;
        for index in 0..self.clusters.len() {
            let similarity = {
                let cluster = &self.clusters[index];
                if cluster.contains(id) {
                    continue;
                }
                match cluster.similarity(&self.phrases[id.index()], &weights) {
                    Some(similarity) => similarity,
                    None => continue,
                }
            };
            let cluster = &mut self.clusters[index];
            if similarity < cluster.minimum_match_score() {
                continue;
            }
            let label = cluster.label();
            cluster.add(id, &self.phrases[id.index()])?;
            self.phrases[id.index()].assign(label);
            self.refresh_pattern(index)?;
            joined = true;
            tracing::debug!(phrase = id.index(), cluster = label.get(), similarity, "phrase joined cluster");
        }
        if !joined {
            self.create_cluster(id)?;
        }
        Ok(())
    }

    fn create_cluster(&mut self, id: PhraseId) -> RelexResult<ClusterLabel> {
        let label = self.next_label;
        self.next_label = label.next();

        let phrase = &self.phrases[id.index()];
        let mut cluster = Cluster::new(label, phrase.order().clone(), self.config.t_sim);
        cluster.add(id, phrase)?;
        self.phrases[id.index()].assign(label);
        self.clusters.push(cluster);
        self.refresh_pattern(self.clusters.len() - 1)?;
        tracing::debug!(phrase = id.index(), cluster = label.get(), "created cluster");
        Ok(label)
    }

    /// Recompute the pattern of the cluster at `index` from its members.
    pub(crate) fn refresh_pattern(&mut self, index: usize) -> RelexResult<()> {
        let Self {
            config,
            regexes,
            relations,
            phrases,
            clusters,
            matched_sentences,
            ..
        } = self;
        let cluster = &mut clusters[index];
        let members: Vec<&Phrase> = cluster
            .phrase_ids()
            .iter()
            .map(|id| &phrases[id.index()])
            .collect();
        let known = |key: &RelationKey| relations.contains_key(key);
        let evidence = Evidence::new(&known, matched_sentences);
        cluster.update_pattern(&members, &evidence, regexes, config.learning_rate)?;
        Ok(())
    }
}

impl std::fmt::Debug for Snowball {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snowball")
            .field("property", &self.config.property)
            .field("relations", &self.relations.len())
            .field("phrases", &self.phrases.len())
            .field("clusters", &self.clusters.len())
            .finish()
    }
}
