//! Snapshot persistence and text reports.
//!
//! A snapshot is a versioned JSON document holding plain records only.
//! Compiled matchers and token dictionaries are not stored; on load the
//! dictionaries are rebuilt by replaying cluster membership and each
//! pattern is recompiled from its stored slots, keeping its confidence.
//!
//! Writes go to a sibling `.tmp` file which is synced and then renamed
//! over the target.

use std::fs::{File, create_dir_all, rename};
use std::io::Write as _;
use std::path::{Path, PathBuf};

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::cluster::{Cluster, ClusterLabel};
use crate::config::SnowballConfig;
use crate::error::{PersistError, RelexResult};
use crate::pattern::Pattern;
use crate::phrase::{Element, Entity, Order, Phrase, PhraseId};
use crate::relation::{Relation, RelationKey};
use crate::snowball::Snowball;

/// Snapshot format written by this build.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub format_version: u32,
    pub config: SnowballConfig,
    pub seeds: Vec<RelationKey>,
    pub relations: Vec<RelationState>,
    pub phrases: Vec<Phrase>,
    pub clusters: Vec<ClusterState>,
    pub matched_sentences: Vec<String>,
    pub next_label: ClusterLabel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationState {
    #[serde(flatten)]
    pub key: RelationKey,
    pub confidence: f64,
    pub found: bool,
    pub phrases: Vec<PhraseId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterState {
    pub label: ClusterLabel,
    pub order: Order,
    pub minimum_match_score: f64,
    pub phrases: Vec<PhraseId>,
    pub pattern: Option<PatternState>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternState {
    pub entities: Vec<Entity>,
    pub elements: Vec<Element>,
    pub confidence: f64,
    /// Matcher source, for inspection only; recompiled on load.
    pub matcher: String,
}

impl Snowball {
    /// Capture the learner state as plain records.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            format_version: SNAPSHOT_VERSION,
            config: self.config.clone(),
            seeds: self.seeds.clone(),
            relations: self
                .relations
                .values()
                .map(|r| RelationState {
                    key: r.key().clone(),
                    confidence: r.confidence(),
                    found: r.is_found(),
                    phrases: r.phrases().to_vec(),
                })
                .collect(),
            phrases: self.phrases.clone(),
            clusters: self
                .clusters
                .iter()
                .map(|c| ClusterState {
                    label: c.label(),
                    order: c.order().clone(),
                    minimum_match_score: c.minimum_match_score(),
                    phrases: c.phrase_ids().to_vec(),
                    pattern: c.pattern().map(|p| PatternState {
                        entities: p.entities().to_vec(),
                        elements: p.elements().to_vec(),
                        confidence: p.confidence(),
                        matcher: p.matcher_source().to_string(),
                    }),
                })
                .collect(),
            matched_sentences: self.matched_sentences.iter().cloned().collect(),
            next_label: self.next_label,
        }
    }

    /// Rebuild a learner from a snapshot.
    pub fn from_snapshot(snapshot: Snapshot) -> RelexResult<Self> {
        if snapshot.format_version != SNAPSHOT_VERSION {
            return Err(PersistError::UnsupportedVersion {
                found: snapshot.format_version,
                expected: SNAPSHOT_VERSION,
            }
            .into());
        }
        let phrase_count = snapshot.phrases.len();
        let check = |id: &PhraseId, owner: &str| -> Result<(), PersistError> {
            if id.index() < phrase_count {
                Ok(())
            } else {
                Err(PersistError::Corrupt {
                    message: format!("{owner} references phrase {id} of {phrase_count}"),
                })
            }
        };

        for (index, phrase) in snapshot.phrases.iter().enumerate() {
            check_phrase(index, phrase)?;
        }

        let mut snowball = Snowball::with_config(snapshot.config)?;
        snowball.seeds = snapshot.seeds;
        snowball.phrases = snapshot.phrases;
        snowball.matched_sentences = snapshot.matched_sentences.into_iter().collect::<IndexSet<_>>();

        let mut relations = IndexMap::with_capacity(snapshot.relations.len());
        for state in snapshot.relations {
            for id in &state.phrases {
                check(id, &format!("relation {}", state.key))?;
            }
            let relation =
                Relation::restore(state.key.clone(), state.confidence, state.found, state.phrases)?;
            relations.insert(state.key, relation);
        }
        snowball.relations = relations;

        let mut highest: Option<ClusterLabel> = None;
        for state in snapshot.clusters {
            let mut cluster = Cluster::new(state.label, state.order, state.minimum_match_score);
            for id in &state.phrases {
                check(id, &format!("cluster {}", state.label))?;
                cluster.add(*id, &snowball.phrases[id.index()])?;
            }
            if let Some(pattern) = state.pattern {
                cluster.restore_pattern(Pattern::restore(
                    state.label,
                    cluster.order().clone(),
                    pattern.entities,
                    pattern.elements,
                    pattern.confidence,
                    &snowball.regexes,
                )?);
            }
            highest = highest.max(Some(state.label));
            snowball.clusters.push(cluster);
        }

        snowball.next_label = match highest {
            Some(label) if label >= snapshot.next_label => label.next(),
            _ => snapshot.next_label,
        };
        Ok(snowball)
    }

    /// Write the snapshot to `path`, replacing any previous file.
    pub fn save(&self, path: &Path) -> RelexResult<()> {
        let json = serde_json::to_string_pretty(&self.snapshot()).map_err(|e| {
            PersistError::Serialization {
                message: e.to_string(),
            }
        })?;
        write_atomic(path, json.as_bytes())?;
        tracing::info!(
            path = %path.display(),
            relations = self.relations.len(),
            clusters = self.clusters.len(),
            "saved learner state"
        );
        Ok(())
    }

    /// Load a learner from a snapshot file.
    pub fn load(path: &Path) -> RelexResult<Self> {
        if !path.exists() {
            return Err(PersistError::Missing {
                path: path.display().to_string(),
            }
            .into());
        }
        let content = std::fs::read_to_string(path).map_err(|e| PersistError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let snapshot: Snapshot =
            serde_json::from_str(&content).map_err(|e| PersistError::Serialization {
                message: e.to_string(),
            })?;
        let snowball = Self::from_snapshot(snapshot)?;
        tracing::info!(
            path = %path.display(),
            property = %snowball.property(),
            clusters = snowball.clusters.len(),
            "loaded learner state"
        );
        Ok(snowball)
    }

    /// Write the four text reports into `dir` as `<stem>_clusters.txt`,
    /// `<stem>_patterns.txt`, `<stem>_relations.txt` and `<stem>_sentences.txt`.
    pub fn write_reports(&self, dir: &Path, stem: &str) -> RelexResult<Vec<PathBuf>> {
        let reports = [
            ("clusters", self.clusters_report()),
            ("patterns", self.patterns_report()),
            ("relations", self.relations_report()),
            ("sentences", self.sentences_report()),
        ];
        let mut written = Vec::with_capacity(reports.len());
        for (name, content) in reports {
            let path = dir.join(format!("{stem}_{name}.txt"));
            write_atomic(&path, content.as_bytes())?;
            written.push(path);
        }
        Ok(written)
    }

    pub fn clusters_report(&self) -> String {
        let mut out = format!("Cluster set contains {} clusters.\n", self.clusters.len());
        for cluster in &self.clusters {
            out.push_str(&format!(
                "Cluster {} contains {} phrases. With order {}\n",
                cluster.label(),
                cluster.len(),
                cluster.order()
            ));
            for phrase in cluster.phrase_ids().iter().filter_map(|id| self.phrase(*id)) {
                out.push_str(&format!("\t {}\n", phrase.full_sentence()));
            }
            if let Some(pattern) = cluster.pattern() {
                out.push_str(&format!(
                    "The cluster centroid pattern is: {} with confidence score {}\n",
                    pattern.as_string(),
                    pattern.confidence()
                ));
            }
            out.push('\n');
        }
        out
    }

    pub fn patterns_report(&self) -> String {
        let mut out = String::new();
        for pattern in self.clusters.iter().filter_map(Cluster::pattern) {
            out.push_str(&format!(
                "{} with confidence score {}\n\n",
                pattern.as_string(),
                pattern.confidence()
            ));
        }
        out
    }

    pub fn relations_report(&self) -> String {
        let mut out = String::new();
        for relation in self.relations.values().filter(|r| r.is_found()) {
            out.push_str(&format!(
                "({}, {}, {}, {})\n",
                relation.compound(),
                relation.value(),
                relation.units(),
                relation.confidence()
            ));
            for phrase in relation.phrases().iter().filter_map(|id| self.phrase(*id)) {
                out.push_str(&phrase.as_string());
                out.push('\n');
            }
            out.push('\n');
        }
        out
    }

    pub fn sentences_report(&self) -> String {
        let mut out = String::new();
        for sentence in &self.matched_sentences {
            out.push_str(sentence);
            out.push('\n');
        }
        out
    }
}

/// A phrase holds one entity per order position and one slot more than that.
fn check_phrase(index: usize, phrase: &Phrase) -> Result<(), PersistError> {
    let n = phrase.order().len();
    let kinds_match = phrase
        .entities()
        .iter()
        .map(|e| e.kind)
        .eq(phrase.order().kinds());
    if phrase.entities().len() != n || phrase.elements().len() != n + 1 || !kinds_match {
        return Err(PersistError::Corrupt {
            message: format!(
                "phrase #{index} has order {} with {} entities and {} slots",
                phrase.order(),
                phrase.entities().len(),
                phrase.elements().len()
            ),
        });
    }
    Ok(())
}

/// Write `bytes` to a sibling temp file, sync it, then rename over `path`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PersistError> {
    let io_err = |p: &Path| {
        let p = p.display().to_string();
        move |e: std::io::Error| PersistError::Io { path: p, source: e }
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dir_all(parent).map_err(io_err(parent))?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let mut file = File::create(&tmp).map_err(io_err(&tmp))?;
    file.write_all(bytes).map_err(io_err(&tmp))?;
    file.sync_all().map_err(io_err(&tmp))?;
    rename(&tmp, path).map_err(io_err(path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_leaves_no_temp_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("state.json");
        write_atomic(&path, b"{}").unwrap();
        write_atomic(&path, b"{\"a\":1}").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\"a\":1}");
        assert!(!tmp.path().join("nested").join("state.json.tmp").exists());
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let snowball = Snowball::new(SnowballConfig::curie()).unwrap();
        let mut snapshot = snowball.snapshot();
        snapshot.format_version = 99;
        let err = Snowball::from_snapshot(snapshot).unwrap_err();
        assert!(matches!(
            err,
            crate::error::RelexError::Persist(PersistError::UnsupportedVersion { found: 99, .. })
        ));
    }

    #[test]
    fn dangling_phrase_reference_is_corrupt() {
        let snowball =
            Snowball::new(SnowballConfig::curie().with_seed("CoS2", "116", "K")).unwrap();
        let mut snapshot = snowball.snapshot();
        snapshot.relations[0].phrases.push(PhraseId::new(7));
        let err = Snowball::from_snapshot(snapshot).unwrap_err();
        assert!(matches!(
            err,
            crate::error::RelexError::Persist(PersistError::Corrupt { .. })
        ));
    }

    #[test]
    fn malformed_phrase_is_corrupt() {
        let mut snowball =
            Snowball::new(SnowballConfig::curie().with_seed("CoS2", "116", "K")).unwrap();
        snowball
            .train(&[crate::corpus::Document::from_plain_text(
                "CoS2 is ferromagnetic with a Curie temperature of 116 K.",
            )])
            .unwrap();

        let mut json = serde_json::to_value(snowball.snapshot()).unwrap();
        let elements = json["phrases"][0]["elements"].as_array_mut().unwrap();
        assert_eq!(elements.len(), 5);
        elements.truncate(2);
        let snapshot: Snapshot = serde_json::from_value(json).unwrap();

        let err = Snowball::from_snapshot(snapshot).unwrap_err();
        assert!(matches!(
            err,
            crate::error::RelexError::Persist(PersistError::Corrupt { .. })
        ));
    }

    #[test]
    fn missing_file_is_reported() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = Snowball::load(&tmp.path().join("absent.json")).unwrap_err();
        assert!(matches!(
            err,
            crate::error::RelexError::Persist(PersistError::Missing { .. })
        ));
    }
}
