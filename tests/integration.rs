//! End-to-end tests for the snowball learner.
//!
//! These tests exercise the full pipeline from seeding through training,
//! clustering and extraction, validating that relations, phrases, clusters
//! and patterns stay consistent with each other.

use snowball_relex::cluster::ClusterLabel;
use snowball_relex::config::{AcceptanceStrategy, SnowballConfig};
use snowball_relex::corpus::{Document, EntityTagger, Sentence, TaggedSpan, TaggedSpans};
use snowball_relex::error::{ClusterError, ConfigError, RelexError, SeedError};
use snowball_relex::relation::RelationKey;
use snowball_relex::snowball::Snowball;

const COS2: &str = "CoS2 is ferromagnetic with a Curie temperature of 116 K.";
const BIFEO3: &str = "BiFeO3 is ferromagnetic with a Curie temperature of 1103 K.";
const FE3O4: &str = "Fe3O4 is ferromagnetic with a Curie temperature of 858 K.";

fn corpus(lines: &[&str]) -> Vec<Document> {
    vec![Document::from_plain_text(&lines.join("\n"))]
}

fn trained(config: SnowballConfig, lines: &[&str]) -> Snowball {
    let mut snowball = Snowball::new(config).unwrap();
    snowball.train(&corpus(lines)).unwrap();
    snowball
}

#[test]
fn seed_sentence_creates_first_cluster() {
    let snowball = trained(SnowballConfig::curie().with_seed("CoS2", "116", "K"), &[COS2]);

    assert_eq!(snowball.phrases().len(), 1);
    let phrase = &snowball.phrases()[0];
    assert_eq!(phrase.order().as_str(), "0213");
    assert_eq!(phrase.entities().len(), 4);

    assert_eq!(snowball.clusters().len(), 1);
    let cluster = &snowball.clusters()[0];
    assert_eq!(cluster.label(), ClusterLabel::new(0));
    assert_eq!(cluster.order().as_str(), "0213");
    assert!(phrase.cluster_assignments().contains(&ClusterLabel::new(0)));

    let relation = snowball.relation(&RelationKey::new("CoS2", "116", "K")).unwrap();
    assert!(relation.is_found());
    assert_eq!(relation.confidence(), 1.0);
    assert_eq!(snowball.matched_sentences().count(), 1);
}

#[test]
fn similar_sentences_share_a_cluster() {
    let snowball = trained(
        SnowballConfig::curie()
            .with_seed("CoS2", "116", "K")
            .with_seed("BiFeO3", "1103", "K"),
        &[COS2, BIFEO3],
    );

    assert_eq!(snowball.clusters().len(), 1);
    let cluster = &snowball.clusters()[0];
    assert_eq!(cluster.len(), 2);

    let pattern = cluster.pattern().unwrap();
    assert_eq!(pattern.confidence(), 1.0);
    assert_eq!(pattern.extract(COS2), vec![RelationKey::new("CoS2", "116", "K")]);
    assert_eq!(
        pattern.extract(BIFEO3),
        vec![RelationKey::new("BiFeO3", "1103", "K")]
    );
}

#[test]
fn weak_candidate_is_rejected() {
    let config = SnowballConfig {
        t_c: 0.95,
        ..SnowballConfig::curie().with_seed("CoS2", "116", "K")
    };
    let mut snowball = trained(config, &[COS2]);

    let records = snowball
        .extract(&[Sentence::new(
            "NiO is antiferromagnetic below a Curie temperature of 525 K.",
        )])
        .unwrap();
    assert!(records.is_empty());
    assert_eq!(snowball.relation_count(), 1);
    assert!(snowball.relation(&RelationKey::new("NiO", "525", "K")).is_none());
}

#[test]
fn repeated_triple_merges_into_one_relation() {
    let snowball = trained(
        SnowballConfig::curie().with_seed("CoS2", "116", "K"),
        &[COS2, "The Curie temperature of CoS2 is 116 K."],
    );

    assert_eq!(snowball.relation_count(), 1);
    let relation = snowball.relation(&RelationKey::new("CoS2", "116", "K")).unwrap();
    assert_eq!(relation.phrases().len(), 2);
    assert_eq!(snowball.matched_sentences().count(), 2);
}

#[test]
fn multi_fact_sentence_trains_a_usable_pattern() {
    let cos2 = RelationKey::new("CoS2", "116", "K");
    let nis2 = RelationKey::new("NiS2", "50", "K");
    let mut snowball = trained(
        SnowballConfig::curie()
            .with_seed("CoS2", "116", "K")
            .with_seed("NiS2", "50", "K"),
        &["CoS2 and NiS2 have Curie temperatures of 116 K and 50 K respectively."],
    );

    // Both facts share a single phrase.
    assert_eq!(snowball.phrases().len(), 1);
    let id = snowball.relation(&cos2).unwrap().phrases()[0];
    assert_eq!(snowball.relation(&nis2).unwrap().phrases(), &[id]);
    let phrase = snowball.phrase(id).unwrap();
    assert_eq!(phrase.order().as_str(), "0021313");
    assert_eq!(phrase.retrieve_relations(), vec![cos2.clone(), nis2.clone()]);

    assert_eq!(snowball.clusters().len(), 1);
    let pattern = snowball.clusters()[0].pattern().unwrap();
    assert_eq!(pattern.confidence(), 1.0);

    let unseen = "FeS2 and MnS2 have Curie temperatures of 20 K and 30 K respectively.";
    assert_eq!(
        pattern.extract(unseen),
        vec![
            RelationKey::new("FeS2", "20", "K"),
            RelationKey::new("MnS2", "30", "K"),
        ]
    );

    let records = snowball.extract(&[Sentence::new(unseen)]).unwrap();
    let mut names: Vec<&str> = records.iter().map(|r| r.names[0].as_str()).collect();
    names.sort_unstable();
    assert_eq!(names, vec!["FeS2", "MnS2"]);
    assert!(records.iter().all(|r| (r.confidence - 1.0).abs() < 1e-12));
    assert!(snowball.relation(&RelationKey::new("MnS2", "30", "K")).unwrap().is_found());
}

#[test]
fn extraction_accepts_confident_candidate() {
    let mut snowball = trained(SnowballConfig::curie().with_seed("CoS2", "116", "K"), &[COS2]);

    let records = snowball.extract(&[Sentence::new(FE3O4)]).unwrap();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.property, "curie_temperatures");
    assert_eq!(record.names, vec!["Fe3O4"]);
    assert_eq!(record.value, "858");
    assert_eq!(record.units, "K");
    assert!((record.confidence - 1.0).abs() < 1e-12);

    let relation = snowball.relation(&RelationKey::new("Fe3O4", "858", "K")).unwrap();
    assert!(relation.is_found());
    assert_eq!(relation.phrases().len(), 1);

    // The accepted phrase joins the cluster it matched.
    assert_eq!(snowball.clusters()[0].len(), 2);
    let accepted = snowball.phrase(relation.phrases()[0]).unwrap();
    assert!(accepted.cluster_assignments().contains(&ClusterLabel::new(0)));
}

#[test]
fn extraction_of_known_relation_merges() {
    let mut snowball = trained(SnowballConfig::curie().with_seed("CoS2", "116", "K"), &[COS2]);

    let records = snowball.extract(&[Sentence::new(COS2)]).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].confidence, 1.0);
    assert_eq!(snowball.relation_count(), 1);
    let relation = snowball.relation(&RelationKey::new("CoS2", "116", "K")).unwrap();
    assert_eq!(relation.phrases().len(), 2);
}

#[test]
fn best_strategy_accepts_one_candidate_per_call() {
    let mut snowball = trained(SnowballConfig::curie().with_seed("CoS2", "116", "K"), &[COS2]);
    let sentences = [
        Sentence::new(FE3O4),
        Sentence::new("NiS2 is ferromagnetic with a Curie temperature of 50 K."),
    ];
    let records = snowball.extract(&sentences).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].names, vec!["Fe3O4"]);
}

#[test]
fn top_k_strategy_accepts_several_candidates() {
    let config = SnowballConfig {
        acceptance: AcceptanceStrategy::TopK { k: 2 },
        ..SnowballConfig::curie().with_seed("CoS2", "116", "K")
    };
    let mut snowball = trained(config, &[COS2]);
    let sentences = [
        Sentence::new(FE3O4),
        Sentence::new("NiS2 is ferromagnetic with a Curie temperature of 50 K."),
    ];
    let records = snowball.extract(&sentences).unwrap();
    assert_eq!(records.len(), 2);
    assert!(snowball.relation(&RelationKey::new("NiS2", "50", "K")).is_some());
    assert_eq!(snowball.clusters()[0].len(), 3);
}

#[test]
fn untrained_learner_extracts_nothing() {
    let mut snowball = Snowball::new(SnowballConfig::curie()).unwrap();
    assert!(snowball.extract(&[Sentence::new(FE3O4)]).unwrap().is_empty());
}

#[test]
fn sentence_without_specifier_is_skipped() {
    let mut snowball = Snowball::new(SnowballConfig::curie().with_seed("CoS2", "116", "K")).unwrap();
    let summary = snowball.train(&corpus(&["CoS2 melts at 116 K."])).unwrap();
    assert_eq!(summary.sentences, 1);
    assert_eq!(summary.matched_sentences, 0);
    assert_eq!(summary.phrases, 0);
    assert!(snowball.clusters().is_empty());
    let relation = snowball.relation(&RelationKey::new("CoS2", "116", "K")).unwrap();
    assert!(!relation.is_found());
}

#[test]
fn oversized_inputs_are_skipped() {
    let config = SnowballConfig {
        max_candidate_entities: 4,
        ..SnowballConfig::curie().with_seed("CoS2", "116", "K")
    };
    let mut snowball = trained(config, &[COS2]);
    let crowded = "CoS2 and NiS2 are ferromagnetic with a Curie temperature of 116 K.";
    assert!(snowball.extract(&[Sentence::new(crowded)]).unwrap().is_empty());

    let config = SnowballConfig {
        max_sentence_length: 20,
        ..SnowballConfig::curie().with_seed("CoS2", "116", "K")
    };
    let mut snowball = trained(config, &[COS2]);
    assert!(snowball.extract(&[Sentence::new(FE3O4)]).unwrap().is_empty());
}

/// Tags one fixed sentence layout, standing in for an external tagger.
struct FixedTagger;

impl EntityTagger for FixedTagger {
    fn tag(&self, _sentence: &str) -> TaggedSpans {
        TaggedSpans {
            compounds: vec![TaggedSpan::new(0, 5, 0)],
            specifiers: vec![TaggedSpan::new(30, 47, 0)],
            values: vec![TaggedSpan::new(51, 54, 0)],
            units: vec![TaggedSpan::new(55, 56, 0)],
        }
    }
}

#[test]
fn extraction_with_external_tagger() {
    let mut snowball = trained(SnowballConfig::curie().with_seed("CoS2", "116", "K"), &[COS2]);
    let records = snowball
        .extract_with(&[Sentence::new(FE3O4)], &FixedTagger)
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].names, vec!["Fe3O4"]);
}

#[test]
fn training_order_changes_clusters() {
    let a = "CoS2 is ferromagnetic with a Curie temperature of 116 K.";
    let b = "BiFeO3 is ferromagnetic and has a Curie temperature of 1103 K.";
    let c = "Fe3O4 and has a Curie temperature of 858 K.";
    let key_a = RelationKey::new("CoS2", "116", "K");
    let key_b = RelationKey::new("BiFeO3", "1103", "K");
    let key_c = RelationKey::new("Fe3O4", "858", "K");

    let build = |seeds: [&RelationKey; 3]| {
        let mut config = SnowballConfig {
            t_sim: 0.9,
            ..SnowballConfig::curie()
        };
        for key in seeds {
            config = config.with_seed(&key.compound, &key.value, &key.units);
        }
        trained(config, &[a, b, c])
    };
    let cluster_of = |snowball: &Snowball, key: &RelationKey| {
        let id = snowball.relation(key).unwrap().phrases()[0];
        snowball
            .clusters()
            .iter()
            .find(|cluster| cluster.contains(id))
            .map(|cluster| cluster.label())
            .unwrap()
    };

    let forward = build([&key_a, &key_b, &key_c]);
    assert_eq!(forward.clusters().len(), 2);
    assert_eq!(cluster_of(&forward, &key_b), cluster_of(&forward, &key_a));
    assert_ne!(cluster_of(&forward, &key_b), cluster_of(&forward, &key_c));

    let backward = build([&key_c, &key_b, &key_a]);
    assert_eq!(backward.clusters().len(), 2);
    assert_eq!(cluster_of(&backward, &key_b), cluster_of(&backward, &key_c));
    assert_ne!(cluster_of(&backward, &key_b), cluster_of(&backward, &key_a));
}

#[test]
fn phrases_hold_their_invariants() {
    let snowball = trained(
        SnowballConfig::curie()
            .with_seed("CoS2", "116", "K")
            .with_seed("BiFeO3", "1103", "K"),
        &[COS2, BIFEO3, "The Curie temperature of CoS2 is 116 K."],
    );
    for phrase in snowball.phrases() {
        assert_eq!(phrase.order().len(), phrase.entities().len());
        assert_eq!(phrase.middles().len(), phrase.entities().len() - 1);
        assert!(phrase.entities().windows(2).all(|w| w[0].end <= w[1].start));
    }
    for cluster in snowball.clusters() {
        for id in cluster.phrase_ids() {
            assert_eq!(snowball.phrase(*id).unwrap().order(), cluster.order());
        }
        let confidence = cluster.pattern().unwrap().confidence();
        assert!((0.0..=1.0).contains(&confidence));
    }
}

#[test]
fn delete_cluster_unassigns_phrases() {
    let mut snowball = trained(SnowballConfig::curie().with_seed("CoS2", "116", "K"), &[COS2]);
    let removed = snowball.delete_cluster(ClusterLabel::new(0)).unwrap();
    assert_eq!(removed.len(), 1);
    assert!(snowball.clusters().is_empty());
    assert!(!snowball.phrases()[0].is_clustered());
    let relation = snowball.relation(&RelationKey::new("CoS2", "116", "K")).unwrap();
    assert_eq!(relation.phrases(), removed.phrase_ids());

    let err = snowball.delete_cluster(ClusterLabel::new(0)).unwrap_err();
    assert!(matches!(err, RelexError::Cluster(ClusterError::NotFound { label: 0 })));

    // Labels are never reused.
    snowball.cluster_phrases().unwrap();
    assert_eq!(snowball.clusters()[0].label(), ClusterLabel::new(1));
}

#[test]
fn malformed_seeds_are_fatal() {
    let mut config = SnowballConfig::curie();
    config.seeds.push(vec!["CoS2".into(), "116".into()]);
    let err = Snowball::new(config).unwrap_err();
    assert!(matches!(err, RelexError::Seed(SeedError::Arity { found: 2, .. })));

    let mut snowball = Snowball::new(SnowballConfig::curie()).unwrap();
    let err = snowball
        .add_seeds(&[vec!["CoS2".into(), " ".into(), "K".into()]])
        .unwrap_err();
    assert!(matches!(err, RelexError::Seed(SeedError::EmptyField { .. })));
    assert_eq!(snowball.relation_count(), 0);
}

#[test]
fn seeding_is_idempotent() {
    let mut snowball = Snowball::new(SnowballConfig::curie().with_seed("CoS2", "116", "K")).unwrap();
    let added = snowball
        .add_seeds(&[vec!["CoS2".into(), "116".into(), "K".into()]])
        .unwrap();
    assert_eq!(added, 0);
    assert_eq!(snowball.relation_count(), 1);
    assert_eq!(snowball.seeds().len(), 1);
}

#[test]
fn unknown_property_is_fatal() {
    let err = Snowball::new(SnowballConfig::new("band_gaps")).unwrap_err();
    assert!(matches!(err, RelexError::Config(ConfigError::UnknownProperty { .. })));
}

#[test]
fn neel_profile_trains() {
    let snowball = trained(
        SnowballConfig::new("neel_temperatures").with_seed("NiO", "525", "K"),
        &["NiO is antiferromagnetic with a Néel temperature of 525 K."],
    );
    assert_eq!(snowball.clusters().len(), 1);
    assert_eq!(snowball.property(), "neel_temperatures");
}
