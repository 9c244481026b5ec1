// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # snowball-relex
//!
//! Bootstrapped relation extraction. Starting from a few seed facts
//! (compound, value, units) for one physical property, the learner finds
//! sentences that express them, clusters those phrases by context, derives
//! a regex pattern per cluster, and uses the patterns to extract new facts
//! from unseen text.
//!
//! ## Architecture
//!
//! - **Phrases** (`phrase`): tagged entities plus prefix/middle/suffix token slots
//! - **Clusters** (`cluster`): per-slot token dictionaries and a centroid pattern
//! - **Patterns** (`pattern`): compiled matchers with an estimated confidence
//! - **Learner** (`snowball`): seeding, training, candidate scoring and acceptance
//! - **Persistence** (`persist`): versioned JSON snapshots and text reports
//!
//! ## Library usage
//!
//! ```no_run
//! use snowball_relex::config::SnowballConfig;
//! use snowball_relex::corpus::{Document, Sentence};
//! use snowball_relex::snowball::Snowball;
//!
//! let config = SnowballConfig::curie().with_seed("CoS2", "116", "K");
//! let mut snowball = Snowball::new(config).unwrap();
//! let corpus = Document::from_plain_text(
//!     "CoS2 is ferromagnetic with a Curie temperature of 116 K.\n",
//! );
//! snowball.train(&[corpus]).unwrap();
//!
//! let found = snowball
//!     .extract(&[Sentence::new("Fe3O4 is ferromagnetic with a Curie temperature of 858 K.")])
//!     .unwrap();
//! for record in found {
//!     println!("{} = {} {}", record.names[0], record.value, record.units);
//! }
//! ```

pub mod cluster;
pub mod config;
pub mod corpus;
pub mod error;
pub mod pattern;
pub mod persist;
pub mod phrase;
pub mod registry;
pub mod relation;
pub mod similarity;
pub mod snowball;
pub mod text;
