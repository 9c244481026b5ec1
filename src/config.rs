//! Learner configuration.
//!
//! A [`SnowballConfig`] is stored as TOML. Every field except `property` has
//! a serde default, so a minimal file only names the property and its seeds.
//! Entity regexes come from the property's built-in profile unless the
//! config overrides them.

use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::phrase::ContextWindow;
use crate::similarity::{MiddleWeighting, SimilarityWeights};

/// Compound tagger used when the config does not supply one: two or more
/// element symbols with optional stoichiometry.
pub const DEFAULT_COMPOUND_REGEX: &str = r"\b(?:[A-Z][a-z]?\d*(?:\.\d+)?){2,}\b";

/// Hard ceiling for `max_candidate_entities`; combinations grow as 2^n.
pub const MAX_CANDIDATE_ENTITIES_LIMIT: usize = 20;

/// Built-in specifier/value/unit expressions for a named property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyProfile {
    pub name: &'static str,
    pub specifier: &'static str,
    pub value: &'static str,
    pub unit: &'static str,
}

const TEMPERATURE_VALUE: &str = r"\b\d+(?:\.\d+)?\b";
const TEMPERATURE_UNIT: &str = r"(?:°\s?[CF]\b|\bK\b)";

const PROFILES: &[PropertyProfile] = &[
    PropertyProfile {
        name: "curie_temperatures",
        specifier: r"\b(?:[Cc]urie\s+temperatures?|T[Cc](?:urie)?)\b",
        value: TEMPERATURE_VALUE,
        unit: TEMPERATURE_UNIT,
    },
    PropertyProfile {
        name: "neel_temperatures",
        specifier: r"\b(?:[Nn][ée]el\s+temperatures?|T[Nn](?:[ée]el)?)\b",
        value: TEMPERATURE_VALUE,
        unit: TEMPERATURE_UNIT,
    },
];

/// Look up a built-in property profile by name.
pub fn profile(name: &str) -> Option<&'static PropertyProfile> {
    PROFILES.iter().find(|p| p.name == name)
}

/// Names of all built-in property profiles.
pub fn profile_names() -> impl Iterator<Item = &'static str> {
    PROFILES.iter().map(|p| p.name)
}

/// How accepted candidates are chosen from the eligible set of one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum AcceptanceStrategy {
    /// Only the single most confident candidate.
    #[default]
    Best,
    /// The `k` most confident candidates.
    TopK { k: usize },
}

/// Compiled entity expressions shared by the tagger and pattern compilation.
#[derive(Debug, Clone)]
pub struct EntityRegexes {
    pub specifier: Regex,
    pub value: Regex,
    pub unit: Regex,
    pub compound: Regex,
}

/// Configuration for one learner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnowballConfig {
    /// Property name, e.g. `curie_temperatures`.
    pub property: String,
    /// Minimum similarity for a phrase to join a cluster.
    #[serde(default = "default_threshold")]
    pub t_sim: f64,
    /// Minimum confidence for a candidate to be accepted.
    #[serde(default = "default_threshold")]
    pub t_c: f64,
    /// Weight of a freshly estimated pattern confidence against the previous one.
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    #[serde(default = "default_prefix_weight")]
    pub prefix_weight: f64,
    #[serde(default = "default_middle_weight")]
    pub middle_weight: f64,
    #[serde(default = "default_suffix_weight")]
    pub suffix_weight: f64,
    #[serde(default)]
    pub middle_weighting: MiddleWeighting,
    #[serde(default)]
    pub acceptance: AcceptanceStrategy,
    /// Tokens kept before the first entity.
    #[serde(default = "default_window")]
    pub prefix_length: usize,
    /// Tokens kept after the last entity.
    #[serde(default = "default_window")]
    pub suffix_length: usize,
    /// Sentences longer than this (in characters) are skipped at extraction.
    #[serde(default = "default_max_sentence_length")]
    pub max_sentence_length: usize,
    /// Sentences with more tagged spans than this are skipped at extraction.
    #[serde(default = "default_max_candidate_entities")]
    pub max_candidate_entities: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specifier_regex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_regex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_regex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compound_regex: Option<String>,
    /// Seed triples `[compound, value, units]`.
    #[serde(default)]
    pub seeds: Vec<Vec<String>>,
}

fn default_threshold() -> f64 {
    0.8
}
fn default_learning_rate() -> f64 {
    1.0
}
fn default_prefix_weight() -> f64 {
    0.1
}
fn default_middle_weight() -> f64 {
    0.8
}
fn default_suffix_weight() -> f64 {
    0.1
}
fn default_window() -> usize {
    1
}
fn default_max_sentence_length() -> usize {
    500
}
fn default_max_candidate_entities() -> usize {
    12
}

impl SnowballConfig {
    /// Defaults for the given property with no seeds.
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            t_sim: default_threshold(),
            t_c: default_threshold(),
            learning_rate: default_learning_rate(),
            prefix_weight: default_prefix_weight(),
            middle_weight: default_middle_weight(),
            suffix_weight: default_suffix_weight(),
            middle_weighting: MiddleWeighting::default(),
            acceptance: AcceptanceStrategy::default(),
            prefix_length: default_window(),
            suffix_length: default_window(),
            max_sentence_length: default_max_sentence_length(),
            max_candidate_entities: default_max_candidate_entities(),
            specifier_regex: None,
            value_regex: None,
            unit_regex: None,
            compound_regex: None,
            seeds: Vec::new(),
        }
    }

    /// Defaults for the Curie temperature profile.
    pub fn curie() -> Self {
        Self::new("curie_temperatures")
    }

    /// Builder: append a seed triple.
    pub fn with_seed(mut self, compound: &str, value: &str, units: &str) -> Self {
        self.seeds
            .push(vec![compound.to_string(), value.to_string(), units.to_string()]);
        self
    }

    pub fn weights(&self) -> SimilarityWeights {
        SimilarityWeights {
            prefix: self.prefix_weight,
            middle: self.middle_weight,
            suffix: self.suffix_weight,
            middle_weighting: self.middle_weighting,
        }
    }

    pub fn window(&self) -> ContextWindow {
        ContextWindow {
            prefix: self.prefix_length,
            suffix: self.suffix_length,
        }
    }

    /// Check numeric ranges and the acceptance strategy.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.property.trim().is_empty() {
            return Err(invalid("`property` must not be empty"));
        }
        for (name, value) in [
            ("t_sim", self.t_sim),
            ("t_c", self.t_c),
            ("learning_rate", self.learning_rate),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(format!("`{name}` must lie in [0, 1], got {value}")));
            }
        }
        for (name, value) in [
            ("prefix_weight", self.prefix_weight),
            ("middle_weight", self.middle_weight),
            ("suffix_weight", self.suffix_weight),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(format!(
                    "`{name}` must be a non-negative number, got {value}"
                )));
            }
        }
        if let AcceptanceStrategy::TopK { k: 0 } = self.acceptance {
            return Err(invalid("`acceptance.k` must be at least 1"));
        }
        if !(4..=MAX_CANDIDATE_ENTITIES_LIMIT).contains(&self.max_candidate_entities) {
            return Err(invalid(format!(
                "`max_candidate_entities` must lie in [4, {MAX_CANDIDATE_ENTITIES_LIMIT}], got {}",
                self.max_candidate_entities
            )));
        }
        Ok(())
    }

    /// Resolve and compile the entity expressions.
    ///
    /// Explicit overrides win; otherwise the property's profile supplies
    /// them. A property without a profile must override all three of
    /// specifier, value and unit.
    pub fn compile_regexes(&self) -> Result<EntityRegexes, ConfigError> {
        let profile = profile(&self.property);
        let pick = |explicit: &Option<String>,
                    builtin: Option<&'static str>|
         -> Result<String, ConfigError> {
            explicit
                .clone()
                .or_else(|| builtin.map(str::to_string))
                .ok_or_else(|| ConfigError::UnknownProperty {
                    name: self.property.clone(),
                })
        };

        let specifier = pick(&self.specifier_regex, profile.map(|p| p.specifier))?;
        let value = pick(&self.value_regex, profile.map(|p| p.value))?;
        let unit = pick(&self.unit_regex, profile.map(|p| p.unit))?;
        let compound = self
            .compound_regex
            .clone()
            .unwrap_or_else(|| DEFAULT_COMPOUND_REGEX.to_string());

        Ok(EntityRegexes {
            specifier: compile_entity_regex("specifier", &specifier)?,
            value: compile_entity_regex("value", &value)?,
            unit: compile_entity_regex("unit", &unit)?,
            compound: compile_entity_regex("compound", &compound)?,
        })
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml(&content).map_err(|e| match e {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.display().to_string(),
                message,
            },
            other => other,
        })
    }

    /// Parse from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: "<inline>".into(),
            message: e.to_string(),
        })
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        message: message.into(),
    }
}

fn compile_entity_regex(role: &str, source: &str) -> Result<Regex, ConfigError> {
    let regex = Regex::new(source).map_err(|e| ConfigError::InvalidRegex {
        role: role.to_string(),
        message: e.to_string(),
    })?;
    if regex.capture_names().flatten().next().is_some() {
        return Err(ConfigError::InvalidRegex {
            role: role.to_string(),
            message: "named capture groups are not allowed".into(),
        });
    }
    Ok(regex)
}
