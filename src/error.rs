//! Rich diagnostic error types for the snowball-relex learner.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text so users know what went wrong and how to
//! fix it. Non-fatal conditions (unmatched sentences, weak candidates, empty
//! dictionaries) never surface here; they are absorbed where they occur.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the learner.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum RelexError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Seed(#[from] SeedError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Cluster(#[from] ClusterError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Pattern(#[from] PatternError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Persist(#[from] PersistError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Registry(#[from] RegistryError),
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown property type: \"{name}\"")]
    #[diagnostic(
        code(relex::config::unknown_property),
        help(
            "Built-in properties are `curie_temperatures` and `neel_temperatures`. \
             For any other property supply `specifier_regex`, `value_regex` and \
             `unit_regex` explicitly in the configuration."
        )
    )]
    UnknownProperty { name: String },

    #[error("invalid {role} regex: {message}")]
    #[diagnostic(
        code(relex::config::invalid_regex),
        help(
            "The {role} expression must be a valid `regex` crate pattern. \
             Named capture groups are reserved for pattern compilation and must not be used."
        )
    )]
    InvalidRegex { role: String, message: String },

    #[error("invalid configuration: {message}")]
    #[diagnostic(
        code(relex::config::invalid),
        help("Check the SnowballConfig fields. {message}")
    )]
    Invalid { message: String },

    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(relex::config::read),
        help("Ensure the config file exists and is valid TOML.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {path}")]
    #[diagnostic(
        code(relex::config::parse),
        help("Check the TOML syntax in the config file: {message}")
    )]
    Parse { path: String, message: String },

    #[error("failed to write config: {path}")]
    #[diagnostic(
        code(relex::config::write),
        help("Ensure you have write permissions to the config directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Seed errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum SeedError {
    #[error("seed #{index} has {found} fields, expected 3 (compound, value, units)")]
    #[diagnostic(
        code(relex::seed::arity),
        help("Every seed must be a triple such as [\"CoS2\", \"116\", \"K\"].")
    )]
    Arity { index: usize, found: usize },

    #[error("seed #{index} has an empty {field}")]
    #[diagnostic(
        code(relex::seed::empty_field),
        help("Compound, value and units must be non-empty after trimming whitespace.")
    )]
    EmptyField { index: usize, field: &'static str },
}

// ---------------------------------------------------------------------------
// Cluster errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ClusterError {
    #[error("cluster {label} has order {expected}, phrase has order {actual}")]
    #[diagnostic(
        code(relex::cluster::order_mismatch),
        help("A cluster only admits phrases whose entity ordering equals its own.")
    )]
    OrderMismatch {
        label: u32,
        expected: String,
        actual: String,
    },

    #[error("cluster {label} not found")]
    #[diagnostic(
        code(relex::cluster::not_found),
        help("List existing clusters with `relex info --state <file>`.")
    )]
    NotFound { label: u32 },
}

// ---------------------------------------------------------------------------
// Pattern errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum PatternError {
    #[error("failed to compile pattern for cluster {label}: {message}")]
    #[diagnostic(
        code(relex::pattern::compile),
        help(
            "The generated matcher was rejected by the regex engine. \
             This usually means a caller-supplied entity regex contains named groups \
             or exceeds the compiled size limit."
        )
    )]
    Compile { label: u32, message: String },
}

// ---------------------------------------------------------------------------
// Persistence errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum PersistError {
    #[error("learner state not found: {path}")]
    #[diagnostic(
        code(relex::persist::missing),
        help("Train a learner first with `relex train`, or check the --state path.")
    )]
    Missing { path: String },

    #[error("I/O error on {path}")]
    #[diagnostic(
        code(relex::persist::io),
        help(
            "A filesystem operation failed. Check that the directory exists, \
             has correct permissions, and that the disk is not full."
        )
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {message}")]
    #[diagnostic(
        code(relex::persist::serde),
        help("The snapshot could not be encoded or decoded. Re-train if the file is damaged.")
    )]
    Serialization { message: String },

    #[error("unsupported snapshot version {found} (this build reads version {expected})")]
    #[diagnostic(
        code(relex::persist::version),
        help("The snapshot was written by an incompatible release. Re-train the learner.")
    )]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("corrupt snapshot: {message}")]
    #[diagnostic(
        code(relex::persist::corrupt),
        help("The snapshot references data it does not contain. Re-train the learner.")
    )]
    Corrupt { message: String },
}

// ---------------------------------------------------------------------------
// Registry errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum RegistryError {
    #[error("a learner for property \"{property}\" is already registered")]
    #[diagnostic(
        code(relex::registry::duplicate),
        help("Each property may only be loaded once. Remove the existing learner first.")
    )]
    DuplicateProperty { property: String },

    #[error("no learner registered for property \"{property}\"")]
    #[diagnostic(
        code(relex::registry::unknown),
        help("Load a snapshot for this property with `SnowballRegistry::load`.")
    )]
    UnknownProperty { property: String },
}

/// Convenience alias for functions returning learner results.
pub type RelexResult<T> = std::result::Result<T, RelexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_error_converts_to_relex_error() {
        let err = SeedError::Arity { index: 2, found: 4 };
        let relex: RelexError = err.into();
        assert!(matches!(relex, RelexError::Seed(SeedError::Arity { .. })));
    }

    #[test]
    fn persist_error_converts_to_relex_error() {
        let err = PersistError::Missing {
            path: "curie.json".into(),
        };
        let relex: RelexError = err.into();
        assert!(matches!(relex, RelexError::Persist(PersistError::Missing { .. })));
    }

    #[test]
    fn error_display_messages_are_descriptive() {
        let err = ClusterError::OrderMismatch {
            label: 3,
            expected: "0213".into(),
            actual: "0123".into(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("0213"));
        assert!(msg.contains("0123"));

        let err = SeedError::Arity { index: 0, found: 2 };
        assert!(format!("{err}").contains("expected 3"));
    }
}
