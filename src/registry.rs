//! Learner registry: property name → [`Snowball`].
//!
//! The host builds a [`SnowballRegistry`] explicitly and fills it from
//! snapshot files with [`SnowballRegistry::load`]. Nothing is read from
//! disk implicitly.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::corpus::Sentence;
use crate::error::{RegistryError, RelexResult};
use crate::relation::RelationRecord;
use crate::snowball::Snowball;

/// Learners keyed by property name.
pub struct SnowballRegistry {
    learners: BTreeMap<String, Snowball>,
}

impl SnowballRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            learners: BTreeMap::new(),
        }
    }

    /// Load snapshot files and register each learner.
    ///
    /// All files are read before anything is registered; a failure or a
    /// duplicate property leaves the registry unchanged. Returns the number
    /// of learners added.
    pub fn load<P: AsRef<Path>>(&mut self, paths: &[P]) -> RelexResult<usize> {
        let mut loaded: Vec<Snowball> = Vec::with_capacity(paths.len());
        for path in paths {
            let snowball = Snowball::load(path.as_ref())?;
            let property = snowball.property();
            if self.learners.contains_key(property)
                || loaded.iter().any(|s| s.property() == property)
            {
                return Err(RegistryError::DuplicateProperty {
                    property: property.to_string(),
                }
                .into());
            }
            loaded.push(snowball);
        }
        let count = loaded.len();
        for snowball in loaded {
            self.learners.insert(snowball.property().to_string(), snowball);
        }
        tracing::info!(loaded = count, total = self.learners.len(), "registry loaded");
        Ok(count)
    }

    /// Register a learner. Errors if its property is already taken.
    pub fn register(&mut self, snowball: Snowball) -> RelexResult<()> {
        let property = snowball.property().to_string();
        if self.learners.contains_key(&property) {
            return Err(RegistryError::DuplicateProperty { property }.into());
        }
        self.learners.insert(property, snowball);
        Ok(())
    }

    pub fn get(&self, property: &str) -> Option<&Snowball> {
        self.learners.get(property)
    }

    pub fn get_mut(&mut self, property: &str) -> Option<&mut Snowball> {
        self.learners.get_mut(property)
    }

    /// Remove and return the learner for `property`.
    pub fn remove(&mut self, property: &str) -> RelexResult<Snowball> {
        self.learners.remove(property).ok_or_else(|| {
            RegistryError::UnknownProperty {
                property: property.to_string(),
            }
            .into()
        })
    }

    /// Registered property names, sorted.
    pub fn properties(&self) -> impl Iterator<Item = &str> {
        self.learners.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.learners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.learners.is_empty()
    }

    /// Run extraction with every learner, in property order.
    pub fn extract_all(&mut self, sentences: &[Sentence]) -> RelexResult<Vec<RelationRecord>> {
        let mut records = Vec::new();
        for snowball in self.learners.values_mut() {
            records.extend(snowball.extract(sentences)?);
        }
        Ok(records)
    }

    /// Save every learner as `<dir>/<property>.json`.
    pub fn save_all(&self, dir: &Path) -> RelexResult<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(self.learners.len());
        for (property, snowball) in &self.learners {
            let path = dir.join(format!("{property}.json"));
            snowball.save(&path)?;
            written.push(path);
        }
        Ok(written)
    }
}

impl Default for SnowballRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SnowballRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnowballRegistry")
            .field("properties", &self.properties().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SnowballConfig;
    use crate::error::RelexError;

    fn learner(property: &str) -> Snowball {
        Snowball::new(SnowballConfig::new(property).with_seed("CoS2", "116", "K")).unwrap()
    }

    #[test]
    fn register_and_get() {
        let mut reg = SnowballRegistry::new();
        reg.register(learner("curie_temperatures")).unwrap();
        reg.register(learner("neel_temperatures")).unwrap();

        assert_eq!(reg.len(), 2);
        assert!(reg.get("curie_temperatures").is_some());
        assert!(reg.get("band_gaps").is_none());
        assert_eq!(
            reg.properties().collect::<Vec<_>>(),
            vec!["curie_temperatures", "neel_temperatures"]
        );
    }

    #[test]
    fn duplicate_property_error() {
        let mut reg = SnowballRegistry::new();
        reg.register(learner("curie_temperatures")).unwrap();
        let err = reg.register(learner("curie_temperatures")).unwrap_err();
        assert!(matches!(
            err,
            RelexError::Registry(RegistryError::DuplicateProperty { .. })
        ));
    }

    #[test]
    fn remove_unknown_property() {
        let mut reg = SnowballRegistry::new();
        assert!(matches!(
            reg.remove("curie_temperatures"),
            Err(RelexError::Registry(RegistryError::UnknownProperty { .. }))
        ));
        reg.register(learner("curie_temperatures")).unwrap();
        assert!(reg.remove("curie_temperatures").is_ok());
        assert!(reg.is_empty());
    }

    #[test]
    fn save_all_then_load() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut reg = SnowballRegistry::new();
        reg.register(learner("curie_temperatures")).unwrap();
        reg.register(learner("neel_temperatures")).unwrap();
        let paths = reg.save_all(tmp.path()).unwrap();
        assert_eq!(paths.len(), 2);

        let mut restored = SnowballRegistry::new();
        assert_eq!(restored.load(&paths).unwrap(), 2);
        assert_eq!(
            restored.get("neel_temperatures").unwrap().relation_count(),
            1
        );

        let err = restored.load(&paths[..1]).unwrap_err();
        assert!(matches!(
            err,
            RelexError::Registry(RegistryError::DuplicateProperty { .. })
        ));
        assert_eq!(restored.len(), 2);
    }
}
