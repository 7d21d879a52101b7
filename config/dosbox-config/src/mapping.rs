//! Table of setting names across dialects
//!
//! The table is data loaded from a JSON resource with the shape
//! `section -> key -> dialect tag -> {"section", "key", "protected_key"?}`. The outer
//! `(section, key)` pair is the canonical name of a setting. A dialect tag mapped to `null`, `{}`
//! or an object without a `key` marks the setting as unsupported in that dialect; a dialect tag
//! that is not listed at all means the canonical name is used verbatim.

use crate::{ConfigError, ConfigResult, Dialect};
use rustc_hash::FxHashMap;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::{fs, io};

/// A physical `(section, key)` pair with lowercase names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConfigKey {
    pub section: String,
    pub key: String,
}

impl ConfigKey {
    #[must_use]
    pub fn new(section: &str, key: &str) -> Self {
        Self { section: section.trim().to_ascii_lowercase(), key: key.trim().to_ascii_lowercase() }
    }
}

impl Display for ConfigKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.section, self.key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialectTarget {
    Mapped {
        key: ConfigKey,
        /// Alternate key used instead of `key` when the launched program runs in protected mode
        protected: Option<ConfigKey>,
    },
    Unsupported,
}

impl DialectTarget {
    /// The physical key to write for this dialect, or `None` if the dialect has no equivalent.
    #[must_use]
    pub fn select(&self, protected_mode: bool) -> Option<&ConfigKey> {
        match self {
            Self::Mapped { protected: Some(protected), .. } if protected_mode => Some(protected),
            Self::Mapped { key, .. } => Some(key),
            Self::Unsupported => None,
        }
    }
}

/// One configuration concept and its spelling in each dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Concept {
    pub canonical: ConfigKey,
    pub targets: BTreeMap<Dialect, DialectTarget>,
}

impl Concept {
    /// `None` means the table has no entry for this dialect; the canonical name applies.
    #[must_use]
    pub fn target(&self, dialect: Dialect) -> Option<&DialectTarget> {
        self.targets.get(&dialect)
    }

    /// Every physical key that represents this concept in any dialect, canonical key first.
    #[must_use]
    pub fn physical_keys(&self) -> Vec<&ConfigKey> {
        let mut keys = vec![&self.canonical];
        for target in self.targets.values() {
            if let DialectTarget::Mapped { key, protected } = target {
                for key in std::iter::once(key).chain(protected) {
                    if !keys.contains(&key) {
                        keys.push(key);
                    }
                }
            }
        }
        keys
    }
}

#[derive(Debug, Deserialize)]
struct RawTarget {
    section: Option<String>,
    key: Option<String>,
    protected_key: Option<String>,
}

type RawTable = BTreeMap<String, BTreeMap<String, BTreeMap<String, Option<RawTarget>>>>;

#[derive(Debug, Clone, Default)]
pub struct MappingTable {
    concepts: Vec<Concept>,
    by_physical: FxHashMap<ConfigKey, usize>,
}

impl MappingTable {
    /// A table with no entries; every key passes through under its own name.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load the table from a JSON file.
    ///
    /// A missing file is not an error: translation is simply unavailable and an empty table is
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or is not a valid mapping table.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let json = match fs::read_to_string(path) {
            Ok(json) => json,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                log::warn!(
                    "Key mapping table not found at '{}'; settings will not be translated",
                    path.display()
                );
                return Ok(Self::empty());
            }
            Err(err) => return Err(ConfigError::mapping_read(path, err)),
        };

        let table =
            Self::from_json_str(&json).map_err(|err| ConfigError::mapping_parse(path, err))?;
        log::info!("Loaded {} key mappings from '{}'", table.concepts.len(), path.display());

        Ok(table)
    }

    /// Parse the table from JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text does not have the expected nested-object shape.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        let raw: RawTable = serde_json::from_str(json)?;

        let mut table = Self::empty();
        for (section, keys) in raw {
            for (key, dialects) in keys {
                let canonical = ConfigKey::new(&section, &key);

                let mut targets = BTreeMap::new();
                for (tag, target) in dialects {
                    let Some(dialect) = Dialect::from_tag(&tag) else {
                        log::warn!(
                            "Ignoring unknown dialect tag '{tag}' in mapping for {canonical}"
                        );
                        continue;
                    };
                    targets.insert(dialect, parse_target(&canonical, target));
                }

                table.push(Concept { canonical, targets });
            }
        }

        Ok(table)
    }

    fn push(&mut self, concept: Concept) {
        let idx = self.concepts.len();
        for key in concept.physical_keys() {
            if let Some(&existing) = self.by_physical.get(key) {
                log::warn!(
                    "{key} is listed under both {} and {}; keeping the first",
                    self.concepts[existing].canonical,
                    concept.canonical
                );
                continue;
            }
            self.by_physical.insert(key.clone(), idx);
        }
        self.concepts.push(concept);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.concepts.len()
    }

    pub fn concepts(&self) -> impl Iterator<Item = &Concept> {
        self.concepts.iter()
    }

    /// Find the concept that a physical key belongs to, whether the key is the canonical name or
    /// any dialect's spelling of it.
    #[must_use]
    pub fn concept_of(&self, section: &str, key: &str) -> Option<&Concept> {
        self.concept_index(&ConfigKey::new(section, key)).map(|idx| &self.concepts[idx])
    }

    pub(crate) fn concept_index(&self, key: &ConfigKey) -> Option<usize> {
        self.by_physical.get(key).copied()
    }

    pub(crate) fn concept(&self, idx: usize) -> &Concept {
        &self.concepts[idx]
    }
}

fn parse_target(canonical: &ConfigKey, target: Option<RawTarget>) -> DialectTarget {
    let Some(RawTarget { section, key: Some(key), protected_key }) = target else {
        return DialectTarget::Unsupported;
    };

    let section = section.as_deref().unwrap_or(&canonical.section);
    DialectTarget::Mapped {
        key: ConfigKey::new(section, &key),
        protected: protected_key.map(|protected_key| ConfigKey::new(section, &protected_key)),
    }
}
