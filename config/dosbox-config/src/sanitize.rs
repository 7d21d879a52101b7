//! Translation of a settings map into one dialect's vocabulary


use crate::mapping::{ConfigKey, DialectTarget, MappingTable};
use crate::settings::{self, SettingsMap};
use crate::{Dialect, Document};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub from: ConfigKey,
    pub to: ConfigKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// The setting has no equivalent in the target dialect
    Unsupported(Dialect),
    /// The setting is not defined by the target dialect's reference config
    NotInReference,
    /// Another spelling of the same setting was kept instead
    Superseded { by: ConfigKey },
}

impl Display for DropReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unsupported(dialect) => write!(f, "not supported by {dialect}"),
            Self::NotInReference => write!(f, "not defined in reference config"),
            Self::Superseded { by } => write!(f, "superseded by {by}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedKey {
    pub key: ConfigKey,
    pub reason: DropReason,
}

/// Sanitizer output. Translations and drops are diagnostics that callers may show to the user;
/// neither is an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sanitized {
    pub settings: SettingsMap,
    pub translated: Vec<Translation>,
    pub dropped: Vec<DroppedKey>,
}

impl Sanitized {
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.translated.is_empty() && self.dropped.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Sanitizer<'a> {
    table: &'a MappingTable,
    reference: Option<&'a Document>,
}

impl<'a> Sanitizer<'a> {
    #[must_use]
    pub fn new(table: &'a MappingTable) -> Self {
        Self { table, reference: None }
    }

    /// Validate untranslated keys against a reference config of the target dialect. Without a
    /// reference, keys the mapping table does not know about pass through unchanged.
    #[must_use]
    pub fn with_reference(mut self, reference: &'a Document) -> Self {
        self.reference = Some(reference);
        self
    }

    fn defined_by_reference(&self, key: &ConfigKey) -> bool {
        self.reference.is_none_or(|reference| reference.contains(&key.section, &key.key))
    }

    /// Rewrite `settings` for `dialect`.
    ///
    /// Every spelling of one concept found in the input collapses to exactly one physical key in
    /// the output. When the dialect splits a concept into real-mode and protected-mode keys,
    /// `protected_mode` selects which one is written.
    #[must_use]
    pub fn sanitize(
        &self,
        settings: &SettingsMap,
        dialect: Dialect,
        protected_mode: bool,
    ) -> Sanitized {
        let mut out = Sanitized::default();

        // Concept index -> (physical key, value) entries in input order
        let mut groups: BTreeMap<usize, Vec<(ConfigKey, &str)>> = BTreeMap::new();

        for (section, key, value) in settings.iter() {
            if settings::is_reserved_section(section) {
                out.settings.insert(section, key, value);
                continue;
            }

            let config_key = ConfigKey::new(section, key);
            if let Some(idx) = self.table.concept_index(&config_key) {
                groups.entry(idx).or_default().push((config_key, value));
                continue;
            }

            if self.defined_by_reference(&config_key) {
                out.settings.insert(section, key, value);
            } else {
                log::debug!("Dropping {config_key}: not defined in {dialect} reference config");
                out.dropped
                    .push(DroppedKey { key: config_key, reason: DropReason::NotInReference });
            }
        }

        for (idx, entries) in groups {
            let concept = self.table.concept(idx);

            let target = match concept.target(dialect) {
                Some(target @ DialectTarget::Mapped { .. }) => {
                    target.select(protected_mode).cloned()
                }
                Some(DialectTarget::Unsupported) => None,
                None => Some(concept.canonical.clone()),
            };

            let Some(target) = target else {
                for (key, _) in entries {
                    log::info!("Dropping {key}: no equivalent in {dialect}");
                    out.dropped.push(DroppedKey { key, reason: DropReason::Unsupported(dialect) });
                }
                continue;
            };

            if concept.target(dialect).is_none() && !self.defined_by_reference(&target) {
                for (key, _) in entries {
                    log::debug!(
                        "Dropping {key}: {target} not defined in {dialect} reference config"
                    );
                    out.dropped.push(DroppedKey { key, reason: DropReason::NotInReference });
                }
                continue;
            }

            let winner = entries
                .iter()
                .position(|(key, _)| *key == target)
                .or_else(|| entries.iter().position(|(key, _)| *key == concept.canonical))
                .unwrap_or(0);

            for (i, (key, value)) in entries.into_iter().enumerate() {
                if i != winner {
                    log::info!("Dropping {key}: superseded by {target}");
                    out.dropped.push(DroppedKey {
                        key,
                        reason: DropReason::Superseded { by: target.clone() },
                    });
                    continue;
                }

                out.settings.insert(&target.section, &target.key, value);
                if key != target {
                    log::info!("Translated {key} to {target} for {dialect}");
                    out.translated.push(Translation { from: key, to: target.clone() });
                }
            }
        }

        out
    }
}
