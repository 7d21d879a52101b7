//! The persisted, dialect-agnostic representation of per-item overrides

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::btree_map;

/// Sections that never hold emulator settings.
///
/// `autoexec` holds commands rather than key-value pairs, and `extra` holds launcher-only tweaks
/// that are consumed when building the autoexec script.
pub const RESERVED_SECTIONS: [&str; 2] = ["autoexec", "extra"];

#[must_use]
pub fn is_reserved_section(section: &str) -> bool {
    RESERVED_SECTIONS.iter().any(|reserved| reserved.eq_ignore_ascii_case(section))
}

pub type SectionMap = BTreeMap<String, String>;

/// `section -> key -> value` map with lowercase section and key names.
///
/// Every key present is a deliberate override; a missing key means "use whatever the reference
/// config defines".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawSettings", into = "BTreeMap<String, SectionMap>")]
pub struct SettingsMap(BTreeMap<String, SectionMap>);

/// Settings as they appear in stored item records; values may have been written as JSON booleans
/// or numbers.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
struct RawSettings(BTreeMap<String, BTreeMap<String, RawValue>>);

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawValue {
    String(String),
    Bool(bool),
    Integer(i64),
    Float(f64),
}

impl RawValue {
    fn into_string(self) -> String {
        match self {
            Self::String(s) => s,
            Self::Bool(b) => b.to_string(),
            Self::Integer(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
        }
    }
}

impl From<RawSettings> for SettingsMap {
    fn from(value: RawSettings) -> Self {
        let mut settings = Self::new();
        for (section, keys) in value.0 {
            for (key, value) in keys {
                settings.insert(&section, &key, value.into_string());
            }
        }
        settings
    }
}

impl From<SettingsMap> for BTreeMap<String, SectionMap> {
    fn from(value: SettingsMap) -> Self {
        value.0
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

impl SettingsMap {
    #[must_use]
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    #[must_use]
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.0
            .get(&normalize(section))
            .and_then(|keys| keys.get(&normalize(key)))
            .map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, section: &str, key: &str) -> bool {
        self.get(section, key).is_some()
    }

    /// Insert a value, returning the previous value if the key was already present.
    pub fn insert(
        &mut self,
        section: &str,
        key: &str,
        value: impl Into<String>,
    ) -> Option<String> {
        self.0.entry(normalize(section)).or_default().insert(normalize(key), value.into())
    }

    /// Remove a key. Sections left empty are removed as well.
    pub fn remove(&mut self, section: &str, key: &str) -> Option<String> {
        let section = normalize(section);
        let keys = self.0.get_mut(&section)?;
        let removed = keys.remove(&normalize(key));
        if keys.is_empty() {
            self.0.remove(&section);
        }
        removed
    }

    pub fn remove_section(&mut self, section: &str) -> Option<SectionMap> {
        self.0.remove(&normalize(section))
    }

    #[must_use]
    pub fn section(&self, section: &str) -> Option<&SectionMap> {
        self.0.get(&normalize(section))
    }

    pub fn sections(&self) -> impl Iterator<Item = (&str, &SectionMap)> {
        self.0.iter().map(|(section, keys)| (section.as_str(), keys))
    }

    /// Iterate over `(section, key, value)` triples in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        self.0.iter().flat_map(|(section, keys)| {
            keys.iter().map(move |(key, value)| (section.as_str(), key.as_str(), value.as_str()))
        })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.values().all(BTreeMap::is_empty)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.values().map(BTreeMap::len).sum()
    }

    /// Copy every key from `other` into this map, overwriting existing values.
    pub fn merge(&mut self, other: &SettingsMap) {
        for (section, key, value) in other.iter() {
            self.insert(section, key, value);
        }
    }
}

impl<'a> IntoIterator for &'a SettingsMap {
    type Item = (&'a String, &'a SectionMap);
    type IntoIter = btree_map::Iter<'a, String, SectionMap>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<S: AsRef<str>, K: AsRef<str>, V: Into<String>> FromIterator<(S, K, V)> for SettingsMap {
    fn from_iter<T: IntoIterator<Item = (S, K, V)>>(iter: T) -> Self {
        let mut settings = Self::new();
        for (section, key, value) in iter {
            settings.insert(section.as_ref(), key.as_ref(), value);
        }
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_lowercased() {
        let mut settings = SettingsMap::new();
        settings.insert("CPU", " Cycles ", "max");

        assert_eq!(Some("max"), settings.get("cpu", "cycles"));
        assert_eq!(Some("max"), settings.get("Cpu", "CYCLES"));
        assert_eq!(vec![("cpu", "cycles", "max")], settings.iter().collect::<Vec<_>>());
    }

    #[test]
    fn remove_drops_empty_sections() {
        let mut settings: SettingsMap =
            [("cpu", "cycles", "max"), ("sdl", "fullscreen", "true")].into_iter().collect();

        assert_eq!(Some("max".into()), settings.remove("cpu", "cycles"));
        assert!(settings.section("cpu").is_none());
        assert_eq!(1, settings.len());
    }

    #[test]
    fn deserialize_scalar_values() {
        let settings: SettingsMap = serde_json::from_str(
            r#"{
                "CPU": {"Cycles": 20000},
                "sdl": {"fullscreen": true},
                "mixer": {"rate": "44100"}
            }"#,
        )
        .unwrap();

        assert_eq!(Some("20000"), settings.get("cpu", "cycles"));
        assert_eq!(Some("true"), settings.get("sdl", "fullscreen"));
        assert_eq!(Some("44100"), settings.get("mixer", "rate"));
    }

    #[test]
    fn reserved_sections() {
        assert!(is_reserved_section("AUTOEXEC"));
        assert!(is_reserved_section("extra"));
        assert!(!is_reserved_section("cpu"));
    }
}
