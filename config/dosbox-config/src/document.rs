//! Edit-preserving model of a DOSBox-style INI config file
//!
//! Parsing never fails. Lines that cannot be interpreted are kept as opaque text and written back
//! unchanged, so files edited by hand or by other emulator versions survive a machine edit with
//! their comments, ordering and key casing intact.


use crate::settings::{self, SettingsMap};
use rustc_hash::FxHashMap;
use std::fmt::{Display, Formatter};

/// Sections whose body is free text (commands) rather than key-value pairs.
const RAW_SECTIONS: [&str; 1] = ["autoexec"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Blank(String),
    Comment(String),
    Section {
        raw: String,
        name: String,
    },
    KeyValue {
        raw: String,
        section: String,
        key: String,
        raw_key: String,
        value: String,
    },
    Unknown(String),
}

impl Line {
    #[must_use]
    pub fn raw(&self) -> &str {
        match self {
            Self::Blank(raw)
            | Self::Comment(raw)
            | Self::Unknown(raw)
            | Self::Section { raw, .. }
            | Self::KeyValue { raw, .. } => raw,
        }
    }

    fn parse(line: &str, current_section: Option<&str>) -> Self {
        let trimmed = line.trim();

        if trimmed.is_empty() {
            return Self::Blank(line.into());
        }

        if trimmed.starts_with(['#', '%', ';']) {
            return Self::Comment(line.into());
        }

        if trimmed.starts_with('[') && trimmed.ends_with(']') && trimmed.len() >= 2 {
            let name = trimmed[1..trimmed.len() - 1].trim().to_ascii_lowercase();
            return Self::Section { raw: line.into(), name };
        }

        match current_section {
            Some(section) if !is_raw_section(section) => {
                if let Some((raw_key, value)) = trimmed.split_once('=') {
                    let raw_key = raw_key.trim();
                    return Self::KeyValue {
                        raw: line.into(),
                        section: section.into(),
                        key: raw_key.to_ascii_lowercase(),
                        raw_key: raw_key.into(),
                        value: value.trim().into(),
                    };
                }
            }
            _ => {}
        }

        Self::Unknown(line.into())
    }
}

fn is_raw_section(section: &str) -> bool {
    RAW_SECTIONS.contains(&section)
}

fn first_line(text: &str) -> &str {
    text.split(['\r', '\n']).next().unwrap_or_default()
}

#[derive(Debug, Clone, Default)]
struct SectionIndex {
    // Line after which new keys for this section are inserted: the last header or key line of
    // the section's last occurrence
    insert_after: usize,
    keys: FxHashMap<String, usize>,
}

/// An ordered sequence of config lines plus a `section -> key -> line` index.
///
/// Section and key lookups are case-insensitive. When a key appears more than once in a section
/// the last occurrence is the effective one, matching how the emulator reads its config files.
#[derive(Debug, Clone, Default)]
pub struct Document {
    lines: Vec<Line>,
    index: FxHashMap<String, SectionIndex>,
    trailing_newline: bool,
}

impl Document {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut lines = Vec::new();
        let mut current_section: Option<String> = None;

        for line in text.lines() {
            let parsed = Line::parse(line, current_section.as_deref());
            match &parsed {
                Line::Section { name, .. } => current_section = Some(name.clone()),
                Line::Unknown(raw)
                    if current_section.as_deref().is_none_or(|s| !is_raw_section(s)) =>
                {
                    log::debug!("Keeping uninterpreted config line: '{raw}'");
                }
                _ => {}
            }
            lines.push(parsed);
        }

        let mut document = Self {
            lines,
            index: FxHashMap::default(),
            trailing_newline: text.ends_with('\n'),
        };
        document.rebuild_index();
        document
    }

    fn rebuild_index(&mut self) {
        self.index.clear();

        for (i, line) in self.lines.iter().enumerate() {
            match line {
                Line::Section { name, .. } => {
                    self.index.entry(name.clone()).or_default().insert_after = i;
                }
                Line::KeyValue { section, key, .. } => {
                    let section_index = self.index.entry(section.clone()).or_default();
                    section_index.insert_after = i;
                    section_index.keys.insert(key.clone(), i);
                }
                _ => {}
            }
        }
    }

    #[must_use]
    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    fn key_line(&self, section: &str, key: &str) -> Option<usize> {
        self.index.get(section).and_then(|section_index| section_index.keys.get(key).copied())
    }

    #[must_use]
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        let i = self
            .key_line(&section.trim().to_ascii_lowercase(), &key.trim().to_ascii_lowercase())?;
        match &self.lines[i] {
            Line::KeyValue { value, .. } => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn contains(&self, section: &str, key: &str) -> bool {
        self.get(section, key).is_some()
    }

    #[must_use]
    pub fn has_section(&self, section: &str) -> bool {
        self.index.contains_key(&section.trim().to_ascii_lowercase())
    }

    /// Section names in order of first appearance.
    #[must_use]
    pub fn sections(&self) -> Vec<&str> {
        let mut sections: Vec<&str> = Vec::new();
        for line in &self.lines {
            if let Line::Section { name, .. } = line
                && !sections.contains(&name.as_str())
            {
                sections.push(name);
            }
        }
        sections
    }

    /// Effective keys of a section (lowercase) in order of first appearance.
    #[must_use]
    pub fn section_keys(&self, section: &str) -> Vec<&str> {
        let section = section.trim().to_ascii_lowercase();
        let mut keys: Vec<&str> = Vec::new();
        for line in &self.lines {
            if let Line::KeyValue { section: line_section, key, .. } = line
                && *line_section == section
                && !keys.contains(&key.as_str())
            {
                keys.push(key);
            }
        }
        keys
    }

    /// Raw body lines of a section, excluding the header. Mostly useful for `[autoexec]`, whose
    /// body is never interpreted as key-value pairs.
    #[must_use]
    pub fn raw_section_lines(&self, section: &str) -> Vec<&str> {
        let section = section.trim().to_ascii_lowercase();
        let mut in_section = false;
        let mut body = Vec::new();
        for line in &self.lines {
            match line {
                Line::Section { name, .. } => in_section = *name == section,
                _ if in_section => body.push(line.raw()),
                _ => {}
            }
        }
        body
    }

    /// Set a value.
    ///
    /// An existing key is updated in place, keeping its original casing. A new key is appended
    /// after the last key of its section; a new section is appended at the end of the document,
    /// separated from preceding content by a blank line. Setting a key to its current value is a
    /// no-op.
    ///
    /// Names and values are single-line; anything after the first line break is discarded.
    pub fn set(&mut self, section: &str, key: &str, value: &str) {
        let section = first_line(section).trim().to_ascii_lowercase();
        let key = first_line(key).trim().to_ascii_lowercase();
        let single_line = first_line(value);
        if single_line.len() != value.len() {
            log::warn!("Discarding text after line break in value of [{section}] {key}");
        }
        let value = single_line.trim();

        if is_raw_section(&section) {
            log::warn!("Ignoring attempt to set '{key}' in raw section [{section}]");
            return;
        }

        if let Some(i) = self.key_line(&section, &key) {
            if let Line::KeyValue { raw, raw_key, value: current, .. } = &mut self.lines[i]
                && current != value
            {
                *raw = format!("{raw_key} = {value}");
                *current = value.into();
            }
            return;
        }

        let new_line = Line::KeyValue {
            raw: format!("{key} = {value}"),
            section: section.clone(),
            key: key.clone(),
            raw_key: key,
            value: value.into(),
        };

        match self.index.get(&section) {
            Some(section_index) => {
                self.lines.insert(section_index.insert_after + 1, new_line);
            }
            None => {
                if self.lines.last().is_some_and(|line| !matches!(line, Line::Blank(_))) {
                    self.lines.push(Line::Blank(String::new()));
                }
                self.lines.push(Line::Section { raw: format!("[{section}]"), name: section });
                self.lines.push(new_line);
            }
        }

        self.rebuild_index();
    }

    /// Remove every occurrence of a key, returning the effective value it had.
    pub fn remove(&mut self, section: &str, key: &str) -> Option<String> {
        let section = section.trim().to_ascii_lowercase();
        let key = key.trim().to_ascii_lowercase();

        let removed = self.get(&section, &key).map(String::from);
        if removed.is_some() {
            self.lines.retain(|line| {
                !matches!(
                    line,
                    Line::KeyValue { section: s, key: k, .. } if *s == section && *k == key
                )
            });
            self.rebuild_index();
        }
        removed
    }

    /// Layer every value from `settings` on top of this document.
    pub fn apply(&mut self, settings: &SettingsMap) {
        for (section, key, value) in settings.iter() {
            if settings::is_reserved_section(section) {
                continue;
            }
            self.set(section, key, value);
        }
    }

    /// Convert the document's effective key-value pairs into a settings map, e.g. to import a
    /// hand-written config file as item overrides.
    #[must_use]
    pub fn to_settings(&self) -> SettingsMap {
        let mut settings = SettingsMap::new();
        for line in &self.lines {
            if let Line::KeyValue { section, key, value, .. } = line {
                settings.insert(section, key, value.as_str());
            }
        }
        settings
    }

    #[must_use]
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for (i, line) in self.lines.iter().enumerate() {
            if i != 0 {
                out.push('\n');
            }
            out.push_str(line.raw());
        }
        if self.trailing_newline {
            out.push('\n');
        }
        out
    }
}

impl Display for Document {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.serialize())
    }
}
