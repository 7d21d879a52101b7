//! Stored per-item launch data

use crate::mount::MountSpec;
use dosbox_config::{Dialect, SettingsMap};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Section of the settings map holding launcher-only tweaks.
pub const EXTRA_SECTION: &str = "extra";

pub const DEFAULT_LOADFIX_SIZE: u32 = 64;

/// DOS extender whose presence marks a program as running in protected mode.
const PROTECTED_MODE_MARKER: &str = "dos4gw.exe";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutableRole {
    Main,
    Setup,
    Custom,
    #[default]
    Unassigned,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutableInfo {
    #[serde(default)]
    pub role: ExecutableRole,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub params: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LaunchTarget {
    /// The item's designated main executable
    #[default]
    Main,
    /// Any executable path relative to the item root
    Specific(String),
    /// Mount drives and stop at the DOS prompt
    DosPrompt,
}

/// Tweaks applied to the launch line, read from the `extra` settings section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LaunchTweaks {
    /// `loadfix -<size>` prefix
    pub loadfix: Option<u32>,
    /// `lh` prefix
    pub loadhigh: bool,
}

impl LaunchTweaks {
    #[must_use]
    pub fn from_settings(settings: &SettingsMap) -> Self {
        let loadfix = settings.get(EXTRA_SECTION, "loadfix").is_some_and(is_truthy).then(|| {
            let size = settings.get(EXTRA_SECTION, "loadfix_size").unwrap_or("");
            size.trim().parse().unwrap_or_else(|_| {
                if !size.is_empty() {
                    log::warn!("Invalid loadfix size '{size}', using {DEFAULT_LOADFIX_SIZE}");
                }
                DEFAULT_LOADFIX_SIZE
            })
        });
        let loadhigh = settings.get(EXTRA_SECTION, "loadhigh").is_some_and(is_truthy);

        Self { loadfix, loadhigh }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

/// One library item as persisted by the item store.
///
/// Field names follow the on-disk JSON records. Fields this crate does not interpret are kept in
/// `other` so that saving a record never loses data written by other tools.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// Executables keyed by path relative to the item root, using `/` separators
    #[serde(default)]
    pub executables: BTreeMap<String, ExecutableInfo>,
    /// Canonical settings overrides
    #[serde(default, rename = "dosbox_settings")]
    pub settings: SettingsMap,
    #[serde(default)]
    pub mounts: Vec<MountSpec>,
    #[serde(default, deserialize_with = "non_empty")]
    pub mount_c: Option<String>,
    #[serde(default, deserialize_with = "non_empty")]
    pub mount_d: Option<String>,
    #[serde(default, deserialize_with = "command_lines")]
    pub autoexec_pre: Vec<String>,
    #[serde(default, deserialize_with = "command_lines")]
    pub autoexec_post: Vec<String>,
    /// Persistent reference config loaded as the first config layer
    #[serde(default, deserialize_with = "non_empty")]
    pub reference_conf: Option<PathBuf>,
    #[serde(default, deserialize_with = "non_empty")]
    pub custom_dosbox_path: Option<PathBuf>,
    /// Preferred engine dialect
    #[serde(default, deserialize_with = "engine_tag")]
    pub engine: Option<Dialect>,
    #[serde(default)]
    pub play_count: u32,
    #[serde(default)]
    pub last_played: Option<String>,
    /// Accumulated play time in seconds
    #[serde(default)]
    pub play_time: f64,
    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

pub(crate) fn non_empty<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: From<String>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|value| !value.trim().is_empty()).map(T::from))
}

fn engine_tag<'de, D>(deserializer: D) -> Result<Option<Dialect>, D::Error>
where
    D: Deserializer<'de>,
{
    let tag: Option<String> = non_empty(deserializer)?;
    Ok(tag.and_then(|tag| {
        let dialect = Dialect::from_tag(&tag);
        if dialect.is_none() {
            log::warn!("Ignoring unknown engine '{tag}' in item record");
        }
        dialect
    }))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CommandLines {
    Text(String),
    Lines(Vec<String>),
}

fn command_lines<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let lines = match Option::<CommandLines>::deserialize(deserializer)? {
        Some(CommandLines::Text(text)) => text.lines().map(String::from).collect(),
        Some(CommandLines::Lines(lines)) => lines,
        None => vec![],
    };
    Ok(lines.into_iter().filter(|line| !line.trim().is_empty()).collect())
}

fn normalize_path(path: &str) -> String {
    path.trim().replace('\\', "/")
}

impl ItemRecord {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self { title: id.clone(), id, ..Self::default() }
    }

    /// Executables marked as the main program, in path order. More than one candidate is left for
    /// the caller to resolve.
    #[must_use]
    pub fn main_candidates(&self) -> Vec<&str> {
        self.executables
            .iter()
            .filter(|(_, info)| info.role == ExecutableRole::Main)
            .map(|(path, _)| path.as_str())
            .collect()
    }

    /// Look up an executable by path, ignoring case and separator style.
    #[must_use]
    pub fn executable(&self, path: &str) -> Option<(&str, &ExecutableInfo)> {
        let path = normalize_path(path);
        self.executables
            .iter()
            .find(|(candidate, _)| normalize_path(candidate).eq_ignore_ascii_case(&path))
            .map(|(candidate, info)| (candidate.as_str(), info))
    }

    #[must_use]
    pub fn is_main(&self, path: &str) -> bool {
        self.executable(path).is_some_and(|(_, info)| info.role == ExecutableRole::Main)
    }

    #[must_use]
    pub fn tweaks(&self) -> LaunchTweaks {
        LaunchTweaks::from_settings(&self.settings)
    }
}

/// Whether the item tree ships the DOS/4GW extender, the usual sign of a protected-mode program.
#[must_use]
pub fn detect_protected_mode(root: &Path) -> bool {
    WalkDir::new(root).into_iter().filter_map(Result::ok).any(|entry| {
        entry.file_type().is_file()
            && entry.file_name().to_string_lossy().eq_ignore_ascii_case(PROTECTED_MODE_MARKER)
    })
}
