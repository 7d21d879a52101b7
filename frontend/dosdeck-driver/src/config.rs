//! Launcher configuration file

use crate::engine::EngineInstall;
use cfg_if::cfg_if;
use dosbox_config::Dialect;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "dosdeck.toml";

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 250;

/// Explicitly configured reference config per dialect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferencePaths {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staging: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<PathBuf>,
}

impl ReferencePaths {
    #[must_use]
    pub fn get(&self, dialect: Dialect) -> Option<&Path> {
        match dialect {
            Dialect::Standard => self.standard.as_deref(),
            Dialect::Staging => self.staging.as_deref(),
            Dialect::X => self.x.as_deref(),
        }
    }

    pub fn set(&mut self, dialect: Dialect, path: Option<PathBuf>) {
        match dialect {
            Dialect::Standard => self.standard = path,
            Dialect::Staging => self.staging = path,
            Dialect::X => self.x = path,
        }
    }
}

/// Launcher settings. Relative paths are resolved against `base_dir`; unset directories default
/// to the standard library layout below it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LauncherConfig {
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,
    /// Folder holding one directory per item
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub games_dir: Option<PathBuf>,
    /// Folder holding one JSON record per item
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items_dir: Option<PathBuf>,
    /// Folder receiving the per-launch config layers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping_table: Option<PathBuf>,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub engines: Vec<EngineInstall>,
    #[serde(default)]
    pub reference_configs: ReferencePaths,
}

fn default_base_dir() -> PathBuf {
    ".".into()
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            games_dir: None,
            items_dir: None,
            work_dir: None,
            mapping_table: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            engines: vec![],
            reference_configs: ReferencePaths::default(),
        }
    }
}

impl LauncherConfig {
    /// Load the config, falling back to defaults if the file is missing or invalid.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let config_str = match fs::read_to_string(path) {
            Ok(config_str) => config_str,
            Err(err) => {
                log::info!(
                    "Unable to read launcher config '{}', using defaults: {err}",
                    path.display()
                );
                return Self::default();
            }
        };

        toml::from_str(&config_str).unwrap_or_else(|err| {
            log::error!("Error deserializing launcher config '{}': {err}", path.display());
            Self::default()
        })
    }

    #[must_use]
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into(), ..Self::default() }
    }

    /// Resolve a configured path against the base directory.
    #[must_use]
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() { path.to_path_buf() } else { self.base_dir.join(path) }
    }

    fn dir_or(&self, dir: Option<&Path>, default: &str) -> PathBuf {
        match dir {
            Some(dir) => self.resolve(dir),
            None => self.base_dir.join(default),
        }
    }

    #[must_use]
    pub fn games_dir(&self) -> PathBuf {
        self.dir_or(self.games_dir.as_deref(), "games")
    }

    #[must_use]
    pub fn items_dir(&self) -> PathBuf {
        self.dir_or(self.items_dir.as_deref(), "database/games_datainfo")
    }

    #[must_use]
    pub fn work_dir(&self) -> PathBuf {
        self.dir_or(self.work_dir.as_deref(), "confs")
    }

    #[must_use]
    pub fn mapping_table_path(&self) -> PathBuf {
        self.dir_or(self.mapping_table.as_deref(), "database/key-mappings.json")
    }

    /// Root directory of an item's files.
    #[must_use]
    pub fn item_root(&self, item_id: &str) -> PathBuf {
        self.games_dir().join(item_id)
    }

    /// Explicitly configured reference config for a dialect, resolved against the base directory.
    #[must_use]
    pub fn reference_config(&self, dialect: Dialect) -> Option<PathBuf> {
        self.reference_configs.get(dialect).map(|path| self.resolve(path))
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

#[must_use]
pub fn default_config_path() -> PathBuf {
    cfg_if! {
        if #[cfg(target_os = "linux")] {
            default_linux_config_path()
        } else {
            CONFIG_FILENAME.into()
        }
    }
}

#[cfg(target_os = "linux")]
fn default_linux_config_path() -> PathBuf {
    let Some(base_dirs) = directories::BaseDirs::new() else {
        log::error!("Unable to determine config dir; falling back to '{CONFIG_FILENAME}'");
        return CONFIG_FILENAME.into();
    };

    base_dirs.config_dir().join("dosdeck").join(CONFIG_FILENAME)
}
