//! JSON item records on disk

use crate::config::LauncherConfig;
use crate::item::ItemRecord;
use crate::mount::{self, MountSpec};
use crate::process::LaunchOutcome;
use dosbox_config::SettingsMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use time::{OffsetDateTime, format_description};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Item '{item_id}' not found")]
    NotFound { item_id: String },
    #[error("Error reading item record '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("Error parsing item record '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Error serializing item record '{item_id}': {source}")]
    Serialize {
        item_id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Error writing item record '{path}': {source}")]
    Write {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    fn read(path: &Path, source: io::Error) -> Self {
        Self::Read { path: path.display().to_string(), source }
    }

    fn parse(path: &Path, source: serde_json::Error) -> Self {
        Self::Parse { path: path.display().to_string(), source }
    }

    fn write(path: &Path, source: io::Error) -> Self {
        Self::Write { path: path.display().to_string(), source }
    }
}

/// Source of item records for the launch pipeline.
pub trait ItemStore {
    /// # Errors
    ///
    /// Returns an error if the item does not exist or its record cannot be read.
    fn item(&self, item_id: &str) -> Result<ItemRecord, StoreError>;

    /// Root directory of the item's files.
    fn item_root(&self, item_id: &str) -> PathBuf;

    /// # Errors
    ///
    /// Propagates errors from [`ItemStore::item`].
    fn overrides(&self, item_id: &str) -> Result<SettingsMap, StoreError> {
        Ok(self.item(item_id)?.settings)
    }

    /// The item's effective mounts, including mounts derived from legacy fields.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`ItemStore::item`].
    fn mount_spec(&self, item_id: &str) -> Result<Vec<MountSpec>, StoreError> {
        let record = self.item(item_id)?;
        Ok(mount::effective_mounts(&record, &self.item_root(item_id)))
    }
}

/// Stores each item as `<items_dir>/<id>/<id>.json`; item files live in `<games_dir>/<id>`.
#[derive(Debug, Clone)]
pub struct JsonItemStore {
    items_dir: PathBuf,
    games_dir: PathBuf,
}

impl JsonItemStore {
    #[must_use]
    pub fn new(items_dir: impl Into<PathBuf>, games_dir: impl Into<PathBuf>) -> Self {
        Self { items_dir: items_dir.into(), games_dir: games_dir.into() }
    }

    #[must_use]
    pub fn from_config(config: &LauncherConfig) -> Self {
        Self::new(config.items_dir(), config.games_dir())
    }

    #[must_use]
    pub fn record_path(&self, item_id: &str) -> PathBuf {
        self.items_dir.join(item_id).join(format!("{item_id}.json"))
    }

    /// Item IDs with a record on disk, sorted.
    #[must_use]
    pub fn item_ids(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.items_dir) else {
            return vec![];
        };

        let mut ids: Vec<String> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|id| self.record_path(id).is_file())
            .collect();
        ids.sort();
        ids
    }

    /// Write a record. The full JSON text is built in memory and moved into place in one step,
    /// so readers never observe a partially written record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be serialized or written.
    pub fn save(&self, record: &ItemRecord) -> Result<(), StoreError> {
        let path = self.record_path(&record.id);
        let json = serde_json::to_string_pretty(record)
            .map_err(|source| StoreError::Serialize { item_id: record.id.clone(), source })?;

        let dir = path.parent().unwrap_or(&self.items_dir);
        fs::create_dir_all(dir).map_err(|err| StoreError::write(dir, err))?;

        let mut file = tempfile::Builder::new()
            .prefix(".record")
            .suffix(".json")
            .tempfile_in(dir)
            .map_err(|err| StoreError::write(dir, err))?;
        file.write_all(json.as_bytes()).map_err(|err| StoreError::write(file.path(), err))?;
        file.persist(&path).map_err(|err| StoreError::write(&path, err.error))?;

        log::debug!("Saved item record '{}'", path.display());
        Ok(())
    }

    /// Update play statistics after a session of the item's main program.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be loaded or saved.
    pub fn record_session(
        &self,
        item_id: &str,
        outcome: &LaunchOutcome,
    ) -> Result<ItemRecord, StoreError> {
        let mut record = self.item(item_id)?;
        record.play_count += 1;
        record.play_time += outcome.duration.as_secs_f64();
        if let Some(now) = format_last_played(now_local()) {
            record.last_played = Some(now);
        }

        self.save(&record)?;
        Ok(record)
    }
}

impl ItemStore for JsonItemStore {
    fn item(&self, item_id: &str) -> Result<ItemRecord, StoreError> {
        let path = self.record_path(item_id);
        let json = fs::read_to_string(&path).map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                StoreError::NotFound { item_id: item_id.into() }
            } else {
                StoreError::read(&path, err)
            }
        })?;

        let mut record: ItemRecord =
            serde_json::from_str(&json).map_err(|err| StoreError::parse(&path, err))?;
        if record.id.is_empty() {
            record.id = item_id.into();
        }
        if record.title.is_empty() {
            record.title = item_id.into();
        }

        Ok(record)
    }

    fn item_root(&self, item_id: &str) -> PathBuf {
        self.games_dir.join(item_id)
    }
}

fn now_local() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

fn format_last_played(date_time: OffsetDateTime) -> Option<String> {
    let format = format_description::parse_borrowed::<2>("[year]-[month]-[day] [hour]:[minute]")
        .map_err(|err| log::error!("Invalid last-played format: {err}"))
        .ok()?;
    date_time.format(&format).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ExecutableInfo, ExecutableRole};
    use std::time::Duration;
    use test_log::test;

    fn store() -> (tempfile::TempDir, JsonItemStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonItemStore::new(dir.path().join("items"), dir.path().join("games"));
        (dir, store)
    }

    #[test]
    fn save_and_load() {
        let (_dir, store) = store();
        let mut record = ItemRecord::new("keen4");
        let main = ExecutableInfo { role: ExecutableRole::Main, ..ExecutableInfo::default() };
        record.executables.insert("KEEN4E.EXE".into(), main);
        record.settings.insert("cpu", "cycles", "8000");
        store.save(&record).unwrap();

        assert!(store.record_path("keen4").ends_with("items/keen4/keen4.json"));
        assert_eq!(record, store.item("keen4").unwrap());
        assert_eq!(Some("8000"), store.overrides("keen4").unwrap().get("cpu", "cycles"));
        assert_eq!(vec!["keen4"], store.item_ids());
    }

    #[test]
    fn missing_and_invalid_records() {
        let (_dir, store) = store();
        assert!(matches!(store.item("nope"), Err(StoreError::NotFound { .. })));

        let path = store.record_path("broken");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(store.item("broken"), Err(StoreError::Parse { .. })));
    }

    #[test]
    fn id_and_title_default_to_directory_name() {
        let (_dir, store) = store();
        let path = store.record_path("doom");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, r#"{"mount_c": "DOOM"}"#).unwrap();

        let record = store.item("doom").unwrap();
        assert_eq!("doom", record.id);
        assert_eq!("doom", record.title);
        assert_eq!(vec![MountSpec::directory('c', "DOOM")], store.mount_spec("doom").unwrap());
    }

    #[test]
    fn session_statistics() {
        let (_dir, store) = store();
        let mut record = ItemRecord::new("keen4");
        record.play_time = 10.0;
        store.save(&record).unwrap();

        let outcome = LaunchOutcome { status: None, duration: Duration::from_millis(2500) };
        store.record_session("keen4", &outcome).unwrap();
        let record = store.record_session("keen4", &outcome).unwrap();

        assert_eq!(2, record.play_count);
        assert!((record.play_time - 15.0).abs() < 1e-9);
        assert!(record.last_played.is_some());
        assert_eq!(record, store.item("keen4").unwrap());
    }

    #[test]
    fn last_played_format() {
        let date_time = OffsetDateTime::from_unix_timestamp(1_709_967_959).unwrap();
        assert_eq!(Some("2024-03-09 07:05".into()), format_last_played(date_time));
    }
}
