//! Emulator drive mounts

use crate::item::{self, ItemRecord};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_IMAGE_MODE: &str = "iso";

/// Directory that holds the item's C: drive when present, relative to the item root.
pub const DRIVES_C_DIR: &str = "drives/c";

/// Directory scanned for CD images when an item has no explicit D: mount.
pub const CD_IMAGE_DIR: &str = "cd";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MountKind {
    #[default]
    #[serde(rename = "dir", alias = "directory")]
    Directory,
    #[serde(rename = "image", alias = "img", alias = "iso")]
    Image,
}

/// One drive mount. Paths are relative to the item root or absolute; directory mounts use only
/// the first path, image mounts may chain several images (e.g. multi-disc games).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountSpec {
    pub drive: String,
    #[serde(rename = "type", default)]
    pub kind: MountKind,
    #[serde(rename = "path", with = "path_list")]
    pub paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "item::non_empty")]
    pub label: Option<String>,
    #[serde(rename = "as", default = "default_image_mode")]
    pub image_mode: String,
}

fn default_image_mode() -> String {
    DEFAULT_IMAGE_MODE.into()
}

/// Stored records keep all paths of a mount in one `;`-separated string.
mod path_list {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(paths: &[String], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&paths.join(";"))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let joined = String::deserialize(deserializer)?;
        Ok(joined
            .split(';')
            .map(str::trim)
            .filter(|path| !path.is_empty())
            .map(String::from)
            .collect())
    }
}

impl MountSpec {
    #[must_use]
    pub fn directory(drive: char, path: impl Into<String>) -> Self {
        Self {
            drive: drive.to_string(),
            kind: MountKind::Directory,
            paths: vec![path.into()],
            label: None,
            image_mode: default_image_mode(),
        }
    }

    #[must_use]
    pub fn image(drive: char, paths: Vec<String>) -> Self {
        Self {
            drive: drive.to_string(),
            kind: MountKind::Image,
            paths,
            label: None,
            image_mode: default_image_mode(),
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Lowercase drive letter, or `None` if the stored drive is not a single letter.
    #[must_use]
    pub fn drive_letter(&self) -> Option<char> {
        let drive = self.drive.trim().trim_end_matches(':');
        let mut chars = drive.chars();
        match (chars.next(), chars.next()) {
            (Some(letter), None) if letter.is_ascii_alphabetic() => {
                Some(letter.to_ascii_lowercase())
            }
            _ => None,
        }
    }

    /// The `mount`/`imgmount` command for this spec, or `None` if the spec is unusable.
    #[must_use]
    pub fn command(&self) -> Option<String> {
        let Some(drive) = self.drive_letter() else {
            log::warn!("Skipping mount with invalid drive '{}'", self.drive);
            return None;
        };

        if self.paths.is_empty() {
            log::warn!("Skipping mount of drive {drive}: no path given");
            return None;
        }

        let paths =
            self.paths.iter().map(|path| format!("\"{path}\"")).collect::<Vec<_>>().join(" ");

        let command = match self.kind {
            MountKind::Directory => match &self.label {
                Some(label) => {
                    let label: String =
                        label.chars().filter(|&c| c != '"' && !c.is_control()).collect();
                    format!("mount {drive} {paths} -label \"{label}\"")
                }
                None => format!("mount {drive} {paths}"),
            },
            MountKind::Image => {
                let mode = self.image_mode.trim();
                let mode = if mode.is_empty() { DEFAULT_IMAGE_MODE } else { mode };
                format!("imgmount {drive} {paths} -t {mode}")
            }
        };

        Some(command)
    }

    fn is_c_directory(&self) -> bool {
        self.kind == MountKind::Directory && self.drive_letter() == Some('c')
    }
}

/// The effective mount list for an item: its explicit mounts, or mounts derived from the legacy
/// `mount_c`/`mount_d` fields and the item's directory layout.
#[must_use]
pub fn effective_mounts(record: &ItemRecord, item_root: &Path) -> Vec<MountSpec> {
    if !record.mounts.is_empty() {
        return record.mounts.clone();
    }

    let mut mounts = vec![MountSpec::directory('c', legacy_c_path(record, item_root))];

    if let Some(mount_d) = &record.mount_d {
        mounts.push(MountSpec::image('d', vec![mount_d.clone()]));
    } else {
        for (image, drive) in cd_images(item_root).into_iter().zip('d'..='z') {
            mounts.push(MountSpec::image(drive, vec![format!("{CD_IMAGE_DIR}/{image}")]));
        }
    }

    mounts
}

fn legacy_c_path(record: &ItemRecord, item_root: &Path) -> String {
    if let Some(mount_c) = &record.mount_c {
        mount_c.clone()
    } else if item_root.join(DRIVES_C_DIR).is_dir() {
        DRIVES_C_DIR.into()
    } else {
        ".".into()
    }
}

fn cd_images(item_root: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(item_root.join(CD_IMAGE_DIR)) else {
        return vec![];
    };

    let mut images: Vec<String> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|file_type| file_type.is_file()))
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| {
            let lower = name.to_ascii_lowercase();
            lower.ends_with(".iso") || lower.ends_with(".cue")
        })
        .collect();
    images.sort();
    images
}

/// The path mounted as C:, used as the root for DOS path translation. The first directory mount
/// of drive C wins; without one the item root itself (`.`) is the mount root.
#[must_use]
pub fn mount_root(mounts: &[MountSpec]) -> &str {
    mounts
        .iter()
        .find(|mount| mount.is_c_directory())
        .and_then(|mount| mount.paths.first())
        .map_or(".", String::as_str)
}
