//! Emulator installations, engine selection and reference config discovery

use crate::item::ItemRecord;
use crate::{LaunchError, LaunchResult};
use dosbox_config::Dialect;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Maximum directory depth searched below an engine's directory for a reference config.
const REFERENCE_SEARCH_DEPTH: usize = 3;

/// An installed emulator build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineInstall {
    pub name: String,
    pub path: PathBuf,
    /// Explicit dialect; guessed from the name and path when not set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dialect: Option<Dialect>,
    #[serde(default)]
    pub default: bool,
}

impl EngineInstall {
    #[must_use]
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self { name: name.into(), path: path.into(), dialect: None, default: false }
    }

    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.dialect
            .or_else(|| Dialect::guess_from_name(&self.name))
            .or_else(|| guess_from_path(&self.path))
            .unwrap_or_default()
    }
}

fn guess_from_path(path: &Path) -> Option<Dialect> {
    Dialect::guess_from_name(&path.to_string_lossy())
}

fn install_at<'a>(installs: &'a [EngineInstall], path: &Path) -> Option<&'a EngineInstall> {
    let canonical = fs::canonicalize(path).ok();
    installs.iter().find(|install| {
        install.path == path
            || canonical.is_some() && fs::canonicalize(&install.path).ok() == canonical
    })
}

/// The emulator executable chosen for a launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEngine {
    pub path: PathBuf,
    pub dialect: Dialect,
}

impl ResolvedEngine {
    /// Directory holding the emulator executable.
    #[must_use]
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new("."))
    }
}

/// Pick the emulator for an item.
///
/// Priority: explicit override path, the item's custom emulator path, the first installation
/// matching the item's preferred engine, then the default installation (the first one flagged
/// `default`, else the first listed).
///
/// The dialect of an explicit path is taken from the installation configured at that path, else
/// the item's preferred engine, else guessed from the path text.
///
/// # Errors
///
/// Returns [`LaunchError::NoEmulator`] if nothing is configured and
/// [`LaunchError::EmulatorNotFound`] if the chosen executable does not exist.
pub fn resolve_engine(
    override_path: Option<&Path>,
    record: &ItemRecord,
    installs: &[EngineInstall],
) -> LaunchResult<ResolvedEngine> {
    let explicit_path = |path: &Path| ResolvedEngine {
        path: path.to_path_buf(),
        dialect: install_at(installs, path)
            .map(EngineInstall::dialect)
            .or(record.engine)
            .or_else(|| guess_from_path(path))
            .unwrap_or_default(),
    };
    let from_install = |install: &EngineInstall| ResolvedEngine {
        path: install.path.clone(),
        dialect: install.dialect(),
    };

    let resolved = if let Some(path) = override_path {
        log::debug!("Using emulator override '{}'", path.display());
        explicit_path(path)
    } else if let Some(path) = &record.custom_dosbox_path {
        log::debug!("Using custom emulator path '{}' for item '{}'", path.display(), record.id);
        explicit_path(path)
    } else if let Some(install) = record
        .engine
        .and_then(|preferred| installs.iter().find(|install| install.dialect() == preferred))
    {
        log::debug!("Using {} installation '{}'", install.dialect(), install.name);
        from_install(install)
    } else if let Some(install) =
        installs.iter().find(|install| install.default).or_else(|| installs.first())
    {
        if let Some(preferred) = record.engine {
            log::warn!(
                "No {preferred} installation for item '{}', falling back to '{}'",
                record.id,
                install.name
            );
        }
        from_install(install)
    } else {
        return Err(LaunchError::NoEmulator { item_id: record.id.clone() });
    };

    if !resolved.path.is_file() {
        return Err(LaunchError::EmulatorNotFound { path: resolved.path.display().to_string() });
    }

    log::info!("Resolved emulator '{}' ({})", resolved.path.display(), resolved.dialect);
    Ok(resolved)
}

/// Well-known reference config file names shipped with each build, in preference order.
#[must_use]
pub fn reference_candidates(dialect: Dialect) -> &'static [&'static str] {
    match dialect {
        Dialect::Standard => &["dosbox.conf"],
        Dialect::Staging => &["dosbox-staging.conf", "dosbox-staging.reference.conf"],
        Dialect::X => &["dosbox-x.reference.full.conf", "dosbox-x.reference.conf", "dosbox-x.conf"],
    }
}

/// Search an engine directory for a reference config of the given dialect.
///
/// Candidates are tried in preference order; for each candidate the shallowest match wins.
#[must_use]
pub fn find_reference(dialect: Dialect, engine_dir: &Path) -> Option<PathBuf> {
    let files: Vec<_> = WalkDir::new(engine_dir)
        .max_depth(REFERENCE_SEARCH_DEPTH)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .collect();

    reference_candidates(dialect).iter().find_map(|candidate| {
        files
            .iter()
            .filter(|entry| entry.file_name().to_string_lossy().eq_ignore_ascii_case(candidate))
            .min_by_key(|entry| entry.depth())
            .map(|entry| entry.path().to_path_buf())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn install_dialect_guess() {
        assert_eq!(Dialect::Staging, EngineInstall::new("DOSBox Staging 0.81", "/opt/a").dialect());
        assert_eq!(Dialect::X, EngineInstall::new("mine", "/opt/dosbox-x/dosbox-x").dialect());
        assert_eq!(Dialect::Standard, EngineInstall::new("DOSBox", "/usr/bin/dosbox").dialect());

        let mut install = EngineInstall::new("staging build", "/opt/a");
        install.dialect = Some(Dialect::X);
        assert_eq!(Dialect::X, install.dialect());
    }

    #[test]
    fn resolution_priority() {
        let dir = tempfile::tempdir().unwrap();
        let standard = dir.path().join("dosbox/dosbox");
        let staging = dir.path().join("staging/dosbox");
        let custom = dir.path().join("custom/dosbox-x");
        let manual = dir.path().join("manual/dosbox");
        for path in [&standard, &staging, &custom, &manual] {
            touch(path);
        }

        let installs = vec![
            EngineInstall::new("DOSBox", &standard),
            EngineInstall { default: true, ..EngineInstall::new("DOSBox Staging", &staging) },
        ];

        let mut record = ItemRecord::new("doom");
        let resolved = resolve_engine(None, &record, &installs).unwrap();
        assert_eq!(ResolvedEngine { path: staging.clone(), dialect: Dialect::Staging }, resolved);

        record.engine = Some(Dialect::Standard);
        let resolved = resolve_engine(None, &record, &installs).unwrap();
        assert_eq!(ResolvedEngine { path: standard.clone(), dialect: Dialect::Standard }, resolved);

        record.engine = Some(Dialect::X);
        assert_eq!(staging, resolve_engine(None, &record, &installs).unwrap().path);

        record.custom_dosbox_path = Some(custom.clone());
        let resolved = resolve_engine(None, &record, &installs).unwrap();
        assert_eq!(ResolvedEngine { path: custom, dialect: Dialect::X }, resolved);

        let resolved = resolve_engine(Some(&manual), &record, &installs).unwrap();
        assert_eq!(ResolvedEngine { path: manual, dialect: Dialect::X }, resolved);
    }

    #[test]
    fn explicit_path_uses_configured_install_dialect() {
        let dir = tempfile::tempdir().unwrap();
        let configured = dir.path().join("bin/dosbox");
        touch(&configured);

        let installs = vec![
            EngineInstall::new("DOSBox", dir.path().join("other/dosbox")),
            EngineInstall {
                dialect: Some(Dialect::Staging),
                ..EngineInstall::new("mine", &configured)
            },
        ];
        let expected = ResolvedEngine { path: configured.clone(), dialect: Dialect::Staging };

        let mut record = ItemRecord::new("doom");
        record.engine = Some(Dialect::Staging);
        assert_eq!(expected, resolve_engine(None, &record, &installs).unwrap());

        record.engine = Some(Dialect::X);
        assert_eq!(expected, resolve_engine(Some(&configured), &record, &installs).unwrap());

        let unnormalized = dir.path().join("bin/../bin/dosbox");
        let resolved = resolve_engine(Some(&unnormalized), &record, &installs).unwrap();
        assert_eq!(Dialect::Staging, resolved.dialect);

        record.custom_dosbox_path = Some(configured.clone());
        assert_eq!(expected, resolve_engine(None, &record, &installs).unwrap());
    }

    #[test]
    fn explicit_path_prefers_item_engine_over_path_text() {
        let dir = tempfile::tempdir().unwrap();
        let custom = dir.path().join("dosbox-x-games/dosbox");
        touch(&custom);

        let mut record = ItemRecord::new("doom");
        record.custom_dosbox_path = Some(custom.clone());
        assert_eq!(Dialect::X, resolve_engine(None, &record, &[]).unwrap().dialect);

        record.engine = Some(Dialect::Staging);
        let resolved = resolve_engine(None, &record, &[]).unwrap();
        assert_eq!(ResolvedEngine { path: custom, dialect: Dialect::Staging }, resolved);
    }

    #[test]
    fn resolution_errors() {
        let record = ItemRecord::new("doom");
        assert!(matches!(resolve_engine(None, &record, &[]), Err(LaunchError::NoEmulator { .. })));

        let installs = vec![EngineInstall::new("DOSBox", "/nonexistent/dosbox")];
        assert!(matches!(
            resolve_engine(None, &record, &installs),
            Err(LaunchError::EmulatorNotFound { .. })
        ));
    }

    #[test]
    fn reference_discovery() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("dosbox-x.conf"));
        touch(&root.join("share/doc/dosbox-x.reference.conf"));
        touch(&root.join("a/b/c/d/dosbox-x.reference.full.conf"));
        touch(&root.join("resources/dosbox-staging.conf"));
        touch(&root.join("DOSBox-Staging.conf"));

        assert_eq!(
            Some(root.join("share/doc/dosbox-x.reference.conf")),
            find_reference(Dialect::X, root)
        );
        assert_eq!(Some(root.join("DOSBox-Staging.conf")), find_reference(Dialect::Staging, root));
        assert_eq!(None, find_reference(Dialect::Standard, root));
    }
}
