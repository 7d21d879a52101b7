//! Launch planning: item record and request in, config layers and emulator command line out


use crate::autoexec::{AutoexecBuilder, AutoexecScript, ProgramLaunch};
use crate::config::LauncherConfig;
use crate::engine::{self, ResolvedEngine};
use crate::item::{self, EXTRA_SECTION, ExecutableRole, ItemRecord, LaunchTarget};
use crate::mount;
use crate::{LaunchError, LaunchResult};
use dosbox_config::{
    Dialect, Document, MappingTable, ReferenceCache, ReferenceConfig, Sanitized, Sanitizer,
    SettingsMap,
};
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const CONF_FLAG: &str = "-conf";
pub const FULLSCREEN_FLAG: &str = "-fullscreen";

/// What to launch and how.
#[derive(Debug, Clone, Default)]
pub struct LaunchRequest {
    pub target: LaunchTarget,
    /// Emulator executable overriding the item's and the configured engines
    pub engine_override: Option<PathBuf>,
    /// Whether the program runs in protected mode; detected from the item's files when `None`
    pub protected_mode: Option<bool>,
    pub fullscreen: bool,
    /// Close the emulator when the program returns; ignored for [`LaunchTarget::DosPrompt`]
    pub auto_exit: bool,
    /// Directory for screenshots and recordings
    pub capture_dir: Option<PathBuf>,
}

impl LaunchRequest {
    #[must_use]
    pub fn new(target: LaunchTarget) -> Self {
        Self { target, ..Self::default() }
    }
}

/// Everything needed to start one emulator session. Built fresh for every launch.
#[derive(Debug, Clone)]
pub struct LaunchPlan {
    pub item_id: String,
    pub emulator: PathBuf,
    pub dialect: Dialect,
    /// Reference config the overrides were computed against
    pub reference: PathBuf,
    /// The item's persistent reference config, loaded as the first layer when set
    pub reference_layer: Option<PathBuf>,
    /// Item root; the emulator runs here and relative mount paths resolve against it
    pub working_dir: PathBuf,
    pub sanitized: Sanitized,
    /// Minimal override layer
    pub overrides: Document,
    pub autoexec: AutoexecScript,
    /// Launched executable relative to the item root; `None` for the DOS prompt
    pub program: Option<String>,
    pub is_main: bool,
    pub fullscreen: bool,
}

/// Config layer files written for one launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerFiles {
    pub overrides: PathBuf,
    pub autoexec: PathBuf,
}

impl LayerFiles {
    /// Remove the layer files. Failures are logged, not returned.
    pub fn cleanup(&self) {
        remove_layer(&self.overrides);
        remove_layer(&self.autoexec);
    }
}

/// Remove one layer file, logging a failure. Returns whether the file was removed.
fn remove_layer(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(err) => {
            log::warn!("Unable to remove config layer '{}': {err}", path.display());
            false
        }
    }
}

impl LaunchPlan {
    /// Write the override and autoexec layers to uniquely named files in `dir`.
    ///
    /// Each file's content is computed up front and written in one pass before its path is
    /// handed out.
    ///
    /// # Errors
    ///
    /// Returns an error if `dir` cannot be created or a layer cannot be written.
    pub fn write_layers(&self, dir: &Path) -> LaunchResult<LayerFiles> {
        fs::create_dir_all(dir).map_err(|err| LaunchError::layer_write(dir, err))?;

        let overrides = write_layer(dir, &self.item_id, "overrides", &self.overrides.serialize())?;
        let autoexec = match write_layer(dir, &self.item_id, "autoexec", &self.autoexec.render()) {
            Ok(path) => path,
            Err(err) => {
                remove_layer(&overrides);
                return Err(err);
            }
        };

        log::debug!(
            "Wrote config layers '{}' and '{}'",
            overrides.display(),
            autoexec.display()
        );
        Ok(LayerFiles { overrides, autoexec })
    }
}

fn write_layer(dir: &Path, item_id: &str, kind: &str, contents: &str) -> LaunchResult<PathBuf> {
    let safe_id: String = item_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();

    let mut file = tempfile::Builder::new()
        .prefix(&format!("{safe_id}-{kind}-"))
        .suffix(".conf")
        .tempfile_in(dir)
        .map_err(|err| LaunchError::layer_write(dir, err))?;
    file.write_all(contents.as_bytes())
        .map_err(|err| LaunchError::layer_write(file.path(), err))?;

    let (_, path) = file.keep().map_err(|err| LaunchError::layer_write(dir, err.error))?;
    Ok(path)
}

/// Emulator command line: the executable, then `-conf` layers in load order (item reference,
/// overrides, autoexec), then `-fullscreen` if requested. The autoexec layer loads last.
#[must_use]
pub fn build_command_line(plan: &LaunchPlan, layers: &LayerFiles) -> Vec<OsString> {
    let mut command = vec![plan.emulator.clone().into_os_string()];

    let conf_layers = plan.reference_layer.iter().chain([&layers.overrides, &layers.autoexec]);
    for layer in conf_layers {
        command.push(CONF_FLAG.into());
        command.push(layer.clone().into_os_string());
    }

    if plan.fullscreen {
        command.push(FULLSCREEN_FLAG.into());
    }

    command
}

/// Session state shared across launches: launcher config, key mapping table and the
/// per-dialect reference config cache.
#[derive(Debug)]
pub struct LaunchContext {
    config: LauncherConfig,
    mapping: MappingTable,
    references: ReferenceCache,
}

impl LaunchContext {
    /// Create a context, loading the key mapping table named by the config.
    ///
    /// # Errors
    ///
    /// Returns an error if the mapping table exists but cannot be read or parsed.
    pub fn new(config: LauncherConfig) -> LaunchResult<Self> {
        let mapping = MappingTable::load(&config.mapping_table_path())?;
        Ok(Self::with_mapping(config, mapping))
    }

    #[must_use]
    pub fn with_mapping(config: LauncherConfig, mapping: MappingTable) -> Self {
        Self { config, mapping, references: ReferenceCache::new() }
    }

    #[must_use]
    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }

    #[must_use]
    pub fn mapping(&self) -> &MappingTable {
        &self.mapping
    }

    /// Build the launch plan for an item.
    ///
    /// # Errors
    ///
    /// Fails if no emulator or executable can be resolved, if no reference config exists for the
    /// emulator's dialect, or if the reference config cannot be read.
    pub fn plan(
        &mut self,
        record: &ItemRecord,
        request: &LaunchRequest,
    ) -> LaunchResult<LaunchPlan> {
        let item_root = self.config.item_root(&record.id);

        let engine = engine::resolve_engine(
            request.engine_override.as_deref(),
            record,
            &self.config.engines,
        )?;
        let program = resolve_program(record, &request.target, &item_root)?;
        let reference_layer = self.reference_layer(record);
        let reference = self.reference_for(record, &engine, reference_layer.as_deref())?;

        let protected_mode =
            request.protected_mode.unwrap_or_else(|| item::detect_protected_mode(&item_root));
        let settings = effective_settings(record, request.capture_dir.as_deref());
        let sanitized = Sanitizer::new(&self.mapping)
            .with_reference(&reference.document)
            .sanitize(&settings, engine.dialect, protected_mode);
        let overrides = dosbox_config::diff(&sanitized.settings, &reference.document);

        let mut autoexec = AutoexecBuilder::new(mount::effective_mounts(record, &item_root));
        if let Some(program) = &program {
            autoexec = autoexec
                .program(program.clone())
                .pre_commands(record.autoexec_pre.clone())
                .post_commands(record.autoexec_post.clone())
                .auto_exit(request.auto_exit);
        }

        log::info!(
            "Planned launch of '{}' with {} ({} override(s), {} translated, {} dropped)",
            record.id,
            engine.dialect,
            sanitized.settings.len(),
            sanitized.translated.len(),
            sanitized.dropped.len()
        );

        Ok(LaunchPlan {
            item_id: record.id.clone(),
            emulator: engine.path,
            dialect: engine.dialect,
            reference: reference.path.clone(),
            reference_layer,
            working_dir: item_root,
            sanitized,
            overrides,
            autoexec: autoexec.build(),
            is_main: program.as_ref().is_some_and(|program| program.is_main),
            program: program.map(|program| program.path),
            fullscreen: request.fullscreen,
        })
    }

    /// The item's own reference config, if set and present on disk.
    fn reference_layer(&self, record: &ItemRecord) -> Option<PathBuf> {
        let path = self.config.resolve(record.reference_conf.as_deref()?);
        if path.is_file() {
            Some(path)
        } else {
            log::warn!(
                "Reference config '{}' of item '{}' does not exist",
                path.display(),
                record.id
            );
            None
        }
    }

    /// Reference config for diffing: the item's own, then the configured one for the dialect,
    /// then one discovered next to the emulator.
    fn reference_for(
        &mut self,
        record: &ItemRecord,
        engine: &ResolvedEngine,
        reference_layer: Option<&Path>,
    ) -> LaunchResult<Arc<ReferenceConfig>> {
        let path = reference_layer
            .map(Path::to_path_buf)
            .or_else(|| self.config.reference_config(engine.dialect).filter(|path| path.is_file()))
            .or_else(|| engine::find_reference(engine.dialect, engine.dir()))
            .ok_or_else(|| LaunchError::MissingReference {
                item_id: record.id.clone(),
                dialect: engine.dialect,
            })?;

        Ok(self.references.get_or_load(engine.dialect, &path)?)
    }
}

fn resolve_program(
    record: &ItemRecord,
    target: &LaunchTarget,
    item_root: &Path,
) -> LaunchResult<Option<ProgramLaunch>> {
    let tweaks = record.tweaks();

    match target {
        LaunchTarget::DosPrompt => Ok(None),
        LaunchTarget::Main => match record.main_candidates().as_slice() {
            [] => Err(LaunchError::NoMainExecutable { item_id: record.id.clone() }),
            [path] => {
                let info = &record.executables[*path];
                Ok(Some(ProgramLaunch {
                    path: (*path).into(),
                    params: info.params.clone(),
                    tweaks,
                    is_main: true,
                }))
            }
            candidates => Err(LaunchError::AmbiguousMainExecutable {
                item_id: record.id.clone(),
                candidates: candidates.iter().map(|&path| path.into()).collect(),
            }),
        },
        LaunchTarget::Specific(path) => {
            if let Some((path, info)) = record.executable(path) {
                return Ok(Some(ProgramLaunch {
                    path: path.into(),
                    params: info.params.clone(),
                    tweaks,
                    is_main: info.role == ExecutableRole::Main,
                }));
            }

            if item_root.join(path).is_file() {
                return Ok(Some(ProgramLaunch { tweaks, ..ProgramLaunch::new(path.clone()) }));
            }

            Err(LaunchError::UnknownExecutable { item_id: record.id.clone(), path: path.clone() })
        }
    }
}

/// The item's overrides without launcher-only settings, plus the capture directory under every
/// spelling the dialects use. The sanitizer keeps only the spelling valid for the target dialect.
fn effective_settings(record: &ItemRecord, capture_dir: Option<&Path>) -> SettingsMap {
    let mut settings = record.settings.clone();
    settings.remove_section(EXTRA_SECTION);

    if let Some(capture_dir) = capture_dir {
        let capture_dir = capture_dir.display().to_string();
        settings.insert("dosbox", "captures", capture_dir.clone());
        settings.insert("capture", "capture_dir", capture_dir);
    }

    settings
}
