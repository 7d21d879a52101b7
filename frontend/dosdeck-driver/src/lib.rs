//! Launch pipeline for DOS programs run through an external DOSBox build.
//!
//! [`LaunchContext::plan`] turns an [`ItemRecord`] and a [`LaunchRequest`] into a [`LaunchPlan`]:
//! dialect-correct minimal overrides, an autoexec script, and the layered emulator command line.
//! [`process::spawn_monitored`] runs the resulting command on a background thread.

pub mod autoexec;
pub mod config;
pub mod engine;
pub mod item;
pub mod mount;
pub mod planner;
pub mod process;
pub mod store;

pub use autoexec::{AutoexecBuilder, AutoexecScript, ProgramLaunch};
pub use config::{LauncherConfig, ReferencePaths};
pub use engine::{EngineInstall, ResolvedEngine};
pub use item::{ExecutableInfo, ExecutableRole, ItemRecord, LaunchTarget, LaunchTweaks};
pub use mount::{MountKind, MountSpec};
pub use planner::{LaunchContext, LaunchPlan, LaunchRequest, LayerFiles, build_command_line};
pub use process::{LaunchOutcome, LaunchState, LaunchStatus, MonitorHandle};
pub use store::{ItemStore, JsonItemStore, StoreError};

use dosbox_config::{ConfigError, Dialect};
use std::io;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("No reference config available for {dialect} (item '{item_id}')")]
    MissingReference { item_id: String, dialect: Dialect },
    #[error("No emulator configured for item '{item_id}'; set a default engine installation")]
    NoEmulator { item_id: String },
    #[error("Emulator executable not found at '{path}'")]
    EmulatorNotFound { path: String },
    #[error("Item '{item_id}' has no main executable")]
    NoMainExecutable { item_id: String },
    #[error("Item '{item_id}' has more than one main executable: {}", candidates.join(", "))]
    AmbiguousMainExecutable { item_id: String, candidates: Vec<String> },
    #[error("Executable '{path}' is not listed for item '{item_id}'")]
    UnknownExecutable { item_id: String, path: String },
    #[error("Error writing config layer to '{path}': {source}")]
    LayerWrite {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("Error launching emulator '{path}': {source}")]
    Spawn {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("{0}")]
    Config(#[from] ConfigError),
}

impl LaunchError {
    pub(crate) fn layer_write(path: &Path, source: io::Error) -> Self {
        Self::LayerWrite { path: path.display().to_string(), source }
    }

    pub(crate) fn spawn(path: &Path, source: io::Error) -> Self {
        Self::Spawn { path: path.display().to_string(), source }
    }
}

pub type LaunchResult<T> = Result<T, LaunchError>;
