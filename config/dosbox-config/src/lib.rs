//! Dialect-aware handling of DOSBox-style INI configuration files.
//!
//! The crate covers the data side of launching a program through one of several incompatible
//! DOSBox builds: an edit-preserving config [`Document`], detection of which build a reference
//! config belongs to, translation of setting names between builds, and generation of minimal
//! override files.

pub mod diff;
pub mod dialect;
pub mod document;
pub mod mapping;
pub mod reference;
pub mod sanitize;
pub mod settings;
pub mod variant;

pub use dialect::Dialect;
pub use diff::diff;
pub use document::Document;
pub use mapping::{Concept, ConfigKey, DialectTarget, MappingTable};
pub use reference::{ReferenceCache, ReferenceConfig};
pub use sanitize::{DropReason, DroppedKey, Sanitized, Sanitizer, Translation};
pub use settings::SettingsMap;
pub use variant::Variant;

use std::io;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading key mapping table '{path}': {source}")]
    MappingRead {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("Invalid key mapping table '{path}': {source}")]
    MappingParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("I/O error reading reference config '{path}': {source}")]
    ReferenceRead {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl ConfigError {
    fn mapping_read(path: &Path, source: io::Error) -> Self {
        Self::MappingRead { path: path.display().to_string(), source }
    }

    fn mapping_parse(path: &Path, source: serde_json::Error) -> Self {
        Self::MappingParse { path: path.display().to_string(), source }
    }

    fn reference_read(path: &Path, source: io::Error) -> Self {
        Self::ReferenceRead { path: path.display().to_string(), source }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
