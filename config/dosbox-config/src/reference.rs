//! Reference configs: the full default config shipped with each emulator build

use crate::{ConfigError, ConfigResult, Dialect, Document, Variant};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ReferenceConfig {
    pub dialect: Dialect,
    pub path: PathBuf,
    pub variant: Variant,
    pub document: Document,
}

impl ReferenceConfig {
    /// Read and parse a reference config. Invalid UTF-8 is replaced rather than rejected, since
    /// some builds ship configs with Latin-1 comments.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn load(dialect: Dialect, path: &Path) -> ConfigResult<Self> {
        let bytes = fs::read(path).map_err(|err| ConfigError::reference_read(path, err))?;
        let text = String::from_utf8_lossy(&bytes);

        Ok(Self::from_text(dialect, path.to_path_buf(), &text))
    }

    #[must_use]
    pub fn from_text(dialect: Dialect, path: PathBuf, text: &str) -> Self {
        let variant = Variant::detect(text);
        if let Some(detected) = variant.dialect
            && detected != dialect
        {
            log::warn!(
                "Reference config '{}' is used for {dialect} but its banner identifies {variant}",
                path.display()
            );
        }

        Self { dialect, path, variant, document: Document::parse(text) }
    }
}

/// Per-dialect cache of loaded reference configs.
///
/// Entries are never mutated once loaded; a dialect's entry is replaced only when it is requested
/// with a different path.
#[derive(Debug, Default)]
pub struct ReferenceCache {
    entries: HashMap<Dialect, Arc<ReferenceConfig>>,
}

impl ReferenceCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// Returns an error if the reference config needs to be loaded and cannot be read.
    pub fn get_or_load(
        &mut self,
        dialect: Dialect,
        path: &Path,
    ) -> ConfigResult<Arc<ReferenceConfig>> {
        if let Some(reference) = self.entries.get(&dialect)
            && reference.path == path
        {
            return Ok(Arc::clone(reference));
        }

        let reference = Arc::new(ReferenceConfig::load(dialect, path)?);
        log::info!(
            "Loaded {dialect} reference config '{}' ({})",
            path.display(),
            reference.variant
        );
        self.entries.insert(dialect, Arc::clone(&reference));

        Ok(reference)
    }

    #[must_use]
    pub fn get(&self, dialect: Dialect) -> Option<Arc<ReferenceConfig>> {
        self.entries.get(&dialect).map(Arc::clone)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
