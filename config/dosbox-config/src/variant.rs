//! Classification of reference configs by the banner comment at the top of the file

use crate::Dialect;
use regex::Regex;
use std::fmt::{Display, Formatter};
use std::sync::LazyLock;

/// Number of leading lines inspected for a version banner.
pub const BANNER_LINES: usize = 15;

/// Emulator build detected from a reference config banner.
///
/// Detection failure is not an error; an undetected variant reports `unknown` for both fields and
/// callers fall back to [`Dialect::Standard`] behavior.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Variant {
    pub dialect: Option<Dialect>,
    pub version: Option<String>,
}

impl Variant {
    pub const UNKNOWN: Self = Self { dialect: None, version: None };

    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.dialect.is_none() && self.version.is_none()
    }

    #[must_use]
    pub fn dialect_or_default(&self) -> Dialect {
        self.dialect.unwrap_or_default()
    }

    /// Detect the variant from the full text of a config file. Only the first
    /// [`BANNER_LINES`] lines are examined.
    #[must_use]
    pub fn detect(text: &str) -> Self {
        static DIRECT_RE: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"(?i)dosbox\s*-?\s*([a-z0-9_ \t]*?)\s+(\d+(?:\.\d+)+)").unwrap()
        });
        static PAREN_RE: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"(?i)dosbox\s*-?\s*([^(\n]*?)\s*\((\d+(?:\.\d+)+)\)").unwrap()
        });

        for line in text.lines().take(BANNER_LINES) {
            if !line.to_ascii_lowercase().contains("dosbox") {
                continue;
            }

            let Some(captures) = DIRECT_RE.captures(line).or_else(|| PAREN_RE.captures(line))
            else {
                continue;
            };

            let word = captures.get(1).map_or("", |m| m.as_str());
            let version = captures[2].to_string();
            let dialect = dialect_from_word(word);
            if dialect.is_none() {
                log::warn!("Unrecognized DOSBox fork '{}' in config banner: '{line}'", word.trim());
            }

            log::debug!("Detected config variant {dialect:?} {version} from '{line}'");
            return Self { dialect, version: Some(version) };
        }

        if text.lines().take(BANNER_LINES).any(|line| line.contains("DOSBox 0.74")) {
            return Self { dialect: Some(Dialect::Standard), version: Some("0.74".into()) };
        }

        log::debug!("No version banner found in config text");
        Self::UNKNOWN
    }
}

fn dialect_from_word(word: &str) -> Option<Dialect> {
    let word = word.trim().to_ascii_lowercase();
    if word.is_empty() {
        Some(Dialect::Standard)
    } else if word.starts_with("staging") {
        Some(Dialect::Staging)
    } else if word.starts_with('x') {
        Some(Dialect::X)
    } else {
        None
    }
}

impl Display for Variant {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let dialect = self.dialect.map_or("unknown", Dialect::tag);
        let version = self.version.as_deref().unwrap_or("unknown");
        write!(f, "{dialect} {version}")
    }
}
