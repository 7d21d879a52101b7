use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// One of the mutually incompatible configuration vocabularies understood by different DOSBox
/// builds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Upstream DOSBox (0.74 and compatible forks)
    #[default]
    #[serde(alias = "dosbox", alias = "dosbox-standard", alias = "original")]
    Standard,
    /// DOSBox Staging
    #[serde(alias = "dosbox-staging")]
    Staging,
    /// DOSBox-X
    #[serde(alias = "dosbox-x")]
    X,
}

impl Dialect {
    pub const ALL: [Self; 3] = [Self::Standard, Self::Staging, Self::X];

    /// Tag used for this dialect in key mapping tables.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Staging => "staging",
            Self::X => "x",
        }
    }

    /// Parse a dialect tag. Accepts the short mapping table tags as well as the engine names used
    /// in installation lists (`dosbox-staging`, `dosbox-x`, `dosbox`).
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "standard" | "original" | "dosbox" | "dosbox-standard" => Some(Self::Standard),
            "staging" | "dosbox-staging" => Some(Self::Staging),
            "x" | "dosbox-x" => Some(Self::X),
            _ => None,
        }
    }

    /// Guess a dialect from a free-form name such as an installation label or a file path.
    ///
    /// Returns `None` when nothing in the name identifies a fork; callers usually treat that as
    /// [`Dialect::Standard`].
    #[must_use]
    pub fn guess_from_name(name: &str) -> Option<Self> {
        let name = name.to_ascii_lowercase();
        if name.contains("staging") {
            Some(Self::Staging)
        } else if name.contains("dosbox-x") || name.contains("dosbox_x") {
            Some(Self::X)
        } else {
            None
        }
    }
}

impl Display for Dialect {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_tag(s).ok_or_else(|| format!("Invalid dialect string: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip() {
        for dialect in Dialect::ALL {
            assert_eq!(Some(dialect), Dialect::from_tag(dialect.tag()));
            assert_eq!(Ok(dialect), dialect.to_string().parse());
        }
    }

    #[test]
    fn engine_names() {
        assert_eq!(Some(Dialect::Staging), Dialect::from_tag("DOSBox-Staging"));
        assert_eq!(Some(Dialect::X), Dialect::from_tag("dosbox-x"));
        assert_eq!(None, Dialect::from_tag("dosbox-ece"));
    }

    #[test]
    fn deserialize_engine_names() {
        let dialects: Vec<Dialect> =
            serde_json::from_str(r#"["dosbox-staging", "x", "dosbox", "standard"]"#).unwrap();
        assert_eq!(
            vec![Dialect::Staging, Dialect::X, Dialect::Standard, Dialect::Standard],
            dialects
        );
        assert_eq!("\"staging\"", serde_json::to_string(&Dialect::Staging).unwrap());
    }

    #[test]
    fn guess_from_paths() {
        assert_eq!(
            Some(Dialect::Staging),
            Dialect::guess_from_name("C:/Emu/DOSBox Staging/dosbox.exe")
        );
        assert_eq!(Some(Dialect::X), Dialect::guess_from_name("/opt/dosbox-x/dosbox-x"));
        assert_eq!(Some(Dialect::X), Dialect::guess_from_name("refs/DOSBOX_X.conf"));
        assert_eq!(None, Dialect::guess_from_name("/usr/bin/dosbox"));
    }
}
