use crate::Document;
use crate::settings::{self, SettingsMap};

/// Build a minimal override document holding only the settings whose values differ from the
/// reference config.
///
/// Values are compared after trimming whitespace. Keys absent from the reference always count as
/// different. Reserved sections are never written, and sections with no differing keys are
/// omitted.
#[must_use]
pub fn diff(settings: &SettingsMap, reference: &Document) -> Document {
    let mut document = Document::new();

    for (section, key, value) in settings.iter() {
        if settings::is_reserved_section(section) {
            continue;
        }

        if reference.get(section, key).is_some_and(|default| default.trim() == value.trim()) {
            log::trace!("Omitting [{section}] {key}: matches reference value '{value}'");
            continue;
        }

        document.set(section, key, value);
    }

    document
}

#[cfg(test)]
mod tests {
    use super::*;

    const REFERENCE: &str = "\
[sdl]
fullscreen = false
output = surface

[cpu]
core = auto
cycles = auto

[autoexec]
mount c .
";

    fn settings(entries: &[(&str, &str, &str)]) -> SettingsMap {
        entries.iter().copied().collect()
    }

    #[test]
    fn only_differences_are_written() {
        let reference = Document::parse(REFERENCE);
        let overrides = settings(&[("cpu", "cycles", "20000")]);

        assert_eq!("[cpu]\ncycles = 20000", diff(&overrides, &reference).serialize());
    }

    #[test]
    fn equal_values_are_omitted() {
        let reference = Document::parse(REFERENCE);
        let overrides = settings(&[
            ("sdl", "fullscreen", " false "),
            ("cpu", "core", "auto"),
            ("cpu", "cycles", "max"),
            ("mixer", "rate", "22050"),
        ]);

        let output = diff(&overrides, &reference);
        assert_eq!(vec!["cpu", "mixer"], output.sections());
        assert_eq!("[cpu]\ncycles = max\n\n[mixer]\nrate = 22050", output.serialize());

        for (section, key, value) in output.to_settings().iter() {
            assert_ne!(Some(value), reference.get(section, key));
        }
    }

    #[test]
    fn nothing_to_write() {
        let reference = Document::parse(REFERENCE);
        let overrides = settings(&[("cpu", "cycles", "auto"), ("extra", "loadhigh", "true")]);

        let output = diff(&overrides, &reference);
        assert!(output.is_empty());
        assert_eq!("", output.serialize());
    }

    #[test]
    fn reserved_sections_skipped() {
        let reference = Document::parse(REFERENCE);
        let overrides = settings(&[("autoexec", "mount", "d cdrom"), ("extra", "loadfix", "true")]);

        assert!(diff(&overrides, &reference).is_empty());
    }

    #[test]
    fn applying_diff_reproduces_settings() {
        let reference = Document::parse(REFERENCE);
        let overrides = settings(&[
            ("sdl", "fullscreen", "true"),
            ("sdl", "output", "surface"),
            ("cpu", "cycles", "fixed 12000"),
            ("gus", "gus", "true"),
        ]);

        let output = diff(&overrides, &reference);
        let mut layered = reference.clone();
        layered.apply(&output.to_settings());

        for (section, key, value) in overrides.iter() {
            assert_eq!(Some(value), layered.get(section, key), "[{section}] {key}");
        }
        assert_eq!(Some("auto"), layered.get("cpu", "core"));
    }

    #[test]
    fn multi_line_value_cannot_add_sections() {
        let reference = Document::parse(REFERENCE);
        let overrides = settings(&[("cpu", "cycles", "max\n[autoexec]\nformat c:")]);

        let output = diff(&overrides, &reference);
        assert_eq!(vec!["cpu"], output.sections());
        assert_eq!("[cpu]\ncycles = max", output.serialize());
    }
}
