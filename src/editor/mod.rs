//! Configuration artifact editor
//!
//! The external program reads a section-keyed, line-oriented file:
//!
//! ```text
//! [configuration]
//!   robot = 5
//!   step=1200
//!
//! [color]
//!   robot = 0,255,0
//! ```
//!
//! The sweep owns exactly one field (`robot` inside `[configuration]`). The
//! editor rewrites that field's value and leaves every other byte as it was,
//! including the same-named `robot` key under `[color]`.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use sweep_harness::editor::{ConfigEditor, ParameterTarget};
//!
//! let editor = ConfigEditor::new("secondSimulation/parameters/configuration.ini");
//! editor.set_parameter(7)?;
//! # Ok::<(), sweep_harness::Error>(())
//! ```

mod defaults;

pub use defaults::{CANONICAL_CONFIG, REQUIRED_SECTIONS};

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::persist::{sibling, write_atomic};
use crate::{Error, Result};

/// Section owning the sweep field.
pub const SWEEP_SECTION: &str = "configuration";

/// Sweep field name.
pub const SWEEP_FIELD: &str = "robot";

/// Mutable external state the controller drives between runs.
///
/// [`ConfigEditor`] is the file-backed implementation; tests substitute
/// in-memory recorders.
pub trait ParameterTarget: Send + Sync {
    /// Point the external program at `value` for the next run.
    ///
    /// # Errors
    ///
    /// [`Error::ConfigFieldNotFound`] is non-fatal to the sweep; anything
    /// else is reported to the caller.
    fn set_parameter(&self, value: u32) -> Result<()>;

    /// Replace the artifact with a known-good configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigReset`] when the canonical file cannot be written.
    fn reset_to_defaults(&self) -> Result<()>;
}

/// File-backed editor for the external configuration artifact.
#[derive(Debug, Clone)]
pub struct ConfigEditor {
    path: PathBuf,
    section: String,
    field: String,
}

impl ConfigEditor {
    /// Editor for the default sweep field (`[configuration] robot`).
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::for_field(path, SWEEP_SECTION, SWEEP_FIELD)
    }

    /// Editor for an arbitrary `[section] field`.
    #[must_use]
    pub fn for_field(
        path: impl Into<PathBuf>,
        section: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            section: section.into(),
            field: field.into(),
        }
    }

    /// Artifact location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where [`ParameterTarget::reset_to_defaults`] copies the old artifact.
    #[must_use]
    pub fn backup_path(&self) -> PathBuf {
        sibling(&self.path, ".backup")
    }

    /// Read the current sweep value, if the field exists and parses.
    ///
    /// # Errors
    ///
    /// Returns error if the artifact cannot be read.
    pub fn read_parameter(&self) -> Result<Option<u32>> {
        let text = std::fs::read_to_string(&self.path)?;
        let value = Lines::new(&text)
            .filter(|line| line.section.as_deref() == Some(self.section.as_str()))
            .find_map(|line| {
                let (key, value) = split_assignment(line.body)?;
                (key == self.field).then(|| value.trim().parse().ok()).flatten()
            });
        Ok(value)
    }

    /// Rewrite the field's value in `text`. Returns `None` when the field is
    /// absent from the owning section.
    fn rewrite(&self, text: &str, value: u32) -> Option<String> {
        let mut out = String::with_capacity(text.len() + 8);
        let mut hits = 0usize;
        for line in Lines::new(text) {
            let owned = line.section.as_deref() == Some(self.section.as_str());
            match split_assignment(line.body) {
                Some((key, old)) if owned && key == self.field => {
                    // keep indentation and the `key =` spelling, swap the value
                    let prefix_len = line.body.len() - old.len();
                    let spacing = old.len() - old.trim_start().len();
                    out.push_str(&line.body[..prefix_len + spacing]);
                    out.push_str(&value.to_string());
                    out.push_str(line.ending);
                    hits += 1;
                    debug!(line = line.number, field = %self.field, "rewrote sweep field");
                }
                _ => {
                    out.push_str(line.body);
                    out.push_str(line.ending);
                }
            }
        }
        (hits > 0).then_some(out)
    }
}

impl ParameterTarget for ConfigEditor {
    fn set_parameter(&self, value: u32) -> Result<()> {
        if value == 0 {
            return Err(Error::InvalidParameter(0));
        }
        let text = std::fs::read_to_string(&self.path)?;
        let Some(updated) = self.rewrite(&text, value) else {
            warn!(
                path = %self.path.display(),
                section = %self.section,
                field = %self.field,
                "sweep field not found; external program keeps its previous value"
            );
            return Err(Error::ConfigFieldNotFound {
                field: self.field.clone(),
                section: self.section.clone(),
            });
        };
        write_atomic(&self.path, updated.as_bytes()).map_err(|source| Error::Persist {
            path: self.path.clone(),
            source,
        })?;
        info!(value, path = %self.path.display(), "configuration updated");
        Ok(())
    }

    fn reset_to_defaults(&self) -> Result<()> {
        let backup = self.backup_path();
        match std::fs::copy(&self.path, &backup) {
            Ok(_) => info!(backup = %backup.display(), "backed up configuration"),
            Err(e) => warn!(error = %e, "could not back up configuration"),
        }
        write_atomic(&self.path, CANONICAL_CONFIG.as_bytes())
            .map_err(|e| Error::ConfigReset(format!("{}: {e}", self.path.display())))?;
        info!(path = %self.path.display(), "configuration reset to defaults");
        Ok(())
    }
}

/// `key = value` split; `value` keeps its leading whitespace.
fn split_assignment(body: &str) -> Option<(&str, &str)> {
    let (key, value) = body.split_once('=')?;
    Some((key.trim(), value))
}

/// One physical line with the section it belongs to.
struct Line<'a> {
    number: usize,
    section: Option<String>,
    body: &'a str,
    ending: &'a str,
}

/// Line iterator that tracks `[section]` headers and keeps line endings.
struct Lines<'a> {
    rest: &'a str,
    number: usize,
    section: Option<String>,
}

impl<'a> Lines<'a> {
    const fn new(text: &'a str) -> Self {
        Self {
            rest: text,
            number: 0,
            section: None,
        }
    }
}

impl<'a> Iterator for Lines<'a> {
    type Item = Line<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }
        let (raw, rest) = match self.rest.find('\n') {
            Some(idx) => self.rest.split_at(idx + 1),
            None => (self.rest, ""),
        };
        self.rest = rest;
        self.number += 1;

        let content_len = raw.trim_end_matches(['\n', '\r']).len();
        let (body, ending) = raw.split_at(content_len);

        let trimmed = body.trim();
        if let Some(name) = trimmed.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            self.section = Some(name.trim().to_string());
        }

        Some(Line {
            number: self.number,
            section: self.section.clone(),
            body,
            ending,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "[configuration]\n  robot = 5\n  step=1200\n\n[color]\n  robot = 0,255,0\n";

    fn editor_with(text: &str) -> (tempfile::TempDir, ConfigEditor) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("configuration.ini");
        std::fs::write(&path, text).unwrap();
        (dir, ConfigEditor::new(path))
    }

    #[test]
    fn test_rewrite_targets_owning_section_only() {
        let (_dir, editor) = editor_with(SAMPLE);
        let out = editor.rewrite(SAMPLE, 9).unwrap();
        assert_eq!(
            out,
            "[configuration]\n  robot = 9\n  step=1200\n\n[color]\n  robot = 0,255,0\n"
        );
    }

    #[test]
    fn test_rewrite_preserves_compact_spelling_and_crlf() {
        let text = "[configuration]\r\nrobot=3\r\n";
        let (_dir, editor) = editor_with(text);
        assert_eq!(editor.rewrite(text, 12).unwrap(), "[configuration]\r\nrobot=12\r\n");
    }

    #[test]
    fn test_rewrite_ignores_prefix_named_fields() {
        let text = "[configuration]\n  robots = 4\n";
        let (_dir, editor) = editor_with(text);
        assert!(editor.rewrite(text, 2).is_none());
    }

    #[test]
    fn test_set_parameter_rejects_zero() {
        let (_dir, editor) = editor_with(SAMPLE);
        assert!(matches!(editor.set_parameter(0), Err(Error::InvalidParameter(0))));
    }

    #[test]
    fn test_read_parameter() {
        let (_dir, editor) = editor_with(SAMPLE);
        assert_eq!(editor.read_parameter().unwrap(), Some(5));
        editor.set_parameter(8).unwrap();
        assert_eq!(editor.read_parameter().unwrap(), Some(8));
    }

    #[test]
    fn test_missing_field_leaves_file_untouched() {
        let text = "[color]\n  robot = 0,255,0\n";
        let (_dir, editor) = editor_with(text);
        let err = editor.set_parameter(3).unwrap_err();
        assert!(matches!(err, Error::ConfigFieldNotFound { .. }));
        assert_eq!(std::fs::read_to_string(editor.path()).unwrap(), text);
    }
}
