//! Mirrored file destinations.
//!
//! Every write goes to two files. The destinations fail independently: a
//! missing directory, a locked file or a read-only volume on one side is
//! reported through `tracing` and otherwise ignored, and never prevents the
//! write to the other side. A side without a root has no file at all.

use std::fs::{self, OpenOptions};
use std::io::{Result as IoResult, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    Append,
    Rewrite,
}

/// A pair of files that receive identical content.
#[derive(Debug, Clone)]
pub(crate) struct MirroredFile {
    primary: Option<PathBuf>,
    secondary: Option<PathBuf>,
}

impl MirroredFile {
    pub(crate) fn new(primary: Option<PathBuf>, secondary: Option<PathBuf>) -> Self {
        Self { primary, secondary }
    }

    pub(crate) fn primary(&self) -> Option<&Path> {
        self.primary.as_deref()
    }

    pub(crate) fn secondary(&self) -> Option<&Path> {
        self.secondary.as_deref()
    }

    /// Appends `text` to both files.
    pub(crate) fn append(&self, text: &str) {
        self.write_both(text, WriteMode::Append);
    }

    /// Replaces the contents of both files with `text`.
    pub(crate) fn rewrite(&self, text: &str) {
        self.write_both(text, WriteMode::Rewrite);
    }

    /// Empties both files.
    pub(crate) fn truncate(&self) {
        self.write_both("", WriteMode::Rewrite);
    }

    fn write_both(&self, text: &str, mode: WriteMode) {
        for path in [&self.primary, &self.secondary].into_iter().flatten() {
            if let Err(err) = write_one(path, text, mode) {
                tracing::debug!(path = %path.display(), error = %err, ?mode, "journal destination write failed");
            }
        }
    }
}

fn write_one(path: &Path, text: &str, mode: WriteMode) -> IoResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut options = OpenOptions::new();
    options.create(true);
    match mode {
        WriteMode::Append => {
            options.append(true);
        }
        WriteMode::Rewrite => {
            options.write(true).truncate(true);
        }
    }

    let mut file = options.open(path)?;
    file.write_all(text.as_bytes())?;
    file.flush()
}
