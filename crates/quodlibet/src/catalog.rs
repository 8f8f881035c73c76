//! The fragment grid of a piece, read once and shared read-only.
//!
//! On disk a piece is a directory tree:
//!
//! ```text
//! <piece>/
//!   composition.toml
//!   01-intro/            step
//!     melody/            line
//!       a.mid            option
//!       b.mid
//!     bass/
//!       a.mid
//!   02-verse/
//!     ...
//! ```
//!
//! Each level is ordered by name.

use crate::{ComposeError, Result};
use midifile::Smf;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    pub steps: Vec<StepSource>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepSource {
    pub name: String,
    pub lines: Vec<LineSource>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineSource {
    pub name: String,
    pub options: Vec<OptionSource>,
}

/// A decoded fragment and the file name it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionSource {
    pub name: String,
    pub smf: Smf,
}

impl Catalog {
    pub fn new(steps: Vec<StepSource>) -> Self {
        Self { steps }
    }

    /// Read a piece directory. Every fragment is decoded up front; the first
    /// unreadable or malformed file fails the whole load.
    pub fn load_dir(root: &Path) -> Result<Self> {
        std::fs::metadata(root).map_err(|source| ComposeError::Io {
            path: root.to_path_buf(),
            source,
        })?;

        let mut steps = Vec::new();
        for step_dir in entries(root, EntryKind::Dir)? {
            let mut lines = Vec::new();
            for line_dir in entries(&step_dir, EntryKind::Dir)? {
                let mut options = Vec::new();
                for file in entries(&line_dir, EntryKind::MidiFile)? {
                    let bytes = std::fs::read(&file).map_err(|source| ComposeError::Io {
                        path: file.clone(),
                        source,
                    })?;
                    let smf = midifile::decode(&bytes).map_err(|source| {
                        ComposeError::Fragment {
                            path: file.clone(),
                            source,
                        }
                    })?;
                    options.push(OptionSource {
                        name: file_name(&file),
                        smf,
                    });
                }
                lines.push(LineSource {
                    name: file_name(&line_dir),
                    options,
                });
            }
            steps.push(StepSource {
                name: file_name(&step_dir),
                lines,
            });
        }

        let catalog = Self::new(steps);
        debug!(
            root = %root.display(),
            steps = catalog.step_count(),
            fragments = catalog.fragment_count(),
            "loaded catalog"
        );
        Ok(catalog)
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn fragment_count(&self) -> usize {
        self.steps
            .iter()
            .flat_map(|s| &s.lines)
            .map(|l| l.options.len())
            .sum()
    }

    /// Look up a fragment by its position and file name.
    pub fn option(&self, step: usize, line: usize, name: &str) -> Option<&OptionSource> {
        self.steps
            .get(step)?
            .lines
            .get(line)?
            .options
            .iter()
            .find(|o| o.name == name)
    }
}

#[derive(Clone, Copy, PartialEq)]
enum EntryKind {
    Dir,
    MidiFile,
}

/// Direct children of `dir` of one kind, sorted by name. Hidden entries are
/// skipped.
fn entries(dir: &Path, kind: EntryKind) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| ComposeError::Io {
            path: dir.to_path_buf(),
            source: e.into(),
        })?;

        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }

        let wanted = match kind {
            EntryKind::Dir => entry.file_type().is_dir(),
            EntryKind::MidiFile => {
                entry.file_type().is_file()
                    && entry.path().extension().is_some_and(|ext| {
                        ext.eq_ignore_ascii_case("mid") || ext.eq_ignore_ascii_case("midi")
                    })
            }
        };
        if wanted {
            found.push(entry.into_path());
        }
    }

    Ok(found)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
