//! Step-by-step composition from pre-authored MIDI fragments.
//!
//! A piece is a grid of fragments: for every step (section) and every line
//! (voice) a handful of candidate fragments. The [`Composer`] walks the grid
//! one `(step, line)` slot at a time, committing one candidate per slot,
//! and can render the whole piece at any point as a format 1 MIDI file with
//! one track per line.
//!
//! ```no_run
//! use std::sync::Arc;
//! use quodlibet::{Catalog, Composer, CompositionConfig};
//!
//! # fn main() -> quodlibet::Result<()> {
//! let dir = std::path::Path::new("pieces/canon");
//! let catalog = Arc::new(Catalog::load_dir(dir)?);
//! let config = CompositionConfig::load(&dir.join("composition.toml"))?;
//!
//! let mut composer = Composer::new(config, catalog)?;
//! while !composer.has_ended() {
//!     let first = composer.options_for_cursor()[0].clone();
//!     composer.apply_choice(first)?;
//! }
//! let export = composer.export()?;
//! std::fs::write(export.file_name(), &export.bytes).ok();
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod composer;
pub mod composition;
pub mod config;

pub use catalog::{Catalog, LineSource, OptionSource, StepSource};
pub use composer::Composer;
pub use composition::{Choice, Composition, CompositionSpectra, Export, Line, LineSpectrum};
pub use config::{CompositionConfig, Mode};

use std::path::PathBuf;
use thiserror::Error;

/// Errors from loading a piece or driving a composition.
///
/// A failed operation leaves the composer exactly as it was.
#[derive(Debug, Error)]
pub enum ComposeError {
    #[error(transparent)]
    Format(#[from] midifile::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid state: {0}")]
    State(String),

    #[error("invalid composition config: {0}")]
    Config(String),

    #[error("failed to decode {path}: {source}")]
    Fragment {
        path: PathBuf,
        source: midifile::Error,
    },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ComposeError>;
