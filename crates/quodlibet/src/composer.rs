//! The composition state machine.
//!
//! The cursor `(step, line)` starts at `(0, 0)` and visits every line of a
//! step before moving to the next step. Committing a choice advances it,
//! undoing retreats it. Global settings (key, tempo, volumes) only change
//! values; they take effect on the next rebuild. Any change to committed
//! state drops the whole-piece document until [`Composer::rebuild_whole`]
//! runs again.

use crate::catalog::Catalog;
use crate::composition::{Choice, Composition, CompositionSpectra, Export, Line, LineSpectrum};
use crate::config::CompositionConfig;
use crate::{ComposeError, Result};
use midifile::{concat_parallel, encode, Smf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug)]
pub struct Composer {
    config: CompositionConfig,
    catalog: Arc<Catalog>,
    /// Prepared candidates, indexed `[step][line][option]`.
    candidates: Vec<Vec<Vec<Choice>>>,
    composition: Composition,
    step_index: usize,
    line_index: usize,
}

impl Composer {
    /// Validate `config` against `catalog` and prepare every candidate:
    /// each fragment is copied and cut to its step's length.
    pub fn new(config: CompositionConfig, catalog: Arc<Catalog>) -> Result<Self> {
        config.validate()?;
        config.check_catalog(&catalog)?;

        let mut candidates = Vec::with_capacity(config.steps.len());
        for (s, step) in config.steps.iter().enumerate() {
            let mut lines = Vec::with_capacity(step.lines.len());
            for (l, line) in step.lines.iter().enumerate() {
                let mut options = Vec::with_capacity(line.options.len());
                for option in &line.options {
                    let source = catalog.option(s, l, &option.file).ok_or_else(|| {
                        ComposeError::Config(format!("step {s} line {l} has no {:?}", option.file))
                    })?;

                    let mut smf = source.smf.clone();
                    let ticks_per_quarter =
                        smf.ticks_per_quarter().unwrap_or(config.ticks_per_quarter);
                    smf.truncate(step.quarter_notes as u64 * ticks_per_quarter as u64);

                    options.push(Choice::new(
                        option.file.clone(),
                        smf,
                        option.instrument,
                        option.instruments.clone(),
                    ));
                }
                lines.push(options);
            }
            candidates.push(lines);
        }

        let lines = config
            .lines
            .iter()
            .enumerate()
            .map(|(i, line)| Line::new(line.name.clone(), i, line.volume))
            .collect();

        let composition = Composition {
            id: Uuid::new_v4(),
            lines,
            key_signature: config.key_signature.default,
            tempo_bpm: config.tempo.default,
            time_signature: config.time_signature,
            mode: config.mode,
            smf: None,
        };

        debug!(
            id = %composition.id,
            steps = config.steps.len(),
            lines = config.lines.len(),
            "prepared composition"
        );

        Ok(Self {
            config,
            catalog,
            candidates,
            composition,
            step_index: 0,
            line_index: 0,
        })
    }

    pub fn config(&self) -> &CompositionConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn composition(&self) -> &Composition {
        &self.composition
    }

    /// `(step_index, line_index)`.
    pub fn cursor(&self) -> (usize, usize) {
        (self.step_index, self.line_index)
    }

    pub fn step_count(&self) -> usize {
        self.candidates.len()
    }

    pub fn line_count(&self) -> usize {
        self.composition.lines.len()
    }

    /// Candidates for the slot under the cursor. Empty once the piece has ended.
    pub fn options_for_cursor(&self) -> &[Choice] {
        self.candidates
            .get(self.step_index)
            .and_then(|lines| lines.get(self.line_index))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Commit `choice` to the line under the cursor and move on.
    ///
    /// `choice` must be one of [`Self::options_for_cursor`], possibly with a
    /// different allowed instrument. The line is re-rendered first; if that
    /// fails nothing is committed.
    pub fn apply_choice(&mut self, choice: Choice) -> Result<()> {
        if self.has_ended() {
            warn!(file = %choice.file_name, "choice rejected, composition has ended");
            return Err(ComposeError::State(
                "the composition has ended, no slot left to fill".to_string(),
            ));
        }

        if !self.options_for_cursor().iter().any(|c| c.id == choice.id) {
            warn!(
                file = %choice.file_name,
                step = self.step_index,
                line = self.line_index,
                "choice rejected, not a candidate here"
            );
            return Err(ComposeError::InvalidArgument(format!(
                "{} is not a candidate for step {} line {}",
                choice.file_name, self.step_index, self.line_index
            )));
        }
        if !choice.allows(choice.instrument()) {
            return Err(ComposeError::InvalidArgument(format!(
                "instrument {} is not allowed for {}",
                choice.instrument(),
                choice.file_name
            )));
        }

        let key = self.composition.key_signature;
        let tempo = self.composition.micros_per_quarter();
        let line = &mut self.composition.lines[self.line_index];
        let file_name = choice.file_name.clone();

        line.push(choice);
        match line.render(key, tempo) {
            Ok(smf) => line.set_rendered(smf),
            Err(e) => {
                line.pop();
                warn!(file = %file_name, error = %e, "choice rejected, line does not render");
                return Err(e);
            }
        }

        info!(
            file = %file_name,
            step = self.step_index,
            line = %line.name,
            "choice applied"
        );
        self.composition.smf = None;

        self.line_index += 1;
        if self.line_index >= self.line_count() {
            self.line_index = 0;
            self.step_index += 1;
        }
        Ok(())
    }

    /// Take back the most recent choice. Returns it, or `None` at the start.
    pub fn undo_choice(&mut self) -> Option<Choice> {
        if !self.has_started() {
            return None;
        }

        if self.line_index == 0 {
            self.step_index -= 1;
            self.line_index = self.line_count() - 1;
        } else {
            self.line_index -= 1;
        }

        let key = self.composition.key_signature;
        let tempo = self.composition.micros_per_quarter();
        let line = &mut self.composition.lines[self.line_index];
        let undone = line.pop();
        // A line that no longer renders is left without a cached document;
        // the next rebuild reports the error.
        let rendered = match line.render(key, tempo) {
            Ok(smf) => smf,
            Err(e) => {
                warn!(line = %line.name, error = %e, "line does not render after undo");
                None
            }
        };
        line.set_rendered(rendered);
        self.composition.smf = None;
        if let Some(choice) = &undone {
            info!(
                file = %choice.file_name,
                step = self.step_index,
                line = %line.name,
                "choice undone"
            );
        }
        undone
    }

    pub fn has_started(&self) -> bool {
        self.step_index > 0 || self.line_index > 0
    }

    pub fn has_ended(&self) -> bool {
        self.step_index >= self.step_count()
    }

    /// Re-render every line with the current settings and layer them into
    /// one format 1 document. Only lines with choices contribute tracks.
    pub fn rebuild_whole(&mut self) -> Result<&Smf> {
        let key = self.composition.key_signature;
        let tempo = self.composition.micros_per_quarter();

        let mut rendered = Vec::with_capacity(self.line_count());
        for line in &self.composition.lines {
            rendered.push(line.render(key, tempo)?);
        }

        let tracks: Vec<Smf> = rendered.iter().flatten().cloned().collect();
        if tracks.is_empty() {
            return Err(ComposeError::State(
                "nothing to rebuild, no choice has been made".to_string(),
            ));
        }
        let whole = concat_parallel(&tracks)?;

        for (line, smf) in self.composition.lines.iter_mut().zip(rendered) {
            line.set_rendered(smf);
        }
        debug!(
            tracks = whole.track_count(),
            events = whole.event_count(),
            "rebuilt composition"
        );

        Ok(self.composition.smf.insert(whole))
    }

    pub fn set_key_signature(&mut self, key_signature: i8) -> Result<()> {
        if !self.config.key_signature.allowed.contains(&key_signature) {
            warn!(key_signature, "key signature rejected");
            return Err(ComposeError::InvalidArgument(format!(
                "key signature {key_signature} is not one of {:?}",
                self.config.key_signature.allowed
            )));
        }
        self.composition.key_signature = key_signature;
        self.composition.smf = None;
        Ok(())
    }

    pub fn set_tempo(&mut self, bpm: u32) -> Result<()> {
        let range = self.config.tempo;
        if !(range.min..=range.max).contains(&bpm) {
            warn!(bpm, "tempo rejected");
            return Err(ComposeError::InvalidArgument(format!(
                "tempo {bpm} is outside {}..={}",
                range.min, range.max
            )));
        }
        self.composition.tempo_bpm = bpm;
        self.composition.smf = None;
        Ok(())
    }

    pub fn set_line_volume(&mut self, line: usize, volume: u8) -> Result<()> {
        let line = self.line_mut(line)?;
        let range = line.volume_range;
        if !(range.min..=range.max).contains(&volume) {
            return Err(ComposeError::InvalidArgument(format!(
                "volume {volume} is outside {}..={} for line {}",
                range.min, range.max, line.name
            )));
        }
        line.volume = volume;
        self.composition.smf = None;
        Ok(())
    }

    /// Raise a line's volume by its configured step, stopping at the maximum.
    pub fn volume_up(&mut self, line: usize) -> Result<u8> {
        let line = self.line_mut(line)?;
        let range = line.volume_range;
        line.volume = line.volume.saturating_add(range.step).min(range.max);
        let volume = line.volume;
        self.composition.smf = None;
        Ok(volume)
    }

    pub fn volume_down(&mut self, line: usize) -> Result<u8> {
        let line = self.line_mut(line)?;
        let range = line.volume_range;
        line.volume = line.volume.saturating_sub(range.step).max(range.min);
        let volume = line.volume;
        self.composition.smf = None;
        Ok(volume)
    }

    fn line_mut(&mut self, index: usize) -> Result<&mut Line> {
        let count = self.composition.lines.len();
        self.composition
            .lines
            .get_mut(index)
            .ok_or_else(|| ComposeError::InvalidArgument(format!("no line {index}, the piece has {count}")))
    }

    /// A single candidate as it would sound in the piece right now.
    pub fn preview_choice(&self, choice: &Choice) -> Result<Vec<u8>> {
        let smf = choice.render(
            self.composition.key_signature,
            self.composition.micros_per_quarter(),
        )?;
        Ok(encode(&smf))
    }

    /// One line on its own, as it would sound in the piece right now.
    pub fn preview_line(&self, line: usize) -> Result<Vec<u8>> {
        let line = self
            .composition
            .lines
            .get(line)
            .ok_or_else(|| ComposeError::InvalidArgument(format!("no line {line}")))?;
        let smf = line
            .render(
                self.composition.key_signature,
                self.composition.micros_per_quarter(),
            )?
            .ok_or_else(|| ComposeError::State(format!("line {} has no choices", line.name)))?;
        Ok(encode(&smf))
    }

    /// Rebuild and encode the whole piece.
    pub fn export(&mut self) -> Result<Export> {
        let bytes = encode(self.rebuild_whole()?);
        let export = Export {
            id: self.composition.id,
            bytes,
        };
        info!(
            id = %export.id,
            bytes = export.bytes.len(),
            choices = self.composition.choice_count(),
            "composition exported"
        );
        Ok(export)
    }

    /// Pitch outline of every line as it would sound right now.
    pub fn spectra(&self) -> Result<CompositionSpectra> {
        let key = self.composition.key_signature;
        let tempo = self.composition.micros_per_quarter();

        let mut lines = Vec::with_capacity(self.line_count());
        for line in &self.composition.lines {
            let spectrum = line
                .render(key, tempo)?
                .map(|smf| smf.spectrum())
                .unwrap_or_default();
            lines.push(LineSpectrum {
                name: line.name.clone(),
                instruments: line.instruments(),
                spectrum,
            });
        }
        Ok(CompositionSpectra::new(lines))
    }
}
