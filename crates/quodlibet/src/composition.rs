//! The piece being built: lines of committed choices and the rendered result.

use crate::config::{Mode, TimeSignatureConfig, VolumeConfig};
use crate::{ComposeError, Result};
use midifile::{concat_sequential, Smf, Spectrum, PERCUSSION_CHANNEL};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// One candidate fragment for a `(step, line)` slot.
///
/// The source is trimmed once and shared; rendering works on a copy.
#[derive(Debug, Clone, PartialEq)]
pub struct Choice {
    pub id: Uuid,
    pub file_name: String,
    source: Arc<Smf>,
    instrument: u8,
    instruments_allowed: Vec<u8>,
    spectrum: Spectrum,
}

impl Choice {
    pub fn new(file_name: impl Into<String>, source: Smf, instrument: u8, instruments_allowed: Vec<u8>) -> Self {
        let spectrum = source.spectrum();
        Self {
            id: Uuid::new_v4(),
            file_name: file_name.into(),
            source: Arc::new(source),
            instrument,
            instruments_allowed,
            spectrum,
        }
    }

    pub fn source(&self) -> &Smf {
        &self.source
    }

    pub fn instrument(&self) -> u8 {
        self.instrument
    }

    /// Programs this choice may use. Empty allows any.
    pub fn instruments_allowed(&self) -> &[u8] {
        &self.instruments_allowed
    }

    pub fn allows(&self, program: u8) -> bool {
        program <= 127
            && (self.instruments_allowed.is_empty() || self.instruments_allowed.contains(&program))
    }

    pub fn set_instrument(&mut self, program: u8) -> Result<()> {
        if !self.allows(program) {
            return Err(ComposeError::InvalidArgument(format!(
                "instrument {program} is not allowed for {}",
                self.file_name
            )));
        }
        self.instrument = program;
        Ok(())
    }

    /// Notes of the untransposed source.
    pub fn spectrum(&self) -> &Spectrum {
        &self.spectrum
    }

    /// A copy of the source with this choice's instrument, the piece's key
    /// and tempo applied.
    pub fn render(&self, key_signature: i8, micros_per_quarter: u32) -> Result<Smf> {
        let mut smf = Smf::clone(&self.source);
        smf.set_instrument(self.instrument)?;
        smf.transpose(key_signature)?;
        smf.set_tempo(micros_per_quarter)?;
        Ok(smf)
    }
}

/// One voice of the piece.
#[derive(Debug, Clone)]
pub struct Line {
    pub id: Uuid,
    pub name: String,
    /// Output channel, fixed by position.
    pub channel: u8,
    pub volume: u8,
    pub volume_range: VolumeConfig,
    choices: Vec<Choice>,
    smf: Option<Smf>,
}

impl Line {
    pub fn new(name: impl Into<String>, index: usize, volume_range: VolumeConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            channel: channel_for_line(index),
            volume: volume_range.default,
            volume_range,
            choices: Vec::new(),
            smf: None,
        }
    }

    pub fn choices(&self) -> &[Choice] {
        &self.choices
    }

    /// Last rendering, if it is current.
    pub fn smf(&self) -> Option<&Smf> {
        self.smf.as_ref()
    }

    pub(crate) fn push(&mut self, choice: Choice) {
        self.choices.push(choice);
    }

    pub(crate) fn pop(&mut self) -> Option<Choice> {
        self.choices.pop()
    }

    pub(crate) fn set_rendered(&mut self, smf: Option<Smf>) {
        self.smf = smf;
    }

    /// Chain the rendered choices end to end on this line's channel and volume.
    /// `None` when nothing has been chosen yet.
    pub fn render(&self, key_signature: i8, micros_per_quarter: u32) -> Result<Option<Smf>> {
        let mut rendered = self
            .choices
            .iter()
            .map(|c| c.render(key_signature, micros_per_quarter));

        let Some(first) = rendered.next() else {
            return Ok(None);
        };
        let mut smf = first?;
        for next in rendered {
            smf = concat_sequential(&smf, &next?)?;
        }

        smf.set_channel(self.channel)?;
        smf.set_volume(self.volume)?;
        Ok(Some(smf))
    }

    pub fn instruments(&self) -> Vec<u8> {
        self.choices.iter().map(Choice::instrument).collect()
    }
}

/// Line `index` plays on channel `index`, stepping over the percussion
/// channel. Lines past the sixteenth share channel 15.
pub fn channel_for_line(index: usize) -> u8 {
    let channel = if index >= PERCUSSION_CHANNEL as usize {
        index + 1
    } else {
        index
    };
    channel.min(15) as u8
}

/// Global state of the piece. The cursor lives in the composer.
#[derive(Debug, Clone)]
pub struct Composition {
    pub id: Uuid,
    pub lines: Vec<Line>,
    pub key_signature: i8,
    pub tempo_bpm: u32,
    /// Informational. Fragments carry their own meter and mode events,
    /// which pass through rendering unchanged.
    pub time_signature: TimeSignatureConfig,
    pub mode: Mode,
    pub(crate) smf: Option<Smf>,
}

impl Composition {
    /// The whole piece as last rebuilt. `None` before the first rebuild and
    /// after any choice, undo or setting change since.
    pub fn smf(&self) -> Option<&Smf> {
        self.smf.as_ref()
    }

    pub fn micros_per_quarter(&self) -> u32 {
        micros_per_quarter(self.tempo_bpm)
    }

    pub fn choice_count(&self) -> usize {
        self.lines.iter().map(|l| l.choices.len()).sum()
    }
}

/// `round(60_000_000 / bpm)`.
pub fn micros_per_quarter(bpm: u32) -> u32 {
    let bpm = bpm.max(1);
    (60_000_000 + bpm / 2) / bpm
}

/// Encoded piece ready to be written out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    pub id: Uuid,
    pub bytes: Vec<u8>,
}

impl Export {
    pub fn file_name(&self) -> String {
        format!("{}.mid", self.id)
    }
}

/// Pitch outline of every line, for drawing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositionSpectra {
    pub lines: Vec<LineSpectrum>,
    pub min_key: Option<u8>,
    pub max_key: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineSpectrum {
    pub name: String,
    pub instruments: Vec<u8>,
    pub spectrum: Spectrum,
}

impl CompositionSpectra {
    pub fn new(lines: Vec<LineSpectrum>) -> Self {
        Self {
            min_key: lines.iter().filter_map(|l| l.spectrum.min_key).min(),
            max_key: lines.iter().filter_map(|l| l.spectrum.max_key).max(),
            lines,
        }
    }
}
