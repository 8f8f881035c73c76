//! Per-piece slot configuration, read from `<piece>/composition.toml`.
//!
//! ```toml
//! ticks_per_quarter = 96
//! mode = "major"
//!
//! [time_signature]
//! numerator = 4
//! denominator = 4
//!
//! [key_signature]
//! allowed = [-2, -1, 0, 1, 2]
//! default = 0
//!
//! [tempo]
//! min = 60
//! max = 180
//! step = 5
//! default = 120
//!
//! [[lines]]
//! name = "melody"
//! volume = { min = 0, max = 127, step = 8, default = 100 }
//!
//! [[steps]]
//! quarter_notes = 16
//! [[steps.lines]]
//! options = [
//!     { file = "a.mid", instrument = 0, instruments = [0, 24, 40] },
//!     { file = "b.mid", instrument = 24 },
//! ]
//! ```

use crate::catalog::Catalog;
use crate::{ComposeError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

const MAX_DATA: u8 = 127;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionConfig {
    #[serde(default)]
    pub time_signature: TimeSignatureConfig,

    /// Fallback division for fragments whose own time division is SMPTE.
    #[serde(default = "CompositionConfig::default_ticks_per_quarter")]
    pub ticks_per_quarter: u16,

    #[serde(default)]
    pub mode: Mode,

    #[serde(default)]
    pub key_signature: KeySignatureConfig,

    #[serde(default)]
    pub tempo: TempoConfig,

    pub lines: Vec<LineConfig>,

    pub steps: Vec<StepConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignatureConfig {
    pub numerator: u8,
    pub denominator: u8,
}

impl Default for TimeSignatureConfig {
    fn default() -> Self {
        Self {
            numerator: 4,
            denominator: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Major,
    Minor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySignatureConfig {
    /// Signatures the user may pick, sharps positive, flats negative.
    pub allowed: Vec<i8>,
    pub default: i8,
}

impl Default for KeySignatureConfig {
    fn default() -> Self {
        Self {
            allowed: (-7..=7).collect(),
            default: 0,
        }
    }
}

/// Beats per minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TempoConfig {
    pub min: u32,
    pub max: u32,
    pub step: u32,
    pub default: u32,
}

impl Default for TempoConfig {
    fn default() -> Self {
        Self {
            min: 40,
            max: 240,
            step: 1,
            default: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineConfig {
    pub name: String,
    #[serde(default)]
    pub volume: VolumeConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeConfig {
    pub min: u8,
    pub max: u8,
    pub step: u8,
    pub default: u8,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            min: 0,
            max: 127,
            step: 1,
            default: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepConfig {
    /// Every fragment of the step is cut to this many quarter notes.
    pub quarter_notes: u32,
    /// One entry per line, in line order.
    pub lines: Vec<StepLineConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepLineConfig {
    pub options: Vec<OptionConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionConfig {
    /// File name inside the line directory.
    pub file: String,
    /// General MIDI program used until the user picks another.
    #[serde(default)]
    pub instrument: u8,
    /// Programs the user may pick. Empty allows any.
    #[serde(default)]
    pub instruments: Vec<u8>,
}

impl OptionConfig {
    pub fn allows(&self, program: u8) -> bool {
        program <= MAX_DATA && (self.instruments.is_empty() || self.instruments.contains(&program))
    }
}

impl CompositionConfig {
    fn default_ticks_per_quarter() -> u16 {
        96
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| ComposeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
            .map_err(|e| ComposeError::Config(format!("{}: {e}", path.display())))
    }

    pub fn from_toml_str(contents: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Check ranges and defaults. Does not look at fragments.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(ComposeError::Config(msg));

        let ts = self.time_signature;
        if ts.numerator == 0 || !ts.denominator.is_power_of_two() {
            return invalid(format!(
                "time signature {}/{} is not a valid meter",
                ts.numerator, ts.denominator
            ));
        }

        if self.ticks_per_quarter == 0 || self.ticks_per_quarter & 0x8000 != 0 {
            return invalid(format!(
                "ticks_per_quarter {} must be in 1..=32767",
                self.ticks_per_quarter
            ));
        }

        let keys = &self.key_signature;
        if keys.allowed.is_empty() {
            return invalid("no key signatures allowed".to_string());
        }
        if let Some(k) = keys.allowed.iter().find(|k| !(-7..=7).contains(*k)) {
            return invalid(format!("key signature {k} is outside -7..=7"));
        }
        if !keys.allowed.contains(&keys.default) {
            return invalid(format!(
                "default key signature {} is not in the allowed list",
                keys.default
            ));
        }

        let t = self.tempo;
        if t.min == 0 || t.step == 0 || t.min > t.max || !(t.min..=t.max).contains(&t.default) {
            return invalid(format!(
                "tempo range {}..={} step {} default {} is inconsistent",
                t.min, t.max, t.step, t.default
            ));
        }

        if self.lines.is_empty() {
            return invalid("a composition needs at least one line".to_string());
        }
        for line in &self.lines {
            let v = line.volume;
            if v.step == 0 || v.min > v.max || v.max > MAX_DATA || !(v.min..=v.max).contains(&v.default) {
                return invalid(format!("line {:?} has an inconsistent volume range", line.name));
            }
        }

        if self.steps.is_empty() {
            return invalid("a composition needs at least one step".to_string());
        }
        for (s, step) in self.steps.iter().enumerate() {
            if step.quarter_notes == 0 {
                return invalid(format!("step {s} has zero length"));
            }
            if step.lines.len() != self.lines.len() {
                return invalid(format!(
                    "step {s} configures {} lines, the composition has {}",
                    step.lines.len(),
                    self.lines.len()
                ));
            }
            for (l, line) in step.lines.iter().enumerate() {
                if line.options.is_empty() {
                    return invalid(format!("step {s} line {l} has no options"));
                }
                for option in &line.options {
                    if let Some(p) = option.instruments.iter().find(|p| **p > MAX_DATA) {
                        return invalid(format!("{}: program {p} is outside 0..=127", option.file));
                    }
                    if !option.allows(option.instrument) {
                        return invalid(format!(
                            "{}: default instrument {} is not allowed",
                            option.file, option.instrument
                        ));
                    }
                }
            }
        }

        Ok(())
    }

    /// Check that every configured slot and option exists in `catalog`.
    ///
    /// Line directories must carry the configured line names, in the same
    /// order.
    pub fn check_catalog(&self, catalog: &Catalog) -> Result<()> {
        if catalog.step_count() != self.steps.len() {
            return Err(ComposeError::Config(format!(
                "config has {} steps, catalog has {}",
                self.steps.len(),
                catalog.step_count()
            )));
        }

        for (s, (step, source)) in self.steps.iter().zip(&catalog.steps).enumerate() {
            if source.lines.len() != step.lines.len() {
                return Err(ComposeError::Config(format!(
                    "step {s} ({}) has {} line directories, config has {}",
                    source.name,
                    source.lines.len(),
                    step.lines.len()
                )));
            }
            for (l, (line, config)) in step.lines.iter().zip(&self.lines).enumerate() {
                let dir = &source.lines[l].name;
                if *dir != config.name {
                    return Err(ComposeError::Config(format!(
                        "step {s} ({}) line {l} is directory {dir:?}, config names it {:?}",
                        source.name, config.name
                    )));
                }
                for option in &line.options {
                    if catalog.option(s, l, &option.file).is_none() {
                        return Err(ComposeError::Config(format!(
                            "step {s} ({}) line {l} has no fragment named {:?}",
                            source.name, option.file
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}
