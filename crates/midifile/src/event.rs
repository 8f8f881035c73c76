//! Decoded Standard MIDI File structures.
//!
//! Only the events needed to transpose, re-tempo, re-key and terminate a
//! track survive decoding. Everything else is consumed by the decoder and
//! folded into the delta time of the next retained event.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Percussion channel in General MIDI (channel 10, zero-based 9).
pub const PERCUSSION_CHANNEL: u8 = 9;

/// Controller number for channel volume.
pub const CONTROLLER_VOLUME: u8 = 0x07;

/// SMF header format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    /// Format 0: one track carrying every channel. The only format we read.
    SingleTrack,
    /// Format 1: simultaneous tracks sharing a time base. The only format we
    /// build from several documents.
    Parallel,
}

impl Format {
    pub fn as_u16(self) -> u16 {
        match self {
            Format::SingleTrack => 0,
            Format::Parallel => 1,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

/// A retained track event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Ticks since the previous retained event.
    pub delta: u32,
    pub kind: EventKind,
}

impl Event {
    pub fn new(delta: u32, kind: EventKind) -> Self {
        Self { delta, kind }
    }
}

/// What an event does. Closed set: the decoder produces the note and meta
/// variants, the editor inserts the two channel-setup variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    NoteOn { channel: u8, key: u8, velocity: u8 },
    NoteOff { channel: u8, key: u8, velocity: u8 },
    /// Meta 0x51.
    Tempo { micros_per_quarter: u32 },
    /// Meta 0x58.
    TimeSignature {
        numerator: u8,
        denominator_pow: u8,
        clocks_per_click: u8,
        notated_32nds: u8,
    },
    /// Meta 0x59. `sharps_flats` is the signed circle-of-fifths position
    /// (negative = flats). `mode` is 0 for major, 1 for minor.
    KeySignature { sharps_flats: i8, mode: u8 },
    /// Meta 0x2F.
    EndOfTrack,
    /// Program change inserted when an instrument is chosen.
    ProgramChange { channel: u8, program: u8 },
    /// Controller 7 inserted when a line volume is applied.
    ChannelVolume { channel: u8, volume: u8 },
}

impl EventKind {
    pub fn is_note(&self) -> bool {
        matches!(self, EventKind::NoteOn { .. } | EventKind::NoteOff { .. })
    }

    /// Note-on with a non-zero velocity. Velocity 0 is a note-off by convention.
    pub fn is_sounding_note_on(&self) -> bool {
        matches!(self, EventKind::NoteOn { velocity, .. } if *velocity > 0)
    }

    /// Channel for channel-voice events, `None` for meta events.
    pub fn channel(&self) -> Option<u8> {
        match *self {
            EventKind::NoteOn { channel, .. }
            | EventKind::NoteOff { channel, .. }
            | EventKind::ProgramChange { channel, .. }
            | EventKind::ChannelVolume { channel, .. } => Some(channel),
            _ => None,
        }
    }

    pub(crate) fn set_channel(&mut self, to: u8) {
        match self {
            EventKind::NoteOn { channel, .. }
            | EventKind::NoteOff { channel, .. }
            | EventKind::ProgramChange { channel, .. }
            | EventKind::ChannelVolume { channel, .. } => *channel = to & 0x0F,
            _ => {}
        }
    }

    /// Append the wire bytes (status byte onward) of this event.
    pub fn write_payload(&self, out: &mut Vec<u8>) {
        match *self {
            EventKind::NoteOn { channel, key, velocity } => {
                out.extend_from_slice(&[0x90 | (channel & 0x0F), key, velocity]);
            }
            EventKind::NoteOff { channel, key, velocity } => {
                out.extend_from_slice(&[0x80 | (channel & 0x0F), key, velocity]);
            }
            EventKind::Tempo { micros_per_quarter } => {
                out.extend_from_slice(&[
                    0xFF,
                    0x51,
                    0x03,
                    ((micros_per_quarter >> 16) & 0xFF) as u8,
                    ((micros_per_quarter >> 8) & 0xFF) as u8,
                    (micros_per_quarter & 0xFF) as u8,
                ]);
            }
            EventKind::TimeSignature {
                numerator,
                denominator_pow,
                clocks_per_click,
                notated_32nds,
            } => {
                out.extend_from_slice(&[
                    0xFF,
                    0x58,
                    0x04,
                    numerator,
                    denominator_pow,
                    clocks_per_click,
                    notated_32nds,
                ]);
            }
            EventKind::KeySignature { sharps_flats, mode } => {
                out.extend_from_slice(&[0xFF, 0x59, 0x02, sharps_flats as u8, mode]);
            }
            EventKind::EndOfTrack => out.extend_from_slice(&[0xFF, 0x2F, 0x00]),
            EventKind::ProgramChange { channel, program } => {
                out.extend_from_slice(&[0xC0 | (channel & 0x0F), program & 0x7F]);
            }
            EventKind::ChannelVolume { channel, volume } => {
                out.extend_from_slice(&[
                    0xB0 | (channel & 0x0F),
                    CONTROLLER_VOLUME,
                    volume & 0x7F,
                ]);
            }
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            EventKind::NoteOn { channel, key, velocity } => {
                write!(f, "note on  ch={channel} key={key} vel={velocity}")
            }
            EventKind::NoteOff { channel, key, velocity } => {
                write!(f, "note off ch={channel} key={key} vel={velocity}")
            }
            EventKind::Tempo { micros_per_quarter } => {
                write!(f, "tempo {micros_per_quarter}us/quarter")
            }
            EventKind::TimeSignature {
                numerator,
                denominator_pow,
                ..
            } => write!(f, "time signature {numerator}/{}", 1u32 << denominator_pow.min(31)),
            EventKind::KeySignature { sharps_flats, mode } => {
                let mode = if mode == 1 { "minor" } else { "major" };
                write!(f, "key signature {sharps_flats:+} {mode}")
            }
            EventKind::EndOfTrack => write!(f, "end of track"),
            EventKind::ProgramChange { channel, program } => {
                write!(f, "program ch={channel} program={program}")
            }
            EventKind::ChannelVolume { channel, volume } => {
                write!(f, "volume ch={channel} value={volume}")
            }
        }
    }
}

/// Ordered events of one track chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub events: Vec<Event>,
}

impl Track {
    pub fn new(events: Vec<Event>) -> Self {
        Self { events }
    }

    pub fn push(&mut self, delta: u32, kind: EventKind) {
        self.events.push(Event::new(delta, kind));
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// First key signature in the track, as `(sharps_flats, mode)`.
    pub fn key_signature(&self) -> Option<(i8, u8)> {
        self.events.iter().find_map(|e| match e.kind {
            EventKind::KeySignature { sharps_flats, mode } => Some((sharps_flats, mode)),
            _ => None,
        })
    }

    /// Note keys in playback order.
    pub fn note_keys(&self) -> impl Iterator<Item = u8> + '_ {
        self.events.iter().filter_map(|e| match e.kind {
            EventKind::NoteOn { key, .. } | EventKind::NoteOff { key, .. } => Some(key),
            _ => None,
        })
    }

    /// Distinct channels used by note events, in first-use order.
    pub fn note_channels(&self) -> Vec<u8> {
        let mut channels = Vec::new();
        for event in &self.events {
            if event.kind.is_note() {
                if let Some(ch) = event.kind.channel() {
                    if !channels.contains(&ch) {
                        channels.push(ch);
                    }
                }
            }
        }
        channels
    }

    /// Total length in ticks (sum of deltas).
    pub fn duration_ticks(&self) -> u64 {
        self.events.iter().map(|e| e.delta as u64).sum()
    }

    pub fn ends_with_end_of_track(&self) -> bool {
        matches!(self.events.last(), Some(e) if e.kind == EventKind::EndOfTrack)
    }
}

/// A decoded (or assembled) Standard MIDI File.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Smf {
    pub format: Format,
    /// Raw header division word. Ticks per quarter note when the high bit is
    /// clear, SMPTE otherwise. Carried through untouched.
    pub time_division: u16,
    pub tracks: Vec<Track>,
}

impl Smf {
    pub fn new(format: Format, time_division: u16, tracks: Vec<Track>) -> Self {
        Self {
            format,
            time_division,
            tracks,
        }
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Ticks per quarter note, or `None` for SMPTE time division.
    pub fn ticks_per_quarter(&self) -> Option<u16> {
        if self.time_division & 0x8000 == 0 {
            Some(self.time_division)
        } else {
            None
        }
    }

    /// Number of retained events across all tracks.
    pub fn event_count(&self) -> usize {
        self.tracks.iter().map(Track::len).sum()
    }

    /// Human-readable listing of the header and every event.
    pub fn describe(&self) -> String {
        let mut out = format!(
            "Format: {}\nNumber of tracks: {}\nTime division: 0x{:04x}\n",
            self.format,
            self.track_count(),
            self.time_division
        );
        for (index, track) in self.tracks.iter().enumerate() {
            out.push_str(&format!("Track {index}: {} events\n", track.len()));
            for event in &track.events {
                out.push_str(&format!("    +{:<6} {}\n", event.delta, event.kind));
            }
        }
        out
    }
}
