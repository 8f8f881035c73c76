//! In-place rewrites of decoded documents and the two ways of splicing them.
//!
//! Every fallible edit validates before it mutates, so an `Err` leaves the
//! document exactly as it was.

use crate::event::{Event, EventKind, Format, Smf, Track, PERCUSSION_CHANNEL};
use crate::key::KeySignature;
use crate::{Error, Result};

const MAX_TEMPO: u32 = 0x00FF_FFFF;

impl Track {
    /// Move every note so the track sounds in `target` instead of its own key.
    ///
    /// The shift comes from the first key signature event; all key signature
    /// events are then rewritten to `target`.
    pub fn transpose(&mut self, target: i8) -> Result<()> {
        let target = KeySignature::new(target)?;
        let (current, _) = self.key_signature().ok_or(Error::MissingKeySignature)?;
        let current = KeySignature::new(current)?;

        if current == target {
            return Ok(());
        }

        let shift = current.shift_to(target);
        if let Some(key) = self
            .note_keys()
            .find(|key| !(0..=127).contains(&(*key as i16 + shift as i16)))
        {
            return Err(Error::NoteOutOfRange { key, shift });
        }

        for event in &mut self.events {
            match &mut event.kind {
                EventKind::NoteOn { key, .. } | EventKind::NoteOff { key, .. } => {
                    *key = (*key as i16 + shift as i16) as u8;
                }
                EventKind::KeySignature { sharps_flats, .. } => {
                    *sharps_flats = target.value();
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Drop every leading delta-0 event matching `is_setup`, then insert one
    /// fresh setup event per note channel at the head of the track.
    fn replace_head_setup(&mut self, is_setup: fn(&EventKind) -> bool, make: impl Fn(u8) -> EventKind) {
        let head_len = self.events.iter().take_while(|e| e.delta == 0).count();
        let mut index = 0;
        self.events.retain(|e| {
            let keep = index >= head_len || !is_setup(&e.kind);
            index += 1;
            keep
        });

        let mut channels = self.note_channels();
        if channels.is_empty() {
            channels.push(0);
        }
        for (offset, channel) in channels.into_iter().enumerate() {
            self.events.insert(offset, Event::new(0, make(channel)));
        }
    }

    /// Cut the track at `max_ticks`. Notes still sounding at the cut are
    /// closed there and an end-of-track follows. Shorter tracks are untouched.
    pub fn truncate(&mut self, max_ticks: u64) {
        if self.duration_ticks() <= max_ticks {
            return;
        }

        let mut kept: Vec<Event> = Vec::new();
        let mut sounding: Vec<(u8, u8)> = Vec::new();
        let mut tick: u64 = 0;
        let mut last_kept: u64 = 0;

        for event in &self.events {
            tick += event.delta as u64;
            if tick > max_ticks {
                break;
            }
            if event.kind == EventKind::EndOfTrack
                || (tick == max_ticks && event.kind.is_sounding_note_on())
            {
                continue;
            }

            match event.kind {
                EventKind::NoteOn { channel, key, velocity } if velocity > 0 => {
                    sounding.push((channel, key));
                }
                EventKind::NoteOn { channel, key, .. } | EventKind::NoteOff { channel, key, .. } => {
                    if let Some(pos) = sounding.iter().position(|n| *n == (channel, key)) {
                        sounding.remove(pos);
                    }
                }
                _ => {}
            }

            kept.push(Event::new((tick - last_kept) as u32, event.kind));
            last_kept = tick;
        }

        let mut delta = (max_ticks - last_kept) as u32;
        for (channel, key) in sounding {
            kept.push(Event::new(
                delta,
                EventKind::NoteOff {
                    channel,
                    key,
                    velocity: 0,
                },
            ));
            delta = 0;
        }
        kept.push(Event::new(delta, EventKind::EndOfTrack));

        self.events = kept;
    }

    /// Append `next` after this track, dropping our trailing end-of-track.
    /// Deltas of `next` are taken as they are.
    fn append(&mut self, next: &Track) {
        if self.ends_with_end_of_track() {
            self.events.pop();
        }
        self.events.extend(next.events.iter().cloned());
    }
}

impl Smf {
    /// Transpose every track to `target` (see [`Track::transpose`]).
    /// All tracks succeed or none change.
    pub fn transpose(&mut self, target: i8) -> Result<()> {
        let mut tracks = self.tracks.clone();
        for track in &mut tracks {
            track.transpose(target)?;
        }
        self.tracks = tracks;
        Ok(())
    }

    /// Rewrite every tempo event. Tracks without one get one at their head.
    pub fn set_tempo(&mut self, micros_per_quarter: u32) -> Result<()> {
        if micros_per_quarter > MAX_TEMPO {
            return Err(Error::TempoOutOfRange(micros_per_quarter));
        }

        for track in &mut self.tracks {
            let mut found = false;
            for event in &mut track.events {
                if let EventKind::Tempo { micros_per_quarter: us } = &mut event.kind {
                    *us = micros_per_quarter;
                    found = true;
                }
            }
            if !found {
                track
                    .events
                    .insert(0, Event::new(0, EventKind::Tempo { micros_per_quarter }));
            }
        }
        Ok(())
    }

    /// Select a General MIDI program for the notes of every track.
    ///
    /// Program changes sit at the head of each track, one per note channel.
    /// Calling again replaces them.
    pub fn set_instrument(&mut self, program: u8) -> Result<()> {
        check_data("program", program, 127)?;
        for track in &mut self.tracks {
            track.replace_head_setup(
                |k| matches!(k, EventKind::ProgramChange { .. }),
                |channel| EventKind::ProgramChange { channel, program },
            );
        }
        Ok(())
    }

    /// Set channel volume (controller 7) for the notes of every track.
    pub fn set_volume(&mut self, volume: u8) -> Result<()> {
        check_data("volume", volume, 127)?;
        for track in &mut self.tracks {
            track.replace_head_setup(
                |k| matches!(k, EventKind::ChannelVolume { .. }),
                |channel| EventKind::ChannelVolume { channel, volume },
            );
        }
        Ok(())
    }

    /// Move all channel events onto `channel`. Percussion stays on channel 9.
    pub fn set_channel(&mut self, channel: u8) -> Result<()> {
        check_data("channel", channel, 15)?;
        for event in self.tracks.iter_mut().flat_map(|t| t.events.iter_mut()) {
            match event.kind.channel() {
                Some(PERCUSSION_CHANNEL) | None => {}
                Some(_) => event.kind.set_channel(channel),
            }
        }
        Ok(())
    }

    /// Cut every track at `max_ticks` (see [`Track::truncate`]).
    pub fn truncate(&mut self, max_ticks: u64) {
        for track in &mut self.tracks {
            track.truncate(max_ticks);
        }
    }

    /// Splice `next` onto the end of this document, track by track.
    pub fn append(&mut self, next: &Smf) -> Result<()> {
        check_same("format", &self.format, &next.format)?;
        check_same("track count", &self.track_count(), &next.track_count())?;
        check_same("time division", &self.time_division, &next.time_division)?;

        for (track, next_track) in self.tracks.iter_mut().zip(&next.tracks) {
            track.append(next_track);
        }
        Ok(())
    }
}

/// `base` followed by `next`, as a new document. See [`Smf::append`].
pub fn concat_sequential(base: &Smf, next: &Smf) -> Result<Smf> {
    let mut joined = base.clone();
    joined.append(next)?;
    Ok(joined)
}

/// Stack single-track documents as the tracks of one format 1 document.
///
/// Each track keeps its own timeline. The time division is taken from the
/// first document.
pub fn concat_parallel(documents: &[Smf]) -> Result<Smf> {
    let first = documents.first().ok_or(Error::NothingToMerge)?;

    let mut tracks = Vec::with_capacity(documents.len());
    for (index, smf) in documents.iter().enumerate() {
        match smf.tracks.as_slice() {
            [track] => tracks.push(track.clone()),
            _ => {
                return Err(Error::NotSingleTrack {
                    index,
                    tracks: smf.track_count(),
                })
            }
        }
    }

    Ok(Smf::new(Format::Parallel, first.time_division, tracks))
}

fn check_data(what: &'static str, value: u8, max: u8) -> Result<()> {
    if value > max {
        return Err(Error::DataOutOfRange {
            what,
            value: value as u32,
            max: max as u32,
        });
    }
    Ok(())
}

fn check_same<T: PartialEq + std::fmt::Display>(field: &'static str, left: &T, right: &T) -> Result<()> {
    if left != right {
        return Err(Error::Mismatch {
            field,
            left: left.to_string(),
            right: right.to_string(),
        });
    }
    Ok(())
}
