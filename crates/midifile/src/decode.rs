//! Parse format 0 Standard MIDI File bytes into an [`Smf`].
//!
//! The decoder keeps note on/off, tempo, time signature, key signature and
//! end-of-track. Every other event is classified only far enough to know its
//! length, then skipped; its delta time carries over to the next kept event.

use crate::encode::MAX_VLQ;
use crate::event::{EventKind, Format, Smf, Track};
use crate::{Error, Result};

const HEADER_LEN: usize = 14;
const TRACK_DATA_START: usize = 22;

const META_END_OF_TRACK: u8 = 0x2F;
const META_TEMPO: u8 = 0x51;
const META_TIME_SIGNATURE: u8 = 0x58;
const META_KEY_SIGNATURE: u8 = 0x59;

/// Standard meta types we recognise but do not keep: sequence number, text
/// events, program and device names, channel prefix, port, SMPTE offset,
/// sequencer specific.
const DISCARDED_META: [u8; 14] = [
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x20, 0x21, 0x54, 0x7F,
];

/// Decode a single-track (format 0) Standard MIDI File.
pub fn decode(bytes: &[u8]) -> Result<Smf> {
    if bytes.get(0..4) != Some(b"MThd".as_slice()) {
        return Err(Error::BadHeaderMagic);
    }
    if bytes.len() < HEADER_LEN {
        return Err(Error::Truncated {
            what: "header chunk",
            offset: bytes.len(),
        });
    }

    let header_len = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if header_len != 6 {
        return Err(Error::BadHeaderLength(header_len));
    }

    let format = u16::from_be_bytes([bytes[8], bytes[9]]);
    if format != 0 {
        return Err(Error::UnsupportedFormat(format));
    }

    // Declared track count is not consulted: format 0 has exactly one track
    // chunk and the decoded document reports what it actually holds.
    let time_division = u16::from_be_bytes([bytes[12], bytes[13]]);

    if bytes.get(14..18) != Some(b"MTrk".as_slice()) {
        return Err(Error::MissingTrackChunk);
    }
    if bytes.len() < TRACK_DATA_START {
        return Err(Error::Truncated {
            what: "track chunk header",
            offset: bytes.len(),
        });
    }

    let track = decode_track(bytes, TRACK_DATA_START)?;
    Ok(Smf::new(Format::SingleTrack, time_division, vec![track]))
}

/// Walk events from `start` to the end of input.
fn decode_track(bytes: &[u8], start: usize) -> Result<Track> {
    let mut track = Track::default();
    let mut pos = start;
    let mut pending_delta: u32 = 0;

    while pos < bytes.len() {
        let delta_offset = pos;
        let (delta, used) = read_vlq(bytes, pos, "delta time")?;
        pos += used;

        pending_delta = pending_delta
            .checked_add(delta)
            .filter(|d| *d <= MAX_VLQ)
            .ok_or(Error::DeltaOverflow {
                offset: delta_offset,
            })?;

        let (kind, used) = classify(bytes, pos)?;
        pos += used;

        if let Some(kind) = kind {
            track.push(pending_delta, kind);
            pending_delta = 0;
        }
    }

    Ok(track)
}

/// Classify the event whose status byte sits at `pos`.
///
/// Returns the kept event (if any) and the number of bytes consumed.
fn classify(bytes: &[u8], pos: usize) -> Result<(Option<EventKind>, usize)> {
    let status = byte_at(bytes, pos, "event")?;
    let channel = status & 0x0F;

    match status >> 4 {
        0x8 | 0x9 => {
            let data = slice(bytes, pos + 1, 2, "note event")?;
            let (key, velocity) = (data[0], data[1]);
            let kind = if status >> 4 == 0x9 {
                EventKind::NoteOn { channel, key, velocity }
            } else {
                EventKind::NoteOff { channel, key, velocity }
            };
            Ok((Some(kind), 3))
        }
        // Polyphonic aftertouch, controller, pitch bend
        0xA | 0xB | 0xE => {
            slice(bytes, pos + 1, 2, "channel event")?;
            Ok((None, 3))
        }
        // Program change, channel aftertouch
        0xC | 0xD => {
            slice(bytes, pos + 1, 1, "channel event")?;
            Ok((None, 2))
        }
        0xF => match status {
            0xF0 | 0xF7 => {
                let (length, used) = read_vlq(bytes, pos + 1, "sysex length")?;
                slice(bytes, pos + 1 + used, length as usize, "sysex event")?;
                Ok((None, 1 + used + length as usize))
            }
            0xFF => classify_meta(bytes, pos),
            _ => Err(Error::UnknownStatus {
                status,
                offset: pos,
            }),
        },
        // Data byte where a status byte belongs (running status is not supported)
        _ => Err(Error::UnknownStatus {
            status,
            offset: pos,
        }),
    }
}

fn classify_meta(bytes: &[u8], pos: usize) -> Result<(Option<EventKind>, usize)> {
    let meta_type = byte_at(bytes, pos + 1, "meta event")?;
    let (length, used) = read_vlq(bytes, pos + 2, "meta length")?;
    let length = length as usize;
    let payload = slice(bytes, pos + 2 + used, length, "meta event")?;
    let consumed = 2 + used + length;

    let expect = |expected: usize| -> Result<()> {
        if length == expected {
            Ok(())
        } else {
            Err(Error::MalformedMeta {
                meta_type,
                length,
                expected,
                offset: pos,
            })
        }
    };

    let kind = match meta_type {
        META_TEMPO => {
            expect(3)?;
            EventKind::Tempo {
                micros_per_quarter: u32::from_be_bytes([0, payload[0], payload[1], payload[2]]),
            }
        }
        META_TIME_SIGNATURE => {
            expect(4)?;
            EventKind::TimeSignature {
                numerator: payload[0],
                denominator_pow: payload[1],
                clocks_per_click: payload[2],
                notated_32nds: payload[3],
            }
        }
        META_KEY_SIGNATURE => {
            expect(2)?;
            // Two's complement on the wire: 249..=255 are -7..=-1.
            EventKind::KeySignature {
                sharps_flats: payload[0] as i8,
                mode: payload[1],
            }
        }
        META_END_OF_TRACK => {
            expect(0)?;
            EventKind::EndOfTrack
        }
        t if DISCARDED_META.contains(&t) => return Ok((None, consumed)),
        _ => {
            return Err(Error::UnknownMetaType {
                meta_type,
                offset: pos,
            })
        }
    };

    Ok((Some(kind), consumed))
}

/// Read a variable-length quantity of at most 4 bytes.
///
/// Returns the value and the number of bytes used.
pub(crate) fn read_vlq(bytes: &[u8], pos: usize, what: &'static str) -> Result<(u32, usize)> {
    let mut value: u32 = 0;
    for i in 0..4 {
        let byte = byte_at(bytes, pos + i, what)?;
        value = (value << 7) | (byte & 0x7F) as u32;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    Err(Error::UnterminatedDeltaTime { offset: pos })
}

fn byte_at(bytes: &[u8], pos: usize, what: &'static str) -> Result<u8> {
    bytes
        .get(pos)
        .copied()
        .ok_or(Error::Truncated { what, offset: pos })
}

fn slice<'a>(bytes: &'a [u8], pos: usize, len: usize, what: &'static str) -> Result<&'a [u8]> {
    bytes
        .get(pos..pos + len)
        .ok_or(Error::Truncated { what, offset: pos })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use pretty_assertions::assert_eq;

    fn file(track_body: &[u8]) -> Vec<u8> {
        let mut bytes = b"MThd".to_vec();
        bytes.extend_from_slice(&[0, 0, 0, 6, 0, 0, 0, 1, 0x00, 0x60]);
        bytes.extend_from_slice(b"MTrk");
        bytes.extend_from_slice(&(track_body.len() as u32).to_be_bytes());
        bytes.extend_from_slice(track_body);
        bytes
    }

    #[test]
    fn reads_header_and_retained_events() {
        let smf = decode(&file(&[
            0x00, 0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20, // tempo 500000
            0x00, 0xFF, 0x58, 0x04, 0x04, 0x02, 0x18, 0x08, // 4/4
            0x00, 0xFF, 0x59, 0x02, 0xFE, 0x01, // 2 flats, minor
            0x00, 0x90, 0x3C, 0x64, // note on
            0x60, 0x80, 0x3C, 0x00, // note off
            0x00, 0xFF, 0x2F, 0x00,
        ]))
        .unwrap();

        assert_eq!(smf.format, Format::SingleTrack);
        assert_eq!(smf.time_division, 0x0060);
        assert_eq!(smf.track_count(), 1);
        assert_eq!(
            smf.tracks[0].events,
            vec![
                Event::new(0, EventKind::Tempo { micros_per_quarter: 500_000 }),
                Event::new(
                    0,
                    EventKind::TimeSignature {
                        numerator: 4,
                        denominator_pow: 2,
                        clocks_per_click: 0x18,
                        notated_32nds: 8,
                    }
                ),
                Event::new(0, EventKind::KeySignature { sharps_flats: -2, mode: 1 }),
                Event::new(0, EventKind::NoteOn { channel: 0, key: 60, velocity: 100 }),
                Event::new(0x60, EventKind::NoteOff { channel: 0, key: 60, velocity: 0 }),
                Event::new(0, EventKind::EndOfTrack),
            ]
        );
    }

    #[test]
    fn discarded_events_fold_into_next_delta() {
        let smf = decode(&file(&[
            0x00, 0x90, 0x3C, 0x64,
            0x10, 0xB0, 0x07, 0x64, // controller, dropped
            0x08, 0xC0, 0x05, // program change, dropped
            0x04, 0xF0, 0x02, 0x7E, 0xF7, // sysex, dropped
            0x02, 0xFF, 0x03, 0x03, b'f', b'o', b'o', // track name, dropped
            0x01, 0x80, 0x3C, 0x00,
            0x00, 0xFF, 0x2F, 0x00,
        ]))
        .unwrap();

        let events = &smf.tracks[0].events;
        assert_eq!(events.len(), 3);
        assert_eq!(events[1].delta, 0x10 + 0x08 + 0x04 + 0x02 + 0x01);
    }

    #[test]
    fn program_and_device_names_are_dropped() {
        let smf = decode(&file(&[
            0x00, 0xFF, 0x08, 0x05, b'P', b'i', b'a', b'n', b'o', // program name
            0x00, 0xFF, 0x09, 0x03, b'I', b'N', b'1', // device name
            0x03, 0x90, 0x3C, 0x64,
            0x00, 0xFF, 0x2F, 0x00,
        ]))
        .unwrap();

        let events = &smf.tracks[0].events;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], Event::new(3, EventKind::NoteOn { channel: 0, key: 60, velocity: 100 }));
    }

    #[test]
    fn multibyte_delta() {
        let smf = decode(&file(&[
            0x83, 0x60, 0x90, 0x3C, 0x64, // delta 480
            0x00, 0xFF, 0x2F, 0x00,
        ]))
        .unwrap();
        assert_eq!(smf.tracks[0].events[0].delta, 480);
    }

    #[test]
    fn rejects_bad_magic() {
        assert_eq!(decode(b"RIFF0000"), Err(Error::BadHeaderMagic));
        assert_eq!(decode(b""), Err(Error::BadHeaderMagic));
    }

    #[test]
    fn rejects_bad_header_length() {
        let mut bytes = file(&[0x00, 0xFF, 0x2F, 0x00]);
        bytes[7] = 7;
        assert_eq!(decode(&bytes), Err(Error::BadHeaderLength(7)));
    }

    #[test]
    fn rejects_format_one_input() {
        let mut bytes = file(&[0x00, 0xFF, 0x2F, 0x00]);
        bytes[9] = 1;
        assert_eq!(decode(&bytes), Err(Error::UnsupportedFormat(1)));
    }

    #[test]
    fn rejects_missing_track_magic() {
        let mut bytes = file(&[0x00, 0xFF, 0x2F, 0x00]);
        bytes[14..18].copy_from_slice(b"XTrk");
        assert_eq!(decode(&bytes), Err(Error::MissingTrackChunk));
    }

    #[test]
    fn rejects_unterminated_delta() {
        let err = decode(&file(&[0x80, 0x80, 0x80, 0x80, 0x00, 0x90, 0x3C, 0x64])).unwrap_err();
        assert_eq!(err, Error::UnterminatedDeltaTime { offset: 22 });
    }

    #[test]
    fn rejects_running_status_and_system_common() {
        let err = decode(&file(&[0x00, 0x3C, 0x64])).unwrap_err();
        assert!(matches!(err, Error::UnknownStatus { status: 0x3C, .. }));

        let err = decode(&file(&[0x00, 0xF2, 0x00, 0x00])).unwrap_err();
        assert!(matches!(err, Error::UnknownStatus { status: 0xF2, .. }));
    }

    #[test]
    fn rejects_unknown_meta_type() {
        let err = decode(&file(&[0x00, 0xFF, 0x60, 0x00])).unwrap_err();
        assert_eq!(err, Error::UnknownMetaType { meta_type: 0x60, offset: 23 });
    }

    #[test]
    fn rejects_malformed_key_signature_length() {
        let err = decode(&file(&[0x00, 0xFF, 0x59, 0x01, 0x00])).unwrap_err();
        assert!(matches!(err, Error::MalformedMeta { meta_type: 0x59, expected: 2, .. }));
    }

    #[test]
    fn rejects_truncated_event() {
        let err = decode(&file(&[0x00, 0x90, 0x3C])).unwrap_err();
        assert!(matches!(err, Error::Truncated { what: "note event", .. }));
    }

    #[test]
    fn empty_track_body_decodes_to_empty_track() {
        let smf = decode(&file(&[])).unwrap();
        assert!(smf.tracks[0].is_empty());
    }
}
