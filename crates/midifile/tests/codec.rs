//! End-to-end checks over wire bytes: decode, edit, splice, encode, and
//! confirm an independent parser agrees with what we wrote.

use midifile::{
    concat_parallel, concat_sequential, decode, encode, Event, EventKind, Format, Smf, Track,
};
use pretty_assertions::assert_eq;

/// Format 0 fragment with a tempo, a key signature, a discarded controller and
/// a text event, then the given notes a quarter apart at division 0x0060.
fn fragment_bytes(key_signature: i8, keys: &[u8]) -> Vec<u8> {
    let mut body = vec![
        0x00, 0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20, // tempo 500000
        0x00, 0xFF, 0x59, 0x02, key_signature as u8, 0x00, // key signature
        0x00, 0xB0, 0x40, 0x7F, // sustain pedal, discarded
        0x00, 0xFF, 0x01, 0x02, b'h', b'i', // text, discarded
    ];
    for key in keys {
        body.extend_from_slice(&[0x00, 0x90, *key, 0x64]);
        body.extend_from_slice(&[0x60, 0x80, *key, 0x00]);
    }
    body.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);

    let mut bytes = b"MThd".to_vec();
    bytes.extend_from_slice(&[0, 0, 0, 6, 0, 0, 0, 1, 0x00, 0x60]);
    bytes.extend_from_slice(b"MTrk");
    bytes.extend_from_slice(&(body.len() as u32).to_be_bytes());
    bytes.extend_from_slice(&body);
    bytes
}

fn note_keys(smf: &Smf) -> Vec<u8> {
    smf.tracks.iter().flat_map(|t| t.note_keys()).collect()
}

#[test]
fn decode_keeps_only_retained_events() {
    let smf = decode(&fragment_bytes(0, &[60, 62])).unwrap();

    assert_eq!(smf.format, Format::SingleTrack);
    assert_eq!(smf.time_division, 0x0060);
    assert_eq!(smf.track_count(), 1);
    // tempo, key, 2 x (on, off), end
    assert_eq!(smf.event_count(), 7);
    assert_eq!(smf.tracks[0].key_signature(), Some((0, 0)));
    assert_eq!(smf.tracks[0].duration_ticks(), 192);
}

#[test]
fn decoded_document_survives_encode_and_decode() {
    let smf = decode(&fragment_bytes(-2, &[58, 65, 70])).unwrap();
    let again = decode(&encode(&smf)).unwrap();
    assert_eq!(again, smf);
}

#[test]
fn encoded_output_parses_with_midly() {
    let smf = decode(&fragment_bytes(0, &[60, 64])).unwrap();
    let bytes = encode(&smf);

    let parsed = midly::Smf::parse(&bytes).unwrap();
    assert_eq!(parsed.header.format, midly::Format::SingleTrack);
    assert_eq!(
        parsed.header.timing,
        midly::Timing::Metrical(midly::num::u15::new(0x60))
    );
    assert_eq!(parsed.tracks.len(), 1);
    assert_eq!(parsed.tracks[0].len(), smf.tracks[0].len());

    let ons: Vec<u8> = parsed.tracks[0]
        .iter()
        .filter_map(|e| match e.kind {
            midly::TrackEventKind::Midi {
                message: midly::MidiMessage::NoteOn { key, .. },
                ..
            } => Some(key.as_int()),
            _ => None,
        })
        .collect();
    assert_eq!(ons, vec![60, 64]);
}

#[test]
fn transpose_moves_every_note_by_the_circle_distance() {
    let original = decode(&fragment_bytes(0, &[60, 62, 64, 65, 67])).unwrap();

    for (target, shift) in [(2i8, 2i16), (-1, 5), (4, 4), (-3, 3), (5, 11)] {
        let mut smf = original.clone();
        smf.transpose(target).unwrap();

        let expected: Vec<u8> = note_keys(&original)
            .iter()
            .map(|k| (*k as i16 + shift) as u8)
            .collect();
        assert_eq!(note_keys(&smf), expected, "target {target}");
        assert_eq!(smf.tracks[0].key_signature(), Some((target, 0)));

        smf.transpose(0).unwrap();
        assert_eq!(smf, original, "back from {target}");
    }
}

#[test]
fn transposed_key_signature_reaches_the_wire() {
    let mut smf = decode(&fragment_bytes(0, &[60])).unwrap();
    smf.transpose(-4).unwrap();
    let bytes = encode(&smf);

    let key_meta = bytes
        .windows(3)
        .position(|w| w == [0xFF, 0x59, 0x02])
        .unwrap();
    assert_eq!(bytes[key_meta + 3], 0xFC);
}

#[test]
fn sequential_and_parallel_event_counts() {
    let a = decode(&fragment_bytes(0, &[60])).unwrap();
    let b = decode(&fragment_bytes(0, &[62, 64])).unwrap();
    let c = decode(&fragment_bytes(0, &[48, 50, 52])).unwrap();

    let line = concat_sequential(&a, &b).unwrap();
    assert_eq!(line.event_count(), a.event_count() + b.event_count() - 1);
    assert_eq!(
        line.tracks[0].duration_ticks(),
        a.tracks[0].duration_ticks() + b.tracks[0].duration_ticks()
    );

    let piece = concat_parallel(&[line.clone(), c.clone()]).unwrap();
    assert_eq!(piece.format, Format::Parallel);
    assert_eq!(piece.track_count(), 2);
    assert_eq!(piece.event_count(), line.event_count() + c.event_count());

    let parsed_bytes = encode(&piece);
    let parsed = midly::Smf::parse(&parsed_bytes).unwrap();
    assert_eq!(parsed.header.format, midly::Format::Parallel);
    assert_eq!(parsed.tracks.len(), 2);
}

#[test]
fn instrument_and_volume_are_written_as_channel_events() {
    let mut smf = decode(&fragment_bytes(0, &[60])).unwrap();
    smf.set_channel(2).unwrap();
    smf.set_instrument(33).unwrap();
    smf.set_volume(80).unwrap();

    let bytes = encode(&smf);
    let parsed = midly::Smf::parse(&bytes).unwrap();

    let mut program = None;
    let mut volume = None;
    for event in &parsed.tracks[0] {
        if let midly::TrackEventKind::Midi { channel, message } = event.kind {
            assert_eq!(channel.as_int(), 2);
            match message {
                midly::MidiMessage::ProgramChange { program: p } => program = Some(p.as_int()),
                midly::MidiMessage::Controller { controller, value } if controller.as_int() == 7 => {
                    volume = Some(value.as_int())
                }
                _ => {}
            }
        }
    }
    assert_eq!(program, Some(33));
    assert_eq!(volume, Some(80));
}

#[test]
fn truncated_fragment_encodes_cleanly() {
    let mut smf = decode(&fragment_bytes(0, &[60, 62, 64, 65])).unwrap();
    smf.truncate(2 * 0x60);

    assert_eq!(smf.tracks[0].duration_ticks(), 192);
    assert_eq!(note_keys(&smf), vec![60, 60, 62, 62]);
    assert_eq!(decode(&encode(&smf)).unwrap(), smf);
}

#[test]
fn built_documents_round_trip() {
    let track = Track::new(vec![
        Event::new(0, EventKind::TimeSignature {
            numerator: 3,
            denominator_pow: 2,
            clocks_per_click: 24,
            notated_32nds: 8,
        }),
        Event::new(0, EventKind::KeySignature { sharps_flats: -7, mode: 1 }),
        Event::new(0, EventKind::NoteOn { channel: 5, key: 0, velocity: 1 }),
        Event::new(0x0FFF_FFFF, EventKind::NoteOff { channel: 5, key: 0, velocity: 127 }),
        Event::new(0, EventKind::EndOfTrack),
    ]);
    let smf = Smf::new(Format::SingleTrack, 0x01E0, vec![track]);
    assert_eq!(decode(&encode(&smf)).unwrap(), smf);
}
