//! Serialize an [`Smf`] back to Standard MIDI File bytes.

use crate::event::{Smf, Track};

/// Largest value a 4-byte variable-length quantity can hold.
pub const MAX_VLQ: u32 = 0x0FFF_FFFF;

/// Encode a document: `MThd` header followed by one `MTrk` chunk per track.
pub fn encode(smf: &Smf) -> Vec<u8> {
    let mut buf = Vec::new();

    // MThd header
    buf.extend_from_slice(b"MThd");
    buf.extend_from_slice(&6u32.to_be_bytes());
    buf.extend_from_slice(&smf.format.as_u16().to_be_bytes());
    buf.extend_from_slice(&(smf.tracks.len() as u16).to_be_bytes());
    buf.extend_from_slice(&smf.time_division.to_be_bytes());

    // MTrk chunks
    for track in &smf.tracks {
        let track_data = encode_track(track);
        buf.extend_from_slice(b"MTrk");
        buf.extend_from_slice(&(track_data.len() as u32).to_be_bytes());
        buf.extend_from_slice(&track_data);
    }

    buf
}

/// Track body: `VLQ(delta) + payload` per event, in order.
pub(crate) fn encode_track(track: &Track) -> Vec<u8> {
    let mut out = Vec::new();
    for event in &track.events {
        write_vlq(&mut out, event.delta);
        event.kind.write_payload(&mut out);
    }
    out
}

/// Append `value` as a variable-length quantity, most significant group
/// first.
///
/// Values above [`MAX_VLQ`] are a bug in the caller (debug builds panic) and
/// are masked to 28 bits otherwise. The decoder refuses to build deltas that
/// large, so documents from [`crate::decode`] never hit it.
pub fn write_vlq(buf: &mut Vec<u8>, value: u32) {
    debug_assert!(value <= MAX_VLQ, "{value} overflows VLQ");
    let value = value & MAX_VLQ;

    let mut groups = [0u8; 4];
    let mut len = 0;
    loop {
        groups[len] = (value >> (7 * len)) as u8 & 0x7F;
        len += 1;
        if len == groups.len() || value >> (7 * len) == 0 {
            break;
        }
    }

    for (i, group) in groups[..len].iter().enumerate().rev() {
        let continuation = if i > 0 { 0x80 } else { 0 };
        buf.push(group | continuation);
    }
}
