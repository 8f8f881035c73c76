//! Standard MIDI File codec and event editing.
//!
//! Reads single-track (format 0) fragments into an [`Smf`], rewrites them
//! (transpose, tempo, instrument, volume, channel, length) and splices them
//! together, either one after another inside a track or side by side as the
//! tracks of a format 1 file.
//!
//! # Example
//!
//! ```
//! use midifile::{decode, encode, concat_parallel};
//!
//! # fn fragment() -> Vec<u8> {
//! #     let mut bytes = b"MThd".to_vec();
//! #     bytes.extend_from_slice(&[0, 0, 0, 6, 0, 0, 0, 1, 0, 0x60]);
//! #     bytes.extend_from_slice(b"MTrk");
//! #     bytes.extend_from_slice(&[0, 0, 0, 18]);
//! #     bytes.extend_from_slice(&[0x00, 0xFF, 0x59, 0x02, 0x00, 0x00]);
//! #     bytes.extend_from_slice(&[0x00, 0x90, 60, 100]);
//! #     bytes.extend_from_slice(&[0x60, 0x80, 60, 0]);
//! #     bytes.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);
//! #     bytes
//! # }
//! let mut melody = decode(&fragment())?;
//! melody.transpose(2)?; // up to D major
//! melody.set_tempo(600_000)?;
//!
//! let bass = decode(&fragment())?;
//! let piece = concat_parallel(&[melody, bass])?;
//! assert_eq!(piece.track_count(), 2);
//!
//! let bytes = encode(&piece);
//! assert_eq!(&bytes[0..4], b"MThd");
//! # Ok::<(), midifile::Error>(())
//! ```

pub mod decode;
pub mod edit;
pub mod encode;
pub mod event;
pub mod key;
pub mod spectrum;

pub use decode::decode;
pub use edit::{concat_parallel, concat_sequential};
pub use encode::{encode, write_vlq, MAX_VLQ};
pub use event::{Event, EventKind, Format, Smf, Track, PERCUSSION_CHANNEL};
pub use key::{KeySignature, KEY_SIGNATURE_CIRCLE};
pub use spectrum::{Spectrum, SpectrumNote};

/// Errors from decoding or editing MIDI data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("missing \"MThd\" header magic")]
    BadHeaderMagic,

    #[error("header chunk length must be 6, got {0}")]
    BadHeaderLength(u32),

    #[error("only format 0 files can be read, got format {0}")]
    UnsupportedFormat(u16),

    #[error("missing \"MTrk\" track magic")]
    MissingTrackChunk,

    #[error("input ends inside {what} at byte {offset}")]
    Truncated { what: &'static str, offset: usize },

    #[error("delta time at byte {offset} is not terminated within 4 bytes")]
    UnterminatedDeltaTime { offset: usize },

    #[error("accumulated delta time at byte {offset} exceeds the variable-length range")]
    DeltaOverflow { offset: usize },

    #[error("unknown status byte 0x{status:02x} at byte {offset}")]
    UnknownStatus { status: u8, offset: usize },

    #[error("unknown meta event type 0x{meta_type:02x} at byte {offset}")]
    UnknownMetaType { meta_type: u8, offset: usize },

    #[error("meta event 0x{meta_type:02x} at byte {offset} has length {length}, expected {expected}")]
    MalformedMeta {
        meta_type: u8,
        length: usize,
        expected: usize,
        offset: usize,
    },

    #[error("track has no key signature event")]
    MissingKeySignature,

    #[error("key signature {0} is outside -7..=7")]
    MalformedKeySignature(i8),

    #[error("transposing key {key} by {shift} leaves the 0..=127 range")]
    NoteOutOfRange { key: u8, shift: i8 },

    #[error("{what} {value} is outside 0..={max}")]
    DataOutOfRange {
        what: &'static str,
        value: u32,
        max: u32,
    },

    #[error("tempo {0}us per quarter note does not fit in 24 bits")]
    TempoOutOfRange(u32),

    #[error("cannot splice documents with different {field}: {left} vs {right}")]
    Mismatch {
        field: &'static str,
        left: String,
        right: String,
    },

    #[error("cannot merge an empty list of documents")]
    NothingToMerge,

    #[error("document {index} has {tracks} tracks, expected exactly 1")]
    NotSingleTrack { index: usize, tracks: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
