//! Key signatures on the circle of fifths and the semitone shift between them.

use crate::{Error, Result};

/// Key signature values ordered by the pitch class of their major tonic:
/// C, C#, D, D#, E, F, F#, G, G#, A, A#, B.
///
/// The shift between two keys is the difference of their positions here.
pub const KEY_SIGNATURE_CIRCLE: [i8; 12] = [0, 7, 2, -3, 4, -1, 6, 1, -4, 3, -2, 5];

/// A validated key signature: sharps (positive) or flats (negative), -7..=7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeySignature(i8);

impl KeySignature {
    pub const C: KeySignature = KeySignature(0);

    pub fn new(sharps_flats: i8) -> Result<Self> {
        if (-7..=7).contains(&sharps_flats) {
            Ok(Self(sharps_flats))
        } else {
            Err(Error::MalformedKeySignature(sharps_flats))
        }
    }

    pub fn value(self) -> i8 {
        self.0
    }

    /// Position of the tonic in [`KEY_SIGNATURE_CIRCLE`].
    ///
    /// Db, Gb and Cb (-5, -6, -7) are enharmonic to C#, F# and B (7, 6, 5),
    /// twelve fifths apart, so they share a position.
    pub fn pitch_class(self) -> u8 {
        let normalized = if self.0 < -4 { self.0 + 12 } else { self.0 };
        KEY_SIGNATURE_CIRCLE
            .iter()
            .position(|v| *v == normalized)
            .map(|p| p as u8)
            // Every normalized value in -4..=7 is in the table; the modular
            // form gives the same answer.
            .unwrap_or_else(|| (self.0 as i16 * 7).rem_euclid(12) as u8)
    }

    /// Semitones to move notes written in `self` so they sound in `target`.
    ///
    /// Not reduced modulo 12: moving from B to C is -11, as positions in the
    /// table are subtracted directly.
    pub fn shift_to(self, target: KeySignature) -> i8 {
        target.pitch_class() as i8 - self.pitch_class() as i8
    }
}

impl TryFrom<i8> for KeySignature {
    type Error = Error;

    fn try_from(value: i8) -> Result<Self> {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_positions_match_modular_form() {
        for value in -7..=7i8 {
            let key = KeySignature::new(value).unwrap();
            assert_eq!(
                key.pitch_class(),
                (value as i16 * 7).rem_euclid(12) as u8,
                "key {value}"
            );
        }
    }

    #[test]
    fn shift_from_c() {
        let c = KeySignature::C;
        assert_eq!(c.shift_to(KeySignature::new(7).unwrap()), 1); // C#
        assert_eq!(c.shift_to(KeySignature::new(2).unwrap()), 2); // D
        assert_eq!(c.shift_to(KeySignature::new(-1).unwrap()), 5); // F
        assert_eq!(c.shift_to(KeySignature::new(5).unwrap()), 11); // B
        assert_eq!(c.shift_to(KeySignature::new(-5).unwrap()), 1); // Db
    }

    #[test]
    fn shift_is_antisymmetric() {
        for a in -7..=7i8 {
            for b in -7..=7i8 {
                let ka = KeySignature::new(a).unwrap();
                let kb = KeySignature::new(b).unwrap();
                assert_eq!(ka.shift_to(kb), -kb.shift_to(ka));
            }
        }
    }

    #[test]
    fn out_of_range_rejected() {
        assert_eq!(KeySignature::new(8), Err(Error::MalformedKeySignature(8)));
        assert_eq!(KeySignature::try_from(-8), Err(Error::MalformedKeySignature(-8)));
    }
}
