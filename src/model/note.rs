use crate::error::SongError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sharp-based spellings for the twelve semitones, indexed from C.
const SEMITONE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// A MIDI-style pitch number: `12 * (octave + 1) + semitone`, where C4 is 60.
/// Display renders the canonical sharp-based note name, so `Db4` and `C#4`
/// both come back as `"C#4"`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pitch(pub u8);

impl Pitch {
    pub fn octave(self) -> i32 {
        self.0 as i32 / 12 - 1
    }

    pub fn semitone(self) -> u8 {
        self.0 % 12
    }

    /// Parse a note name like `C#4`, `db5`, or `A` (octave from `default_octave`).
    ///
    /// Accidentals resolve by semitone arithmetic, so `B#4` is `C5` and
    /// `Cb4` is `B3`.
    pub fn parse(raw: &str, default_octave: i32) -> Result<Self, SongError> {
        let bad = || SongError::BadNote(raw.to_string());
        let mut chars = raw.chars();

        let letter = chars.next().ok_or_else(bad)?.to_ascii_uppercase();
        let base: i32 = match letter {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return Err(bad()),
        };

        let rest = chars.as_str();
        let (accidental, digits) = match rest.chars().next() {
            Some('#') => (1, &rest[1..]),
            Some('b') => (-1, &rest[1..]),
            _ => (0, rest),
        };

        let octave: i32 = if digits.is_empty() {
            default_octave
        } else {
            digits.parse().map_err(|_| bad())?
        };

        let semis = base + accidental;
        let pitch = 12 * (octave + 1 + semis.div_euclid(12)) + semis.rem_euclid(12);

        if !(0..=127).contains(&pitch) {
            return Err(bad());
        }

        Ok(Pitch(pitch as u8))
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}",
            SEMITONE_NAMES[self.semitone() as usize],
            self.octave()
        )
    }
}

/// One atom of a chord token: a pitch, or the rest sentinel `R`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteAtom {
    Rest,
    Note(Pitch),
}

impl NoteAtom {
    pub fn parse(raw: &str, default_octave: i32) -> Result<Self, SongError> {
        if raw.eq_ignore_ascii_case("R") {
            Ok(NoteAtom::Rest)
        } else {
            Pitch::parse(raw, default_octave).map(NoteAtom::Note)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn enharmonic_flats_canonicalize_to_sharps() {
        let flat = Pitch::parse("Db4", 4).unwrap();
        let sharp = Pitch::parse("C#4", 4).unwrap();
        assert_eq!(flat, sharp);
        assert_eq!(flat.to_string(), "C#4");
    }

    #[test]
    fn pitch_number_round_trips() {
        assert_eq!(Pitch::parse("C4", 0).unwrap(), Pitch(60));
        assert_eq!(Pitch(60).to_string(), "C4");
        assert_eq!(Pitch::parse("A4", 0).unwrap(), Pitch(69));

        for n in 0..=127u8 {
            let name = Pitch(n).to_string();
            assert_eq!(Pitch::parse(&name, 0).unwrap(), Pitch(n));
        }
    }

    #[test]
    fn octave_carry_on_edge_accidentals() {
        assert_eq!(
            Pitch::parse("B#4", 0).unwrap(),
            Pitch::parse("C5", 0).unwrap()
        );
        assert_eq!(
            Pitch::parse("Cb4", 0).unwrap(),
            Pitch::parse("B3", 0).unwrap()
        );
        assert_eq!(
            Pitch::parse("E#4", 0).unwrap(),
            Pitch::parse("F4", 0).unwrap()
        );
    }

    #[test]
    fn default_octave_applies_when_omitted() {
        assert_eq!(Pitch::parse("C", 4).unwrap(), Pitch(60));
        assert_eq!(Pitch::parse("c#", 5).unwrap(), Pitch(73));
    }

    #[test]
    fn rejects_garbage() {
        assert!(Pitch::parse("", 4).is_err());
        assert!(Pitch::parse("H4", 4).is_err());
        assert!(Pitch::parse("C##4", 4).is_err());
        assert!(Pitch::parse("C4x", 4).is_err());
        assert!(Pitch::parse("C99", 4).is_err());
    }

    #[test]
    fn rest_atom_is_case_insensitive() {
        assert_eq!(NoteAtom::parse("R", 4).unwrap(), NoteAtom::Rest);
        assert_eq!(NoteAtom::parse("r", 4).unwrap(), NoteAtom::Rest);
        assert!(matches!(
            NoteAtom::parse("G5", 4).unwrap(),
            NoteAtom::Note(_)
        ));
    }
}
