use crate::error::SongError;
use crate::model::note::{NoteAtom, Pitch};
use crate::model::song::Song;
use log::{debug, warn};

const SEARCH_RANGE: i32 = 60;

/// Pick a semitone shift that best fits the piece inside the mapping's
/// observed pitch range.
///
/// A manual override short-circuits the search. With no pitch information
/// on either side there is nothing to optimize, so the shift is 0.
/// Otherwise every shift in -60..=60 is scored by how far the shifted
/// piece's min/max stick out of the mapped range; ties break toward the
/// smaller absolute shift, and remaining ties keep the first candidate in
/// ascending scan order.
pub fn choose_transpose(piece: &[u8], mapped: &[u8], manual: Option<i32>) -> i32 {
    if let Some(shift) = manual {
        return shift;
    }

    let (Some(&piece_min), Some(&piece_max)) = (piece.iter().min(), piece.iter().max()) else {
        return 0;
    };
    let (Some(&map_min), Some(&map_max)) = (mapped.iter().min(), mapped.iter().max()) else {
        return 0;
    };

    let (piece_min, piece_max) = (piece_min as i32, piece_max as i32);
    let (map_min, map_max) = (map_min as i32, map_max as i32);

    let mut best_shift: i32 = 0;
    let mut best_penalty = i32::MAX;

    for shift in -SEARCH_RANGE..=SEARCH_RANGE {
        let under = (map_min - (piece_min + shift)).max(0);
        let over = ((piece_max + shift) - map_max).max(0);
        let penalty = under + over;

        if penalty < best_penalty
            || (penalty == best_penalty && shift.abs() < best_shift.abs())
        {
            best_penalty = penalty;
            best_shift = shift;
        }
    }

    debug!(
        "Auto-transpose chose {} semitones (penalty {})",
        best_shift, best_penalty
    );

    best_shift
}

/// Octave-fold a pitch into `[low, high]`.
///
/// Returns the folded pitch and whether any folding happened. Fails on
/// inverted bounds, or when the range is too narrow for this pitch class
/// to land inside it.
pub fn fold_into_range(pitch: i32, low: u8, high: u8) -> Result<(u8, bool), SongError> {
    if low > high {
        return Err(SongError::InvertedRange { low, high });
    }

    let (low_i, high_i) = (low as i32, high as i32);
    let mut folded = pitch;

    while folded < low_i {
        folded += 12;
    }
    while folded > high_i {
        folded -= 12;
    }

    if folded < low_i || !(0..=127).contains(&folded) {
        return Err(SongError::FoldOutOfDomain(pitch));
    }

    Ok((folded as u8, folded != pitch))
}

/// Every distinct pitch a song touches, for the transpose search.
pub fn piece_pitches(song: &Song) -> Vec<u8> {
    let mut pitches: Vec<u8> = song
        .events
        .iter()
        .flat_map(|e| e.notes.iter())
        .filter_map(|atom| match atom {
            NoteAtom::Note(p) => Some(p.0),
            NoteAtom::Rest => None,
        })
        .collect();

    pitches.sort_unstable();
    pitches.dedup();
    pitches
}

/// Shift every pitch in the song, folding strays back into `range` when
/// one is known.
///
/// A note that cannot land in range is dropped from its chord with a
/// warning; a chord losing all its notes degrades to a rest of the same
/// duration, so the overall timing is untouched.
pub fn apply_transpose(song: &mut Song, shift: i32, range: Option<(u8, u8)>) {
    if shift == 0 && range.is_none() {
        return;
    }

    for event in song.events.iter_mut() {
        event.notes.retain_mut(|atom| {
            let NoteAtom::Note(pitch) = atom else {
                return true;
            };

            let shifted = pitch.0 as i32 + shift;

            let landed = match range {
                Some((low, high)) => match fold_into_range(shifted, low, high) {
                    Ok((folded, was_folded)) => {
                        if was_folded {
                            debug!(
                                "Folded {} to {} to fit the mapped range [{}..={}]",
                                shifted, folded, low, high
                            );
                        }
                        folded as i32
                    }
                    Err(why) => {
                        warn!("Dropping {}: {}", pitch, why);
                        return false;
                    }
                },
                None => shifted,
            };

            if !(0..=127).contains(&landed) {
                warn!("Dropping {} after transpose: pitch {} is unrepresentable", pitch, landed);
                return false;
            }

            *atom = NoteAtom::Note(Pitch(landed as u8));
            true
        });

        if event.notes.is_empty() {
            event.notes.push(NoteAtom::Rest);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::song::{Event, Metadata};

    fn one_chord_song(pitches: &[u8]) -> Song {
        Song {
            metadata: Metadata::default(),
            events: vec![Event {
                notes: pitches.iter().map(|&p| NoteAtom::Note(Pitch(p))).collect(),
                duration_s: 0.5,
                hold_s: 0.12,
                stagger_s: 0.0,
                repeat: 1,
            }],
        }
    }

    #[test]
    fn apply_shifts_every_pitch() {
        let mut song = one_chord_song(&[60, 64, 67]);
        apply_transpose(&mut song, 12, None);
        assert_eq!(piece_pitches(&song), vec![72, 76, 79]);
    }

    #[test]
    fn apply_folds_into_known_range() {
        let mut song = one_chord_song(&[48]);
        apply_transpose(&mut song, 0, Some((60, 72)));
        assert_eq!(piece_pitches(&song), vec![60]);
    }

    #[test]
    fn chord_losing_all_notes_becomes_a_rest() {
        // pitch class C against a D..E range: unfoldable, so the event
        // degrades to a rest and keeps its duration
        let mut song = one_chord_song(&[60]);
        apply_transpose(&mut song, 0, Some((62, 64)));
        assert!(song.events[0].is_rest());
        assert!((song.events[0].duration_s - 0.5).abs() < 1e-9);
    }

    #[test]
    fn manual_override_wins() {
        assert_eq!(choose_transpose(&[60, 72], &[40, 50], Some(7)), 7);
        assert_eq!(choose_transpose(&[], &[], Some(-3)), -3);
    }

    #[test]
    fn empty_inputs_mean_no_shift() {
        assert_eq!(choose_transpose(&[], &[60, 72], None), 0);
        assert_eq!(choose_transpose(&[60, 72], &[], None), 0);
    }

    #[test]
    fn in_range_piece_stays_put() {
        // piece fully inside the mapped range: zero shift is already perfect
        assert_eq!(choose_transpose(&[62, 70], &[60, 72], None), 0);
    }

    #[test]
    fn shifts_toward_the_mapped_range() {
        // piece an octave below the mapped range
        assert_eq!(choose_transpose(&[48, 60], &[60, 72], None), 12);
        // piece an octave above
        assert_eq!(choose_transpose(&[72, 84], &[60, 72], None), -12);
    }

    #[test]
    fn flat_penalty_ties_resolve_to_the_smallest_shift() {
        // a piece wider than the map overhangs it at every shift, so the
        // penalty is flat across a whole band of candidates; the band's
        // smallest-magnitude shift wins
        assert_eq!(choose_transpose(&[52, 70], &[60, 72], None), 2);
        assert_eq!(choose_transpose(&[62, 80], &[60, 72], None), -2);
        // symmetric overhang: the flat band contains 0, which wins outright
        assert_eq!(choose_transpose(&[59, 73], &[60, 72], None), 0);
    }

    #[test]
    fn fold_brings_pitch_into_range() {
        assert_eq!(fold_into_range(48, 60, 72).unwrap(), (60, true));
        assert_eq!(fold_into_range(84, 60, 72).unwrap(), (72, true));
        assert_eq!(fold_into_range(65, 60, 72).unwrap(), (65, false));
    }

    #[test]
    fn fold_rejects_inverted_bounds() {
        assert!(matches!(
            fold_into_range(65, 72, 60),
            Err(SongError::InvertedRange { .. })
        ));
    }

    #[test]
    fn fold_rejects_unreachable_narrow_range() {
        // pitch class C, range covering only D..E: no octave of C fits
        assert!(matches!(
            fold_into_range(60, 62, 64),
            Err(SongError::FoldOutOfDomain(60))
        ));
    }
}
