//! # Note Resolution Module
//!
//! Maps a detected frequency onto the closest string of the effective note
//! set and measures how far off it is in cents.
//!
//! The closest string is chosen by linear distance in Hz, not by distance in
//! cents. Between two strings this puts the decision boundary at their
//! arithmetic mean rather than their geometric mean, which widens the range
//! claimed by the lower string.
//!
//! The returned offset is unclamped; see [`crate::meter`] for the display
//! ranges.

use crate::notes::OpenStringNote;
use crate::transpose::EffectiveNoteSet;

/// The string a frequency was matched to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    /// Position of the string in the note set
    pub string_index: usize,
    pub note: OpenStringNote,
    /// Unclamped deviation from the string's frequency
    pub cents_offset: f32,
}

/// Deviation of `freq` from `target_freq` in cents.
///
/// - 100 cents = 1 semitone
/// - positive = sharp, negative = flat
pub fn cents_offset(freq: f32, target_freq: f32) -> f32 {
    1200.0 * (freq / target_freq).log2()
}

/// Finds the string nearest to `frequency` by absolute Hz distance.
///
/// Ties go to the string that comes first. `None` for an empty set or a
/// non-positive frequency.
pub fn nearest(frequency: f32, notes: &[OpenStringNote]) -> Option<(usize, OpenStringNote)> {
    if !(frequency.is_finite() && frequency > 0.0) {
        return None;
    }
    notes
        .iter()
        .copied()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            let diff_a = (a.frequency - frequency).abs();
            let diff_b = (b.frequency - frequency).abs();
            diff_a.total_cmp(&diff_b)
        })
}

/// Resolves a frequency against the effective note set.
///
/// # Arguments
/// * `frequency` - Detected frequency in Hz
/// * `notes` - The strings of the current selection
///
/// # Returns
/// * `Some(Resolution)` - Nearest string and the unclamped cent offset
/// * `None` - Empty note set or an unusable frequency
pub fn resolve(frequency: f32, notes: &EffectiveNoteSet) -> Option<Resolution> {
    let (string_index, note) = nearest(frequency, notes.notes())?;
    Some(Resolution {
        string_index,
        note,
        cents_offset: cents_offset(frequency, note.frequency),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notes::{NoteTable, PitchClass};
    use crate::transpose::transpose;

    fn violino() -> EffectiveNoteSet {
        transpose(&NoteTable::builtin().get("Violino").unwrap().strings, 0)
    }

    #[test]
    fn exact_match_has_zero_offset() {
        let set = violino();
        for (i, note) in set.notes().iter().enumerate() {
            let res = resolve(note.frequency, &set).unwrap();
            assert_eq!(res.string_index, i);
            assert_eq!(res.note.name, note.name);
            assert_eq!(res.cents_offset, 0.0);
        }
    }

    #[test]
    fn sharp_a_resolves_to_a() {
        let res = resolve(450.0, &violino()).unwrap();
        assert_eq!(res.note.name, PitchClass::A);
        assert_eq!(res.string_index, 2);
        assert!((res.cents_offset - 38.91).abs() < 0.01, "cents {}", res.cents_offset);
    }

    #[test]
    fn flat_offsets_are_negative() {
        let res = resolve(430.0, &violino()).unwrap();
        assert_eq!(res.note.name, PitchClass::A);
        assert!(res.cents_offset < -39.0 && res.cents_offset > -41.0, "cents {}", res.cents_offset);
    }

    #[test]
    fn offset_is_not_clamped() {
        // 350 Hz is closer to D (293.66) than to A in Hz, and far sharp of it.
        let res = resolve(350.0, &violino()).unwrap();
        assert_eq!(res.note.name, PitchClass::D);
        assert!(res.cents_offset > 300.0, "cents {}", res.cents_offset);
    }

    #[test]
    fn matches_by_hz_not_cents() {
        // 362 Hz: 68.34 Hz above D but 78 Hz below A, so D wins,
        // even though A is closer in cents (-338 vs +362).
        let res = resolve(362.0, &violino()).unwrap();
        assert_eq!(res.note.name, PitchClass::D);
        assert!(cents_offset(362.0, 440.0).abs() < res.cents_offset.abs());
    }

    #[test]
    fn tie_goes_to_first_string() {
        let notes = [
            OpenStringNote::new(PitchClass::G, 200.0),
            OpenStringNote::new(PitchClass::A, 300.0),
        ];
        let (index, note) = nearest(250.0, &notes).unwrap();
        assert_eq!(index, 0);
        assert_eq!(note.name, PitchClass::G);

        let reversed = [notes[1], notes[0]];
        let (index, note) = nearest(250.0, &reversed).unwrap();
        assert_eq!(index, 0);
        assert_eq!(note.name, PitchClass::A);
    }

    #[test]
    fn duplicate_strings_resolve_to_first() {
        let set = transpose(&NoteTable::builtin().get("Machete").unwrap().strings, 0);
        let res = resolve(493.88, &set).unwrap();
        assert_eq!(res.string_index, 0);
    }

    #[test]
    fn rejects_empty_sets_and_bad_frequencies() {
        assert!(nearest(440.0, &[]).is_none());
        assert!(resolve(0.0, &violino()).is_none());
        assert!(resolve(-5.0, &violino()).is_none());
        assert!(resolve(f32::NAN, &violino()).is_none());
    }

    #[test]
    fn cents_of_an_octave() {
        assert!((cents_offset(880.0, 440.0) - 1200.0).abs() < 1e-3);
        assert!((cents_offset(220.0, 440.0) + 1200.0).abs() < 1e-3);
    }
}
