//! # Transposition Module
//!
//! Shifts an instrument's open-string table to the key the musician has
//! selected. The shift is measured in semitones between the selected key and
//! the instrument's reference pitch class, so a table written for G and a
//! selected key of A moves every string up a whole tone.

use crate::notes::{InstrumentProfile, OpenStringNote, PitchClass};

/// Reference pitch class used when an instrument configures none and has
/// fewer than three strings.
const FALLBACK_REFERENCE: PitchClass = PitchClass::A;

/// String position whose name stands in for an unconfigured reference.
const FALLBACK_STRING: usize = 2;

/// An instrument's strings after transposition.
///
/// Same length and order as the source profile. Built wholesale for each
/// (instrument, key) selection and never edited afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveNoteSet {
    semitones: i32,
    notes: Vec<OpenStringNote>,
}

impl EffectiveNoteSet {
    pub fn semitones(&self) -> i32 {
        self.semitones
    }

    pub fn notes(&self) -> &[OpenStringNote] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

/// The pitch class an instrument's table is written relative to.
///
/// Uses the configured reference, else the name of the third string, else A.
pub fn reference_pitch_class(profile: &InstrumentProfile) -> PitchClass {
    profile
        .reference
        .or_else(|| profile.strings.get(FALLBACK_STRING).map(|s| s.name))
        .unwrap_or(FALLBACK_REFERENCE)
}

/// Semitone shift from `reference` up to `key`, in -11..=11.
pub fn semitone_shift(key: PitchClass, reference: PitchClass) -> i32 {
    key.semitone() - reference.semitone()
}

/// Transposes every note by `semitones`.
///
/// Names move around the chromatic cycle and frequencies scale by
/// 2^(semitones/12). Zero semitones leaves the notes untouched.
pub fn transpose(notes: &[OpenStringNote], semitones: i32) -> EffectiveNoteSet {
    let ratio = 2.0_f32.powf(semitones as f32 / 12.0);
    let notes = notes
        .iter()
        .map(|note| {
            if semitones == 0 {
                return *note;
            }
            OpenStringNote {
                name: PitchClass::from_semitone(note.name.semitone() + semitones),
                frequency: note.frequency * ratio,
            }
        })
        .collect();

    EffectiveNoteSet { semitones, notes }
}

/// Builds the effective note set for an instrument played in `key`.
pub fn for_key(profile: &InstrumentProfile, key: PitchClass) -> EffectiveNoteSet {
    let semitones = semitone_shift(key, reference_pitch_class(profile));
    transpose(&profile.strings, semitones)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notes::NoteTable;

    fn violino() -> &'static InstrumentProfile {
        NoteTable::builtin().get("Violino").unwrap()
    }

    #[test]
    fn zero_shift_is_identity() {
        let set = transpose(&violino().strings, 0);
        assert_eq!(set.notes(), violino().strings.as_slice());
        assert_eq!(set.semitones(), 0);
    }

    #[test]
    fn shift_and_back_restores_frequencies() {
        let source = &violino().strings;
        for s in -11..=11 {
            let there = transpose(source, s);
            let back = transpose(there.notes(), -s);
            assert_eq!(back.len(), source.len());
            for (orig, round) in source.iter().zip(back.notes()) {
                assert_eq!(orig.name, round.name, "shift {s}");
                assert!(
                    (orig.frequency - round.frequency).abs() < 1e-3,
                    "shift {s}: {} vs {}",
                    orig.frequency,
                    round.frequency
                );
            }
        }
    }

    #[test]
    fn whole_tone_up_moves_names_and_frequencies() {
        let set = transpose(&violino().strings, 2);
        let names: Vec<_> = set.notes().iter().map(|n| n.name).collect();
        assert_eq!(
            names,
            [PitchClass::A, PitchClass::E, PitchClass::B, PitchClass::FSharp]
        );
        assert!((set.notes()[2].frequency - 493.88).abs() < 0.01);
    }

    #[test]
    fn names_wrap_below_c() {
        let notes = [OpenStringNote::new(PitchClass::C, 261.63)];
        let set = transpose(&notes, -1);
        assert_eq!(set.notes()[0].name, PitchClass::B);
        assert!((set.notes()[0].frequency - 246.94).abs() < 0.01);
    }

    #[test]
    fn shift_is_key_minus_reference() {
        assert_eq!(semitone_shift(PitchClass::A, PitchClass::G), 2);
        assert_eq!(semitone_shift(PitchClass::C, PitchClass::B), -11);
        assert_eq!(semitone_shift(PitchClass::G, PitchClass::G), 0);
    }

    #[test]
    fn reference_falls_back_to_third_string_then_a() {
        let mut profile = violino().clone();
        assert_eq!(reference_pitch_class(&profile), PitchClass::G);

        profile.reference = None;
        assert_eq!(reference_pitch_class(&profile), PitchClass::A);

        profile.strings = vec![OpenStringNote::new(PitchClass::D, 293.66)];
        assert_eq!(reference_pitch_class(&profile), PitchClass::A);

        profile.strings = vec![
            OpenStringNote::new(PitchClass::D, 146.83),
            OpenStringNote::new(PitchClass::G, 196.0),
            OpenStringNote::new(PitchClass::C, 261.63),
        ];
        assert_eq!(reference_pitch_class(&profile), PitchClass::C);
    }

    #[test]
    fn instrument_in_its_own_reference_key_is_untouched() {
        let set = for_key(violino(), PitchClass::G);
        assert_eq!(set.semitones(), 0);
        assert_eq!(set.notes(), violino().strings.as_slice());
    }
}
