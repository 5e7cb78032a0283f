//! # Detection Module
//!
//! Per-frame orchestration: condition the frame, estimate its pitch, match it
//! to the selected instrument's strings and publish a [`DetectionResult`].
//!
//! The host owns the cadence. It either calls [`Detector::tick`] with frames
//! it already has, or hands a [`FrameSource`] to [`Detector::run`], which
//! ticks once per delivered frame until the source stops or fails.
//!
//! The selected instrument and key live in an immutable [`ReferenceSet`]
//! snapshot. Changing the selection builds a new snapshot and swaps it in
//! whole; a tick works on the snapshot it loaded when it started.

use arc_swap::ArcSwap;
use std::ops::ControlFlow;
use std::sync::Arc;

use crate::audio::{AudioFrame, FrameSource};
use crate::conditioning::{Conditioned, condition};
use crate::config::TunerConfig;
use crate::error::Result;
use crate::notes::{NoteTable, PitchClass};
use crate::pitch::{Estimate, EstimatorSettings, estimate};
use crate::resolve::resolve;
use crate::transpose::{self, EffectiveNoteSet};
use crate::{DetectionResult, Reading};

/// Instrument and key chosen by the musician.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub instrument: String,
    pub key: PitchClass,
}

impl Selection {
    pub fn new(instrument: impl Into<String>, key: PitchClass) -> Self {
        Self {
            instrument: instrument.into(),
            key,
        }
    }
}

impl Default for Selection {
    fn default() -> Self {
        Self::new("Rabeca", PitchClass::A)
    }
}

/// The reference strings for one selection.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceSet {
    /// Instrument name as spelled in the note table
    pub instrument: String,
    pub key: PitchClass,
    /// Pitch class the instrument's table is written relative to
    pub reference: PitchClass,
    pub notes: EffectiveNoteSet,
}

impl ReferenceSet {
    pub fn build(table: &NoteTable, selection: &Selection) -> Result<ReferenceSet> {
        let profile = table.get(&selection.instrument)?;
        let reference = transpose::reference_pitch_class(profile);
        Ok(ReferenceSet {
            instrument: profile.name.clone(),
            key: selection.key,
            reference,
            notes: transpose::for_key(profile, selection.key),
        })
    }

    fn is_for(&self, selection: &Selection) -> bool {
        self.key == selection.key
            && self.instrument.eq_ignore_ascii_case(selection.instrument.trim())
    }
}

/// Runs the detection pipeline against the current selection.
pub struct Detector {
    settings: EstimatorSettings,
    table: Arc<NoteTable>,
    reference: ArcSwap<ReferenceSet>,
}

impl Detector {
    pub fn new(config: &TunerConfig, table: Arc<NoteTable>, selection: &Selection) -> Result<Self> {
        config.validate()?;
        let reference = ReferenceSet::build(&table, selection)?;
        log::info!(
            "[DETECT] Tuning {} in {} ({:+} semitones)",
            reference.instrument,
            reference.key,
            reference.notes.semitones()
        );
        Ok(Self {
            settings: config.estimator_settings(),
            table,
            reference: ArcSwap::from_pointee(reference),
        })
    }

    /// Detector over the built-in instrument table.
    pub fn with_builtin_table(config: &TunerConfig, selection: &Selection) -> Result<Self> {
        Self::new(config, Arc::new(NoteTable::builtin().clone()), selection)
    }

    pub fn table(&self) -> &NoteTable {
        &self.table
    }

    /// The reference set ticks are currently matched against.
    pub fn reference(&self) -> Arc<ReferenceSet> {
        self.reference.load_full()
    }

    /// Switches to a new instrument/key selection.
    ///
    /// Rebuilds the reference set only when the selection actually changed.
    /// Returns whether a new set was swapped in. On error the current set
    /// stays in place.
    pub fn select(&self, selection: &Selection) -> Result<bool> {
        if self.reference.load().is_for(selection) {
            return Ok(false);
        }
        let reference = ReferenceSet::build(&self.table, selection)?;
        log::debug!(
            "[DETECT] Rebuilt reference set: {} in {} -> {:?}",
            reference.instrument,
            reference.key,
            reference.notes.notes()
        );
        log::info!(
            "[DETECT] Tuning {} in {} ({:+} semitones)",
            reference.instrument,
            reference.key,
            reference.notes.semitones()
        );
        self.reference.store(Arc::new(reference));
        Ok(true)
    }

    /// Processes one frame.
    pub fn tick(&self, frame: &AudioFrame) -> DetectionResult {
        let reference = self.reference.load();

        let conditioned = match condition(&frame.samples, self.settings.silence_threshold) {
            Conditioned::Signal(conditioned) => conditioned,
            Conditioned::Silent { rms } => {
                log::trace!("[DETECT] Silent frame (rms {:.4})", rms);
                return DetectionResult::NoPitch;
            }
        };

        let frequency = match estimate(&conditioned.samples, frame.sample_rate, &self.settings) {
            Estimate::Pitch(frequency) => frequency,
            Estimate::NoPitch(reason) => {
                log::trace!("[DETECT] No pitch: {:?}", reason);
                return DetectionResult::NoPitch;
            }
        };

        match resolve(frequency, &reference.notes) {
            Some(res) => DetectionResult::Pitch(Reading {
                note: res.note.name,
                frequency,
                cents_offset: res.cents_offset,
                string_index: res.string_index,
                target_frequency: res.note.frequency,
            }),
            None => DetectionResult::NoPitch,
        }
    }

    /// Ticks once per frame from `source` and hands each result to `publish`.
    ///
    /// # Arguments
    /// * `source` - Delivers frames; the loop waits on it between ticks
    /// * `publish` - Receives every result; `ControlFlow::Break` ends the loop
    ///
    /// # Returns
    /// * `Ok(())` - The source stopped or `publish` broke out
    /// * `Err(CaptureUnavailable)` - The source failed; nothing is retried
    pub fn run<S, F>(&self, source: &mut S, mut publish: F) -> Result<()>
    where
        S: FrameSource + ?Sized,
        F: FnMut(&DetectionResult) -> ControlFlow<()>,
    {
        log::info!("[DETECT] Entering detection loop");
        let mut ticks: u64 = 0;
        let outcome = loop {
            match source.next_frame() {
                Ok(Some(frame)) => {
                    ticks += 1;
                    let result = self.tick(&frame);
                    if publish(&result).is_break() {
                        break Ok(());
                    }
                }
                Ok(None) => break Ok(()),
                Err(e) => {
                    log::error!("[DETECT] Capture failed: {}", e);
                    break Err(e);
                }
            }
        };
        log::info!("[DETECT] Detection loop finished after {} ticks", ticks);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TunerError;
    use crate::signal::sine;

    fn detector(instrument: &str, key: PitchClass) -> Detector {
        let selection = Selection::new(instrument, key);
        Detector::with_builtin_table(&TunerConfig::default(), &selection).unwrap()
    }

    fn tone(freq: f32) -> AudioFrame {
        AudioFrame::new(sine(freq, 0.5, 44100, 4096), 44100)
    }

    #[test]
    fn default_selection_is_rabeca_in_a() {
        let detector =
            Detector::with_builtin_table(&TunerConfig::default(), &Selection::default()).unwrap();
        let reference = detector.reference();
        assert_eq!(reference.instrument, "Rabeca");
        assert_eq!(reference.notes.semitones(), 0);
    }

    #[test]
    fn silence_publishes_none() {
        let detector = detector("Violino", PitchClass::G);
        let result = detector.tick(&AudioFrame::new(vec![0.0; 4096], 44100));
        assert_eq!(result, DetectionResult::NoPitch);
        assert_eq!(result.frequency(), None);
        assert_eq!(result.note(), None);
        assert_eq!(result.cents_offset(), 0.0);
    }

    #[test]
    fn tick_matches_transposed_strings() {
        // Violino in A: every string a whole tone up, so 493.88 Hz is the third string (B).
        let detector = detector("Violino", PitchClass::A);
        let reading = *detector.tick(&tone(493.88)).reading().unwrap();
        assert_eq!(reading.note, PitchClass::B);
        assert_eq!(reading.string_index, 2);
        assert!((reading.target_frequency - 493.88).abs() < 0.01);
        assert!(reading.cents_offset.abs() < 3.0, "cents {}", reading.cents_offset);
    }

    #[test]
    fn same_selection_does_not_rebuild() {
        let detector = detector("Violino", PitchClass::G);
        let before = detector.reference();
        assert!(!detector.select(&Selection::new("violino", PitchClass::G)).unwrap());
        assert!(Arc::ptr_eq(&before, &detector.reference()));
    }

    #[test]
    fn new_selection_swaps_reference() {
        let detector = detector("Violino", PitchClass::G);
        let before = detector.reference();
        assert!(detector.select(&Selection::new("Machete", PitchClass::B)).unwrap());
        let after = detector.reference();
        assert_eq!(after.instrument, "Machete");
        // The old snapshot is untouched.
        assert_eq!(before.instrument, "Violino");
        assert_eq!(before.notes.len(), 4);
    }

    #[test]
    fn failed_selection_keeps_current_reference() {
        let detector = detector("Violino", PitchClass::G);
        let err = detector.select(&Selection::new("Cello", PitchClass::C)).unwrap_err();
        assert!(matches!(err, TunerError::UnknownInstrument(_)));
        assert_eq!(detector.reference().instrument, "Violino");
    }

    #[test]
    fn unknown_instrument_is_rejected_up_front() {
        let result = Detector::with_builtin_table(
            &TunerConfig::default(),
            &Selection::new("Cello", PitchClass::C),
        );
        assert!(matches!(result, Err(TunerError::UnknownInstrument(_))));
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let config = TunerConfig {
            silence_threshold: -1.0,
            ..TunerConfig::default()
        };
        let result = Detector::with_builtin_table(&config, &Selection::default());
        assert!(matches!(result, Err(TunerError::InvalidConfig(_))));
    }
}
