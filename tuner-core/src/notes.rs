//! # Note Table Module
//!
//! Static reference data for the tuner: the 12-entry chromatic pitch-class
//! table and the open-string notes of every supported instrument.
//!
//! ## Features
//! - `PitchClass` with fixed semitone indices (C = 0 .. B = 11)
//! - Built-in instrument table, computed once at first use
//! - JSON loading of custom instrument tables with validation

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{Result, TunerError};

/// One of the 12 chromatic note names spanning an octave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PitchClass {
    C,
    CSharp,
    D,
    DSharp,
    E,
    F,
    FSharp,
    G,
    GSharp,
    A,
    ASharp,
    B,
}

/// The chromatic cycle in semitone order. A pitch class's position in this
/// array is its semitone index.
pub const CHROMATIC: [PitchClass; 12] = [
    PitchClass::C,
    PitchClass::CSharp,
    PitchClass::D,
    PitchClass::DSharp,
    PitchClass::E,
    PitchClass::F,
    PitchClass::FSharp,
    PitchClass::G,
    PitchClass::GSharp,
    PitchClass::A,
    PitchClass::ASharp,
    PitchClass::B,
];

impl PitchClass {
    /// Semitone index in 0..12, with C = 0.
    pub fn semitone(self) -> i32 {
        self as i32
    }

    /// Pitch class for any semitone index, wrapping around the octave.
    pub fn from_semitone(index: i32) -> PitchClass {
        CHROMATIC[index.rem_euclid(12) as usize]
    }

    /// Canonical (sharp) spelling.
    pub fn name(self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::CSharp => "C#",
            PitchClass::D => "D",
            PitchClass::DSharp => "D#",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::FSharp => "F#",
            PitchClass::G => "G",
            PitchClass::GSharp => "G#",
            PitchClass::A => "A",
            PitchClass::ASharp => "A#",
            PitchClass::B => "B",
        }
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PitchClass {
    type Err = TunerError;

    /// Accepts the sharp names plus the common flat spellings.
    fn from_str(s: &str) -> Result<Self> {
        let pitch = match s.trim() {
            "C" => PitchClass::C,
            "C#" | "Db" => PitchClass::CSharp,
            "D" => PitchClass::D,
            "D#" | "Eb" => PitchClass::DSharp,
            "E" => PitchClass::E,
            "F" => PitchClass::F,
            "F#" | "Gb" => PitchClass::FSharp,
            "G" => PitchClass::G,
            "G#" | "Ab" => PitchClass::GSharp,
            "A" => PitchClass::A,
            "A#" | "Bb" => PitchClass::ASharp,
            "B" => PitchClass::B,
            other => return Err(TunerError::UnknownPitchClass(other.to_string())),
        };
        Ok(pitch)
    }
}

impl TryFrom<String> for PitchClass {
    type Error = TunerError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<PitchClass> for String {
    fn from(pitch: PitchClass) -> String {
        pitch.name().to_string()
    }
}

/// The natural pitch of one unfingered string.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OpenStringNote {
    /// Pitch-class label of the string
    pub name: PitchClass,
    /// Frequency in Hz (always > 0 in a validated table)
    pub frequency: f32,
}

impl OpenStringNote {
    pub fn new(name: PitchClass, frequency: f32) -> Self {
        Self { name, frequency }
    }
}

/// An instrument and its open strings, in playing order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentProfile {
    pub name: String,
    /// Pitch class the table is written relative to. Keys are measured
    /// against it when transposing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<PitchClass>,
    pub strings: Vec<OpenStringNote>,
}

/// All instruments known to the tuner, in listing order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteTable {
    pub instruments: Vec<InstrumentProfile>,
}

/// The instrument table shipped with the tuner.
static BUILTIN: Lazy<NoteTable> = Lazy::new(|| {
    use PitchClass::*;

    fn profile(
        name: &str,
        reference: PitchClass,
        strings: &[(PitchClass, f32)],
    ) -> InstrumentProfile {
        InstrumentProfile {
            name: name.to_string(),
            reference: Some(reference),
            strings: strings
                .iter()
                .map(|&(name, frequency)| OpenStringNote { name, frequency })
                .collect(),
        }
    }

    NoteTable {
        instruments: vec![
            profile("Rabeca", A, &[(A, 440.00), (E, 659.26), (B, 493.88), (FSharp, 739.99)]),
            profile("Violino", G, &[(G, 196.00), (D, 293.66), (A, 440.00), (E, 659.26)]),
            profile("Machete", B, &[(B, 493.88), (E, 659.26), (GSharp, 415.30), (B, 493.88)]),
            profile("Viola", A, &[(G, 196.00), (D, 293.66), (A, 440.00), (E, 659.26)]),
            // The second string is labelled F but sits at D4; kept as found.
            profile("Meia-Viola", A, &[(G, 196.00), (F, 293.66), (A, 440.00), (E, 659.26)]),
        ],
    }
});

impl NoteTable {
    /// The built-in instrument table.
    pub fn builtin() -> &'static NoteTable {
        &BUILTIN
    }

    /// Parses and validates a JSON instrument table.
    pub fn from_json(json: &str) -> Result<NoteTable> {
        let table: NoteTable = serde_json::from_str(json)?;
        table.validate()?;
        Ok(table)
    }

    /// Loads and validates an instrument table from a JSON file.
    ///
    /// # Errors
    /// * `Io` / `Json` - The file cannot be read or parsed
    /// * `InvalidTable` - Duplicate names, empty instruments or bad frequencies
    pub fn load(path: impl AsRef<Path>) -> Result<NoteTable> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)?;
        let table = Self::from_json(&data)?;
        log::info!(
            "[CONFIG] Loaded {} instruments from {}",
            table.instruments.len(),
            path.display()
        );
        Ok(table)
    }

    /// Checks the table invariants: unique names, at least one string per
    /// instrument, finite positive frequencies.
    pub fn validate(&self) -> Result<()> {
        if self.instruments.is_empty() {
            return Err(TunerError::InvalidTable("no instruments".into()));
        }
        for (i, instrument) in self.instruments.iter().enumerate() {
            if instrument.name.trim().is_empty() {
                return Err(TunerError::InvalidTable(format!("instrument #{i} has no name")));
            }
            if self.instruments[..i]
                .iter()
                .any(|other| other.name.eq_ignore_ascii_case(&instrument.name))
            {
                return Err(TunerError::InvalidTable(format!(
                    "duplicate instrument `{}`",
                    instrument.name
                )));
            }
            if instrument.strings.is_empty() {
                return Err(TunerError::InvalidTable(format!(
                    "`{}` has no strings",
                    instrument.name
                )));
            }
            if let Some(bad) = instrument
                .strings
                .iter()
                .find(|s| !(s.frequency.is_finite() && s.frequency > 0.0))
            {
                return Err(TunerError::InvalidTable(format!(
                    "`{}` string {} has frequency {}",
                    instrument.name, bad.name, bad.frequency
                )));
            }
        }
        Ok(())
    }

    /// Looks up an instrument by name, ignoring ASCII case.
    pub fn get(&self, name: &str) -> Result<&InstrumentProfile> {
        self.instruments
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| TunerError::UnknownInstrument(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.instruments.iter().map(|p| p.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chromatic_indices_follow_the_cycle() {
        for (i, pitch) in CHROMATIC.iter().enumerate() {
            assert_eq!(pitch.semitone(), i as i32);
            assert_eq!(PitchClass::from_semitone(i as i32), *pitch);
        }
        assert_eq!(PitchClass::from_semitone(-1), PitchClass::B);
        assert_eq!(PitchClass::from_semitone(12), PitchClass::C);
    }

    #[test]
    fn parses_sharps_and_flats() {
        assert_eq!("C#".parse::<PitchClass>().unwrap(), PitchClass::CSharp);
        assert_eq!("Bb".parse::<PitchClass>().unwrap(), PitchClass::ASharp);
        assert_eq!(" G ".parse::<PitchClass>().unwrap(), PitchClass::G);
        assert!(matches!(
            "H".parse::<PitchClass>(),
            Err(TunerError::UnknownPitchClass(_))
        ));
        assert_eq!(PitchClass::GSharp.to_string(), "G#");
    }

    #[test]
    fn builtin_table_is_valid() {
        let table = NoteTable::builtin();
        table.validate().unwrap();
        let names: Vec<_> = table.names().collect();
        assert_eq!(names, ["Rabeca", "Violino", "Machete", "Viola", "Meia-Viola"]);
    }

    #[test]
    fn violino_strings_in_order() {
        let violino = NoteTable::builtin().get("violino").unwrap();
        let strings: Vec<_> = violino.strings.iter().map(|s| (s.name, s.frequency)).collect();
        assert_eq!(
            strings,
            [
                (PitchClass::G, 196.00),
                (PitchClass::D, 293.66),
                (PitchClass::A, 440.00),
                (PitchClass::E, 659.26),
            ]
        );
        assert_eq!(violino.reference, Some(PitchClass::G));
    }

    #[test]
    fn machete_keeps_duplicate_strings() {
        let machete = NoteTable::builtin().get("Machete").unwrap();
        assert_eq!(machete.strings.len(), 4);
        assert_eq!(machete.strings[0], machete.strings[3]);
    }

    #[test]
    fn unknown_instrument_is_an_error() {
        let err = NoteTable::builtin().get("Cello").unwrap_err();
        assert!(matches!(err, TunerError::UnknownInstrument(name) if name == "Cello"));
    }

    #[test]
    fn loads_table_from_json() {
        let json = r#"{
            "instruments": [
                { "name": "Cavaquinho", "reference": "D",
                  "strings": [
                    { "name": "D", "frequency": 293.66 },
                    { "name": "G", "frequency": 392.0 },
                    { "name": "B", "frequency": 493.88 },
                    { "name": "D", "frequency": 587.33 }
                  ] },
                { "name": "Bandolim",
                  "strings": [ { "name": "Bb", "frequency": 466.16 } ] }
            ]
        }"#;
        let table = NoteTable::from_json(json).unwrap();
        assert_eq!(table.instruments.len(), 2);
        assert_eq!(table.get("Bandolim").unwrap().reference, None);
        assert_eq!(table.get("Bandolim").unwrap().strings[0].name, PitchClass::ASharp);
    }

    #[test]
    fn rejects_invalid_tables() {
        let no_strings = r#"{ "instruments": [ { "name": "X", "strings": [] } ] }"#;
        assert!(matches!(NoteTable::from_json(no_strings), Err(TunerError::InvalidTable(_))));

        let zero = r#"{ "instruments": [ { "name": "X",
                          "strings": [ { "name": "A", "frequency": 0.0 } ] } ] }"#;
        assert!(matches!(NoteTable::from_json(zero), Err(TunerError::InvalidTable(_))));

        let dup = r#"{ "instruments": [
            { "name": "X", "strings": [ { "name": "A", "frequency": 440.0 } ] },
            { "name": "x", "strings": [ { "name": "A", "frequency": 440.0 } ] } ] }"#;
        assert!(matches!(NoteTable::from_json(dup), Err(TunerError::InvalidTable(_))));

        let bad_name = r#"{ "instruments": [ { "name": "X",
                              "strings": [ { "name": "Q", "frequency": 440.0 } ] } ] }"#;
        assert!(matches!(NoteTable::from_json(bad_name), Err(TunerError::Json(_))));
    }

    #[test]
    fn table_round_trips_through_json() {
        let json = serde_json::to_string(NoteTable::builtin()).unwrap();
        assert!(json.contains("\"F#\""));
        assert_eq!(&NoteTable::from_json(&json).unwrap(), NoteTable::builtin());
    }
}
