//! Common types for Cadence
//!
//! Musical vocabulary shared by feature extraction and the classifiers:
//! pitch classes, energy bands and the fixed analysis sample rate.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sample rate every waveform is resampled to before feature extraction
pub const ANALYSIS_SAMPLE_RATE: u32 = 22050;

/// Audio sample type
pub type Sample = f32;

/// Number of pitch classes in an octave
pub const NUM_PITCH_CLASSES: usize = 12;

/// Equal-tempered pitch class, sharps only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(usize)]
pub enum PitchClass {
    C = 0,
    #[serde(rename = "C#")]
    CSharp = 1,
    D = 2,
    #[serde(rename = "D#")]
    DSharp = 3,
    E = 4,
    F = 5,
    #[serde(rename = "F#")]
    FSharp = 6,
    G = 7,
    #[serde(rename = "G#")]
    GSharp = 8,
    A = 9,
    #[serde(rename = "A#")]
    ASharp = 10,
    B = 11,
}

impl PitchClass {
    /// All pitch classes in chromatic order starting at C
    pub const ALL: [PitchClass; NUM_PITCH_CLASSES] = [
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

    /// Convert from chroma index (0 = C, 11 = B)
    pub fn from_index(idx: usize) -> Option<Self> {
        Self::ALL.get(idx).copied()
    }

    /// Chroma index (0 = C, 11 = B)
    pub fn index(self) -> usize {
        self as usize
    }

    /// Note name as written in rule files and reports
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

    /// Parse a note name ("C", "F#", ...). Flats are not accepted.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|pc| pc.name() == name.trim())
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Coarse loudness band derived from mean RMS
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnergyBand {
    Low,
    Medium,
    High,
}

impl EnergyBand {
    /// Upper (exclusive) RMS bound of the low band
    pub const LOW_CEILING: f32 = 0.02;
    /// Upper (exclusive) RMS bound of the medium band
    pub const MEDIUM_CEILING: f32 = 0.05;

    /// Band a mean RMS value falls into
    pub fn from_rms(rms: f32) -> Self {
        if rms < Self::LOW_CEILING {
            EnergyBand::Low
        } else if rms < Self::MEDIUM_CEILING {
            EnergyBand::Medium
        } else {
            EnergyBand::High
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            EnergyBand::Low => "low",
            EnergyBand::Medium => "medium",
            EnergyBand::High => "high",
        }
    }
}

impl fmt::Display for EnergyBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
