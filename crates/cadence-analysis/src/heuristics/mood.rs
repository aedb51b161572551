//! Mood lookup from energy, tempo and key

use cadence_core::{EnergyBand, PitchClass};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Keys treated as minor-sounding
pub const MINOR_KEYS: [PitchClass; 5] = [
    PitchClass::CSharp,
    PitchClass::DSharp,
    PitchClass::FSharp,
    PitchClass::GSharp,
    PitchClass::ASharp,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mood {
    Energetic,
    Uplifting,
    Melancholic,
    Calm,
    Emotional,
    Upbeat,
}

impl Mood {
    pub fn name(self) -> &'static str {
        match self {
            Mood::Energetic => "Energetic",
            Mood::Uplifting => "Uplifting",
            Mood::Melancholic => "Melancholic",
            Mood::Calm => "Calm",
            Mood::Emotional => "Emotional",
            Mood::Upbeat => "Upbeat",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub fn is_minor(key: PitchClass) -> bool {
    MINOR_KEYS.contains(&key)
}

/// First matching row wins
pub fn classify_mood(energy: EnergyBand, tempo: f64, key: PitchClass) -> Mood {
    let minor = is_minor(key);
    match energy {
        EnergyBand::High if tempo > 120.0 => Mood::Energetic,
        EnergyBand::High => Mood::Uplifting,
        EnergyBand::Low if tempo < 90.0 && minor => Mood::Melancholic,
        EnergyBand::Low if tempo < 90.0 => Mood::Calm,
        _ if minor => Mood::Emotional,
        _ => Mood::Upbeat,
    }
}
