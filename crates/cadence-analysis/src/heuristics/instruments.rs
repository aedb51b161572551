//! Threshold-based instrument guesses
//!
//! Three independent groups (percussion, melodic, bass) each contribute at
//! most one label: the first condition that holds within a group wins.

use cadence_core::features::FeatureBundle;
use cadence_core::EnergyBand;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::rules::GenreFamily;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Instrument {
    #[serde(rename = "kick drum")]
    KickDrum,
    #[serde(rename = "percussion")]
    Percussion,
    #[serde(rename = "synth pad")]
    SynthPad,
    #[serde(rename = "bright synths")]
    BrightSynths,
    #[serde(rename = "synth lead")]
    SynthLead,
    #[serde(rename = "electric guitar")]
    ElectricGuitar,
    #[serde(rename = "sub-bass")]
    SubBass,
    #[serde(rename = "bass")]
    Bass,
}

impl Instrument {
    pub fn label(self) -> &'static str {
        match self {
            Instrument::KickDrum => "kick drum",
            Instrument::Percussion => "percussion",
            Instrument::SynthPad => "synth pad",
            Instrument::BrightSynths => "bright synths",
            Instrument::SynthLead => "synth lead",
            Instrument::ElectricGuitar => "electric guitar",
            Instrument::SubBass => "sub-bass",
            Instrument::Bass => "bass",
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Descriptors the detectors read
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstrumentCues {
    pub zero_crossing_rate: f32,
    /// Hz
    pub spectral_rolloff: f32,
    /// Hz
    pub spectral_centroid: f32,
    pub energy: EnergyBand,
}

impl From<&FeatureBundle> for InstrumentCues {
    fn from(features: &FeatureBundle) -> Self {
        Self {
            zero_crossing_rate: features.zero_crossing_rate,
            spectral_rolloff: features.spectral_rolloff,
            spectral_centroid: features.spectral_centroid,
            energy: features.energy,
        }
    }
}

fn percussion(cues: &InstrumentCues, electronic: bool) -> Option<Instrument> {
    if cues.zero_crossing_rate > 0.07 && cues.spectral_rolloff < 2500.0 && electronic {
        Some(Instrument::KickDrum)
    } else if cues.zero_crossing_rate > 0.08 {
        Some(Instrument::Percussion)
    } else {
        None
    }
}

fn melodic(cues: &InstrumentCues, electronic: bool) -> Option<Instrument> {
    let centroid = cues.spectral_centroid;
    if centroid < 1800.0 && cues.spectral_rolloff > 2000.0 && cues.energy != EnergyBand::High {
        Some(Instrument::SynthPad)
    } else if centroid > 3000.0 {
        Some(Instrument::BrightSynths)
    } else if centroid > 2000.0 && electronic {
        Some(Instrument::SynthLead)
    } else if centroid > 2000.0 {
        Some(Instrument::ElectricGuitar)
    } else {
        None
    }
}

fn bass(cues: &InstrumentCues, electronic: bool) -> Option<Instrument> {
    if cues.spectral_rolloff < 1500.0 && electronic {
        Some(Instrument::SubBass)
    } else if cues.spectral_rolloff < 3000.0 {
        Some(Instrument::Bass)
    } else {
        None
    }
}

/// Labels in group order: percussion, melodic, bass
pub fn detect_instruments(cues: &InstrumentCues, family: GenreFamily) -> Vec<Instrument> {
    let electronic = family.is_electronic();
    [percussion, melodic, bass]
        .iter()
        .filter_map(|group| group(cues, electronic))
        .collect()
}
