//! Vocal gender from mean fundamental frequency

use std::fmt;
use std::path::Path;

use cadence_core::audio_file::{load_mono, AudioLoadError};
use cadence_core::spectral::{mean_voiced_f0, PitchTracker};
use cadence_core::ANALYSIS_SAMPLE_RATE;
use serde::{Deserialize, Serialize};

/// Mean F0 above this is classified as female
pub const FEMALE_F0_THRESHOLD_HZ: f32 = 175.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VocalGender {
    Male,
    Female,
}

impl fmt::Display for VocalGender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VocalGender::Male => f.write_str("Male"),
            VocalGender::Female => f.write_str("Female"),
        }
    }
}

pub fn classify_f0(mean_f0: f32) -> VocalGender {
    if mean_f0 > FEMALE_F0_THRESHOLD_HZ {
        VocalGender::Female
    } else {
        VocalGender::Male
    }
}

/// `None` when no frame is voiced
pub fn infer_gender_from_samples(samples: &[f32], sample_rate: u32) -> Option<VocalGender> {
    let pitches = PitchTracker::new(sample_rate).track(samples);
    let mean_f0 = mean_voiced_f0(&pitches)?;
    let gender = classify_f0(mean_f0);
    log::info!("infer_gender: mean F0 {:.1}Hz -> {}", mean_f0, gender);
    Some(gender)
}

/// Reload a vocal stem at the analysis rate and infer its gender
pub fn infer_gender(stem_path: &Path) -> Result<Option<VocalGender>, AudioLoadError> {
    let samples = load_mono(stem_path, ANALYSIS_SAMPLE_RATE)?;
    Ok(infer_gender_from_samples(&samples, ANALYSIS_SAMPLE_RATE))
}
