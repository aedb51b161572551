//! Key (tonic pitch class) estimation

use crate::spectral::chroma::log_frequency_chroma;
use crate::types::{PitchClass, NUM_PITCH_CLASSES};

/// Pitch class with the largest summed log-frequency chroma.
///
/// Ties resolve to the lowest chroma index, so silence reports C.
pub fn estimate_key(samples: &[f32], sample_rate: u32) -> PitchClass {
    let frames = log_frequency_chroma(samples, sample_rate);

    let mut totals = [0.0f32; NUM_PITCH_CLASSES];
    for frame in &frames {
        for (total, v) in totals.iter_mut().zip(frame) {
            *total += v;
        }
    }

    let mut best = 0;
    for (idx, &total) in totals.iter().enumerate() {
        if total > totals[best] {
            best = idx;
        }
    }

    log::debug!("estimate_key: chroma totals {:?}", totals);
    PitchClass::from_index(best).unwrap_or(PitchClass::C)
}
