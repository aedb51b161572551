//! Heuristic classifiers built on extracted features

mod instruments;
mod mood;

pub use instruments::{detect_instruments, Instrument, InstrumentCues};
pub use mood::{classify_mood, is_minor, Mood, MINOR_KEYS};

/// Vocal gate bounds (Hz), both exclusive
pub const VOCAL_CENTROID_MIN: f32 = 1000.0;
pub const VOCAL_CENTROID_MAX: f32 = 4000.0;

/// Whether the vocal pipeline is worth running for this centroid
pub fn detect_vocals(spectral_centroid: f32) -> bool {
    spectral_centroid > VOCAL_CENTROID_MIN && spectral_centroid < VOCAL_CENTROID_MAX
}
