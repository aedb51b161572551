//! Audio feature extraction
//!
//! [`FeatureExtractor`] turns an audio file into a [`FeatureBundle`]. The
//! features are computed in a fixed order because tempo's octave correction
//! reads the spectral centroid and energy band:
//!
//! ```text
//! energy -> spectral_centroid -> tempo -> key -> zero_crossing_rate
//!        -> mfcc -> chroma -> spectral_rolloff
//! ```
//!
//! A bundle is either complete or not produced at all: any decoding failure
//! surfaces as [`AudioLoadError`] before the first feature is computed.

pub mod descriptors;
pub mod key;
pub mod tempo;

pub use descriptors::N_MFCC;
pub use key::estimate_key;
pub use tempo::{
    correct_octave, round_tempo, AutocorrelationTempo, BeatTracker, OnsetEnvelope, TempoEstimator,
    TempoRange, TempoStrategy,
};

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::audio_file::{load_mono, read_metadata, AudioLoadError, TrackMetadata};
use crate::spectral::chroma::{mean_chroma, stft_chroma};
use crate::spectral::mel::{mel_power, power_to_db, N_MELS};
use crate::spectral::Spectrogram;
use crate::types::{EnergyBand, PitchClass, ANALYSIS_SAMPLE_RATE, NUM_PITCH_CLASSES};

/// Descriptors of one audio file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureBundle {
    /// BPM, one decimal, 0.0 when no tempo could be found
    pub tempo: f64,
    pub key: PitchClass,
    pub energy: EnergyBand,
    /// Mean RMS the energy band was derived from
    pub energy_value: f32,
    /// Hz
    pub spectral_centroid: f32,
    pub zero_crossing_rate: f32,
    pub mfcc: [f32; N_MFCC],
    pub chroma: [f32; NUM_PITCH_CLASSES],
    /// Hz
    pub spectral_rolloff: f32,
    pub metadata: TrackMetadata,
}

/// Computes a [`FeatureBundle`] from a file or an already-loaded waveform
pub struct FeatureExtractor {
    tempo: TempoEstimator,
}

impl FeatureExtractor {
    pub fn new(tempo_range: TempoRange) -> Self {
        Self::with_tempo_estimator(TempoEstimator::new(tempo_range))
    }

    pub fn with_tempo_estimator(tempo: TempoEstimator) -> Self {
        Self { tempo }
    }

    /// Decode `path` at the analysis rate and extract every feature
    pub fn extract(&self, path: &Path) -> Result<FeatureBundle, AudioLoadError> {
        log::info!("extract: Analyzing {:?}", path);
        let samples = load_mono(path, ANALYSIS_SAMPLE_RATE)?;
        let metadata = read_metadata(path);
        Ok(self.extract_samples(&samples, metadata))
    }

    /// Extract every feature from a mono waveform at [`ANALYSIS_SAMPLE_RATE`]
    pub fn extract_samples(&self, samples: &[f32], metadata: TrackMetadata) -> FeatureBundle {
        let sr = ANALYSIS_SAMPLE_RATE;
        let spec = Spectrogram::compute(samples, sr);

        let energy_value = descriptors::mean_rms(samples);
        let energy = EnergyBand::from_rms(energy_value);

        let spectral_centroid = descriptors::spectral_centroid(&spec);

        let mut mel_db = mel_power(&spec, N_MELS);
        power_to_db(&mut mel_db, 80.0);
        let onset = OnsetEnvelope::from_mel_db(&mel_db, spec.frame_rate());
        let tempo = self.tempo.estimate(&onset, spectral_centroid, energy);

        let key = estimate_key(samples, sr);
        let zero_crossing_rate = descriptors::zero_crossing_rate(samples);
        let mfcc = descriptors::mean_mfcc(&mel_db);
        let chroma = mean_chroma(&stft_chroma(&spec));
        let spectral_rolloff = descriptors::spectral_rolloff(&spec);

        log::info!(
            "extract: tempo={:.1} key={} energy={} ({:.4}) centroid={:.0}Hz zcr={:.3} rolloff={:.0}Hz",
            tempo,
            key,
            energy,
            energy_value,
            spectral_centroid,
            zero_crossing_rate,
            spectral_rolloff
        );

        FeatureBundle {
            tempo,
            key,
            energy,
            energy_value,
            spectral_centroid,
            zero_crossing_rate,
            mfcc,
            chroma,
            spectral_rolloff,
            metadata,
        }
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new(TempoRange::default())
    }
}
